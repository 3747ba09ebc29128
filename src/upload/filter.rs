use super::types::FileHandle;

pub const INVALID_FILE_MESSAGE: &str = "Only .csv files are allowed!";

const CSV_SUFFIX: &str = ".csv";

pub fn is_csv(name: &str) -> bool {
    name.ends_with(CSV_SUFFIX)
}

/// Splits a drop into `(valid, invalid)` preserving arrival order.
pub fn partition_csv(files: Vec<FileHandle>) -> (Vec<FileHandle>, Vec<FileHandle>) {
    files.into_iter().partition(|file| is_csv(&file.name))
}
