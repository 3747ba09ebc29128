mod file_processor;
mod filter;
mod manager;
mod types;

pub use file_processor::scan_folder;
pub use filter::{is_csv, partition_csv, INVALID_FILE_MESSAGE};
pub use manager::UploadManager;
pub use types::{
    progress_percent, BatchOutcome, FileHandle, FileSource, PendingFile, UploadEvent,
    UploadStatus,
};
