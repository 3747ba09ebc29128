use bytes::Bytes;
use futures_util::Stream;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use tokio_util::io::ReaderStream;

const MEMORY_CHUNK_SIZE: usize = 64 * 1024;

pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send + Sync>>;

/// Where the bytes of a selected file come from.
#[derive(Clone)]
pub enum FileSource {
    Path(PathBuf),
    /// Contents handed over by a drop that carried no path.
    Memory(Bytes),
}

impl fmt::Debug for FileSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileSource::Path(path) => f.debug_tuple("Path").field(path).finish(),
            FileSource::Memory(bytes) => write!(f, "Memory({} bytes)", bytes.len()),
        }
    }
}

impl FileSource {
    /// Opens the source as a chunked byte stream together with its length.
    pub async fn open(&self) -> io::Result<(ByteStream, u64)> {
        match self {
            FileSource::Path(path) => {
                let file = tokio::fs::File::open(path).await?;
                let len = file.metadata().await?.len();
                let stream: ByteStream = Box::pin(ReaderStream::new(file));
                Ok((stream, len))
            }
            FileSource::Memory(bytes) => {
                let chunks: Vec<io::Result<Bytes>> = bytes
                    .chunks(MEMORY_CHUNK_SIZE)
                    .map(|chunk| Ok(bytes.slice_ref(chunk)))
                    .collect();
                let stream: ByteStream = Box::pin(futures_util::stream::iter(chunks));
                Ok((stream, bytes.len() as u64))
            }
        }
    }
}

/// A file offered to the uploader by a drop or a picker.
#[derive(Debug, Clone)]
pub struct FileHandle {
    pub name: String,
    pub source: FileSource,
    pub size: Option<u64>,
}

impl FileHandle {
    pub fn from_path(path: PathBuf) -> Self {
        let name = path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        let size = std::fs::metadata(&path).ok().map(|m| m.len());
        Self {
            name,
            source: FileSource::Path(path),
            size,
        }
    }

    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        Self {
            name: name.into(),
            size: Some(bytes.len() as u64),
            source: FileSource::Memory(bytes),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UploadStatus {
    Pending,
    Uploading,
    Done,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct PendingFile {
    pub file: FileHandle,
    /// Percentage of the body sent, 0..=100.
    pub progress: u8,
    pub status: UploadStatus,
}

impl PendingFile {
    pub fn new(file: FileHandle) -> Self {
        Self {
            file,
            progress: 0,
            status: UploadStatus::Pending,
        }
    }

    pub fn name(&self) -> &str {
        &self.file.name
    }
}

/// Messages sent from per-file upload tasks back to the manager.
#[derive(Debug)]
pub enum UploadEvent {
    Progress { index: usize, percent: u8 },
    Finished { index: usize, result: Result<(), String> },
}

/// Result of joining every task of one upload batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    pub succeeded: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl BatchOutcome {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Rounded percentage of `sent` over `total`; an empty body counts as complete.
pub fn progress_percent(sent: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    let percent = (sent.min(total) as f64 * 100.0 / total as f64).round();
    percent as u8
}
