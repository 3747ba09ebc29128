use serde::{Deserialize, Serialize};
use std::fmt;

/// Server-side identifier of an uploaded file.
///
/// The backend has used both integer primary keys and filenames as ids, so
/// the client keeps it as opaque text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawFileId")]
pub struct FileId(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawFileId {
    Number(i64),
    Text(String),
}

impl From<RawFileId> for FileId {
    fn from(raw: RawFileId) -> Self {
        match raw {
            RawFileId::Number(n) => FileId(n.to_string()),
            RawFileId::Text(s) => FileId(s),
        }
    }
}

impl FileId {
    pub fn new(id: impl Into<String>) -> Self {
        FileId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UploadedFileRecord {
    pub id: FileId,
    pub filename: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServerProgress {
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub uploaded_size: Option<u64>,
    pub progress_percentage: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerMessage {
    pub message: String,
}

/// Body of `GET /download/:id`.
#[derive(Debug, Clone)]
pub struct DownloadedFile {
    /// Filename announced in `Content-Disposition`, if any.
    pub disposition_name: Option<String>,
    pub bytes: bytes::Bytes,
}
