//! State behind the file list view: the fetched records and downloads in
//! flight.

use crate::api::{ApiClient, FileId, UploadedFileRecord};
use anyhow::{Context, Result};
use bytes::Bytes;
use derivative::Derivative;
use std::path::Path;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;
use tracing::{error, info, warn};

/// Downloaded bytes waiting for the user to pick a save location.
#[derive(Debug, Clone)]
pub struct ReadyDownload {
    /// Name stored in the file record; used as the save-as suggestion.
    pub filename: String,
    pub bytes: Bytes,
}

impl ReadyDownload {
    pub fn save_to(&self, path: &Path) -> Result<()> {
        std::fs::write(path, &self.bytes)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Saved {} to {}", self.filename, path.display());
        Ok(())
    }
}

#[derive(Derivative)]
#[derivative(Debug)]
pub struct FileList {
    records: Vec<UploadedFileRecord>,
    #[derivative(Debug = "ignore")]
    refresh: Option<oneshot::Receiver<Vec<UploadedFileRecord>>>,
    #[derivative(Debug = "ignore")]
    download_sender: UnboundedSender<ReadyDownload>,
    #[derivative(Debug = "ignore")]
    download_receiver: UnboundedReceiver<ReadyDownload>,
}

impl Default for FileList {
    fn default() -> Self {
        let (download_sender, download_receiver) = mpsc::unbounded_channel();
        Self {
            records: Vec::new(),
            refresh: None,
            download_sender,
            download_receiver,
        }
    }
}

impl FileList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[UploadedFileRecord] {
        &self.records
    }

    pub fn is_loading(&self) -> bool {
        self.refresh.is_some()
    }

    /// Re-fetches the whole list. A failed fetch is logged and leaves the
    /// list empty. A newer refresh supersedes one still in flight.
    pub fn refresh(&mut self, client: &ApiClient, runtime: &Handle) {
        let (sender, receiver) = oneshot::channel();
        self.refresh = Some(receiver);

        let client = client.clone();
        runtime.spawn(async move {
            let records = match client.list_files().await {
                Ok(records) => {
                    info!("Fetched {} file records", records.len());
                    records
                }
                Err(e) => {
                    error!("Error fetching files: {:#}", e);
                    Vec::new()
                }
            };
            let _ = sender.send(records);
        });
    }

    /// Applies a finished refresh without blocking. Returns `true` if the
    /// list changed.
    pub fn poll(&mut self) -> bool {
        let Some(receiver) = self.refresh.as_mut() else {
            return false;
        };

        match receiver.try_recv() {
            Ok(records) => {
                self.records = records;
                self.refresh = None;
                true
            }
            Err(oneshot::error::TryRecvError::Empty) => false,
            Err(oneshot::error::TryRecvError::Closed) => {
                warn!("File list refresh ended without a response");
                self.refresh = None;
                false
            }
        }
    }

    /// Waits for the refresh in flight, if any.
    pub async fn settle(&mut self) {
        if let Some(receiver) = self.refresh.take() {
            self.records = receiver.await.unwrap_or_default();
        }
    }

    pub fn download(&self, client: &ApiClient, runtime: &Handle, id: FileId, filename: String) {
        let client = client.clone();
        let sender = self.download_sender.clone();

        runtime.spawn(async move {
            match client.download(&id).await {
                Ok(file) => {
                    if let Some(announced) = &file.disposition_name {
                        if *announced != filename {
                            warn!(
                                "Server named download {} as {}; keeping the record name",
                                filename, announced
                            );
                        }
                    }
                    info!("Downloaded {} ({} bytes)", filename, file.bytes.len());
                    let _ = sender.send(ReadyDownload {
                        filename,
                        bytes: file.bytes,
                    });
                }
                Err(e) => error!("Error downloading {}: {:#}", filename, e),
            }
        });
    }

    /// Next download ready to be saved, without blocking.
    pub fn take_ready_download(&mut self) -> Option<ReadyDownload> {
        self.download_receiver.try_recv().ok()
    }

    pub async fn next_download(&mut self) -> Option<ReadyDownload> {
        self.download_receiver.recv().await
    }
}
