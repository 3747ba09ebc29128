use super::filter::is_csv;
use super::types::{progress_percent, FileHandle, UploadEvent};
use crate::api::ApiClient;
use ignore::WalkBuilder;
use std::path::Path;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

/// Collects every `.csv` file under `folder`, skipping anything ignored by
/// `.gitignore`/`.ignore` rules. Results are ordered by path.
pub fn scan_folder(folder: &Path) -> Vec<FileHandle> {
    let mut files = Vec::new();

    for entry in WalkBuilder::new(folder)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build()
    {
        match entry {
            Ok(entry) => {
                let path = entry.path();
                let is_csv_file = path.is_file()
                    && path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(is_csv);
                if is_csv_file {
                    files.push(FileHandle::from_path(path.to_path_buf()));
                }
            }
            Err(e) => {
                warn!("Error walking {}: {}", folder.display(), e);
            }
        }
    }

    debug!("Found {} csv files under {}", files.len(), folder.display());
    files
}

/// Body of one per-file upload task. The result is both returned through the
/// task's join handle and reported on `events`.
pub(crate) async fn upload_file(
    client: ApiClient,
    index: usize,
    file: FileHandle,
    events: UnboundedSender<UploadEvent>,
) -> Result<(), String> {
    let result = send_file(&client, index, &file, &events).await;

    match &result {
        Ok(()) => {
            info!("Uploaded {}", file.name);
            confirm_on_server(&client, &file.name).await;
        }
        Err(e) => error!("Error uploading {}: {}", file.name, e),
    }

    let _ = events.send(UploadEvent::Finished {
        index,
        result: result.clone(),
    });
    result
}

async fn send_file(
    client: &ApiClient,
    index: usize,
    file: &FileHandle,
    events: &UnboundedSender<UploadEvent>,
) -> Result<(), String> {
    let (body, total) = file
        .source
        .open()
        .await
        .map_err(|e| format!("Failed to read file: {}", e))?;

    let progress_events = events.clone();
    client
        .upload(&file.name, body, total, move |sent, total| {
            let _ = progress_events.send(UploadEvent::Progress {
                index,
                percent: progress_percent(sent, total),
            });
        })
        .await
        .map_err(|e| format!("{:#}", e))
}

async fn confirm_on_server(client: &ApiClient, filename: &str) {
    match client.progress(filename).await {
        Ok(progress) => debug!(
            "Server reports {:.0}% stored for {}",
            progress.progress_percentage, filename
        ),
        Err(e) => debug!("Could not confirm {} on server: {:#}", filename, e),
    }
}
