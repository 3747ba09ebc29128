use super::file_processor::upload_file;
use super::filter::{partition_csv, INVALID_FILE_MESSAGE};
use super::types::{BatchOutcome, FileHandle, PendingFile, UploadEvent, UploadStatus};
use crate::api::ApiClient;
use derivative::Derivative;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;
use tracing::{info, warn};

const ABORTED_MESSAGE: &str = "Upload task ended without reporting a result";

#[derive(Derivative)]
#[derivative(Debug)]
struct Batch {
    /// The batch covers `pending[..size]`.
    size: usize,
    settled: usize,
    #[derivative(Debug = "ignore")]
    events: UnboundedReceiver<UploadEvent>,
    #[derivative(Debug = "ignore")]
    tasks: Vec<JoinHandle<Result<(), String>>>,
}

/// Owns the pending set and drives upload batches.
#[derive(Debug, Default)]
pub struct UploadManager {
    pending: Vec<PendingFile>,
    /// Final state of the files of the last finished batch.
    last_batch: Vec<PendingFile>,
    error: Option<String>,
    batch: Option<Batch>,
}

impl UploadManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> &[PendingFile] {
        &self.pending
    }

    pub fn last_batch(&self) -> &[PendingFile] {
        &self.last_batch
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_uploading(&self) -> bool {
        self.batch.is_some()
    }

    /// Queues the `.csv` files of a drop. Anything else is discarded and
    /// raises the validation error.
    pub fn accept_drop(&mut self, files: Vec<FileHandle>) {
        let (valid, invalid) = partition_csv(files);

        if invalid.is_empty() {
            self.error = None;
        } else {
            let rejected: Vec<&str> = invalid.iter().map(|f| f.name.as_str()).collect();
            warn!("Rejected non-csv files: {:?}", rejected);
            self.error = Some(INVALID_FILE_MESSAGE.to_string());
        }

        self.pending.extend(valid.into_iter().map(PendingFile::new));
    }

    /// Starts one upload task per pending file. Returns `false` when there is
    /// nothing to upload or a batch is already running.
    pub fn upload_all(&mut self, client: &ApiClient, runtime: &Handle) -> bool {
        if self.pending.is_empty() || self.batch.is_some() {
            return false;
        }

        let (sender, events) = mpsc::unbounded_channel();
        let mut tasks = Vec::with_capacity(self.pending.len());

        for (index, pending) in self.pending.iter_mut().enumerate() {
            pending.status = UploadStatus::Uploading;
            pending.progress = 0;
            tasks.push(runtime.spawn(upload_file(
                client.clone(),
                index,
                pending.file.clone(),
                sender.clone(),
            )));
        }

        info!("Started upload batch of {} files", tasks.len());
        self.error = None;
        self.last_batch.clear();
        self.batch = Some(Batch {
            size: tasks.len(),
            settled: 0,
            events,
            tasks,
        });
        true
    }

    /// Applies every queued task event without blocking. Returns the outcome
    /// once every file of the running batch has settled.
    pub fn poll(&mut self) -> Option<BatchOutcome> {
        let batch = self.batch.as_mut()?;

        // Snapshot before draining: a task that is already finished has
        // already queued its result, so a missing result means it died.
        let finished: Vec<usize> = batch
            .tasks
            .iter()
            .enumerate()
            .filter(|(_, task)| task.is_finished())
            .map(|(index, _)| index)
            .collect();

        while let Ok(event) = batch.events.try_recv() {
            apply_event(&mut self.pending, batch, event);
        }

        for index in finished {
            settle_if_unsettled(&mut self.pending, batch, index);
        }

        self.finish_if_settled()
    }

    /// Waits for the running batch to settle. Returns `None` when no batch is
    /// running.
    pub async fn wait(&mut self) -> Option<BatchOutcome> {
        loop {
            if let Some(outcome) = self.poll() {
                return Some(outcome);
            }
            let batch = self.batch.as_mut()?;

            match batch.events.recv().await {
                Some(event) => apply_event(&mut self.pending, batch, event),
                None => {
                    // Every sender is gone, so every task has ended.
                    for index in 0..batch.size {
                        settle_if_unsettled(&mut self.pending, batch, index);
                    }
                }
            }
        }
    }

    fn finish_if_settled(&mut self) -> Option<BatchOutcome> {
        let batch = self.batch.as_ref()?;
        if batch.settled < batch.size {
            return None;
        }

        let size = batch.size;
        self.batch = None;

        self.last_batch = self.pending.drain(..size).collect();

        let mut outcome = BatchOutcome::default();
        for file in &self.last_batch {
            match &file.status {
                UploadStatus::Failed(reason) => {
                    outcome.failed.push((file.name().to_string(), reason.clone()))
                }
                _ => outcome.succeeded.push(file.name().to_string()),
            }
        }

        if !outcome.failed.is_empty() {
            let details: Vec<String> = outcome
                .failed
                .iter()
                .map(|(name, reason)| format!("{} ({})", name, reason))
                .collect();
            self.error = Some(format!("Failed to upload: {}", details.join("; ")));
        }

        info!(
            "Upload batch complete: {} succeeded, {} failed",
            outcome.succeeded.len(),
            outcome.failed.len()
        );
        Some(outcome)
    }
}

fn apply_event(pending: &mut [PendingFile], batch: &mut Batch, event: UploadEvent) {
    match event {
        UploadEvent::Progress { index, percent } => {
            if let Some(file) = pending.get_mut(index) {
                if file.status == UploadStatus::Uploading {
                    file.progress = percent;
                }
            }
        }
        UploadEvent::Finished { index, result } => {
            if let Some(file) = pending.get_mut(index) {
                if file.status != UploadStatus::Uploading {
                    return;
                }
                match result {
                    Ok(()) => {
                        file.status = UploadStatus::Done;
                        file.progress = 100;
                    }
                    Err(reason) => file.status = UploadStatus::Failed(reason),
                }
                batch.settled += 1;
            }
        }
    }
}

fn settle_if_unsettled(pending: &mut [PendingFile], batch: &mut Batch, index: usize) {
    if let Some(file) = pending.get_mut(index) {
        if file.status == UploadStatus::Uploading {
            warn!("Upload task for {} ended without a result", file.name());
            file.status = UploadStatus::Failed(ABORTED_MESSAGE.to_string());
            batch.settled += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn csv(name: &str) -> FileHandle {
        FileHandle::from_bytes(name, "a,b\n1,2\n")
    }

    #[test]
    fn csv_files_are_queued_with_zero_progress() {
        let mut manager = UploadManager::new();
        manager.accept_drop(vec![csv("one.csv"), csv("two.csv")]);

        let names: Vec<_> = manager.pending().iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["one.csv", "two.csv"]);
        assert!(manager
            .pending()
            .iter()
            .all(|f| f.progress == 0 && f.status == UploadStatus::Pending));
        assert_eq!(manager.error(), None);
    }

    #[test]
    fn invalid_files_raise_error_and_are_discarded() {
        let mut manager = UploadManager::new();
        manager.accept_drop(vec![csv("ok.csv"), csv("bad.txt")]);

        assert_eq!(manager.error(), Some(INVALID_FILE_MESSAGE));
        assert_eq!(manager.pending().len(), 1);
        assert_eq!(manager.pending()[0].name(), "ok.csv");
    }

    #[test]
    fn clean_drop_clears_previous_error() {
        let mut manager = UploadManager::new();
        manager.accept_drop(vec![csv("bad.json")]);
        assert!(manager.error().is_some());
        assert!(manager.pending().is_empty());

        manager.accept_drop(vec![csv("good.csv")]);
        assert_eq!(manager.error(), None);
        assert_eq!(manager.pending().len(), 1);
    }

    #[test]
    fn drops_accumulate_in_arrival_order() {
        let mut manager = UploadManager::new();
        manager.accept_drop(vec![csv("b.csv")]);
        manager.accept_drop(vec![csv("a.csv"), csv("c.csv")]);

        let names: Vec<_> = manager.pending().iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["b.csv", "a.csv", "c.csv"]);
    }

    /// Puts every pending file in flight behind a batch fed by the returned sender.
    fn start_manual_batch(manager: &mut UploadManager) -> mpsc::UnboundedSender<UploadEvent> {
        let (sender, events) = mpsc::unbounded_channel();
        for file in &mut manager.pending {
            file.status = UploadStatus::Uploading;
        }
        manager.batch = Some(Batch {
            size: manager.pending.len(),
            settled: 0,
            events,
            tasks: Vec::new(),
        });
        sender
    }

    #[test]
    fn progress_events_update_each_file_independently() {
        let mut manager = UploadManager::new();
        manager.accept_drop(vec![csv("one.csv"), csv("two.csv")]);
        let events = start_manual_batch(&mut manager);

        events
            .send(UploadEvent::Progress { index: 0, percent: 40 })
            .unwrap();
        events
            .send(UploadEvent::Progress { index: 1, percent: 7 })
            .unwrap();
        events
            .send(UploadEvent::Progress { index: 0, percent: 65 })
            .unwrap();
        assert!(manager.poll().is_none());

        let progress: Vec<_> = manager.pending().iter().map(|f| f.progress).collect();
        assert_eq!(progress, vec![65, 7]);
        assert!(manager
            .pending()
            .iter()
            .all(|f| f.status == UploadStatus::Uploading));
    }

    #[test]
    fn progress_after_finish_is_ignored() {
        let mut manager = UploadManager::new();
        manager.accept_drop(vec![csv("one.csv"), csv("two.csv")]);
        let events = start_manual_batch(&mut manager);

        events
            .send(UploadEvent::Finished { index: 0, result: Ok(()) })
            .unwrap();
        events
            .send(UploadEvent::Progress { index: 0, percent: 30 })
            .unwrap();
        events
            .send(UploadEvent::Finished {
                index: 1,
                result: Err("boom".to_string()),
            })
            .unwrap();
        events
            .send(UploadEvent::Progress { index: 1, percent: 90 })
            .unwrap();

        let outcome = manager.poll().expect("batch settled");
        assert_eq!(outcome.succeeded, vec!["one.csv"]);

        let last = manager.last_batch();
        assert_eq!(last[0].status, UploadStatus::Done);
        assert_eq!(last[0].progress, 100);
        assert_eq!(last[1].status, UploadStatus::Failed("boom".to_string()));
        assert_eq!(last[1].progress, 0);
    }

    #[tokio::test]
    async fn upload_all_without_pending_files_is_a_noop() {
        let mut manager = UploadManager::new();
        let client = ApiClient::new("http://127.0.0.1:9", None).unwrap();

        assert!(!manager.upload_all(&client, &Handle::current()));
        assert!(!manager.is_uploading());
        assert!(manager.poll().is_none());
        assert!(manager.wait().await.is_none());
    }
}
