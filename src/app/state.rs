use super::notify::{batch_message, Toast};
use crate::api::ApiClient;
use crate::files::FileList;
use crate::preview::PreviewFetcher;
use crate::upload::{BatchOutcome, UploadManager, UploadStatus};
use derivative::Derivative;
use std::time::Instant;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Upload,
    FileList,
}

impl View {
    pub fn label(self) -> &'static str {
        match self {
            View::Upload => "File Upload",
            View::FileList => "File List",
        }
    }
}

#[derive(Derivative, Default)]
#[derivative(Debug)]
pub struct AppState {
    pub view: View,
    pub uploads: UploadManager,
    pub files: FileList,
    pub previews: PreviewFetcher,
    pub toast: Option<Toast>,
    /// Greeting served at the API root.
    pub banner: Option<String>,
    pub show_details: bool,
    pub save_error: Option<String>,
    /// View to open once the toast is gone.
    navigate_after_toast: Option<View>,
    #[derivative(Debug = "ignore")]
    banner_receiver: Option<oneshot::Receiver<Option<String>>>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Switches views; opening the file list always re-fetches it.
    pub fn navigate(&mut self, view: View, client: &ApiClient, runtime: &Handle) {
        info!("Navigating to {}", view.label());
        self.view = view;
        if view == View::FileList {
            self.files.refresh(client, runtime);
        }
    }

    pub fn load_banner(&mut self, client: &ApiClient, runtime: &Handle) {
        let (sender, receiver) = oneshot::channel();
        self.banner_receiver = Some(receiver);

        let client = client.clone();
        runtime.spawn(async move {
            let message = match client.server_message().await {
                Ok(message) => Some(message),
                Err(e) => {
                    error!("Error fetching message: {:#}", e);
                    None
                }
            };
            let _ = sender.send(message);
        });
    }

    /// Raises the toast for a finished batch and schedules the move to the
    /// file list. A batch with no successful file stays on the upload view.
    pub fn on_batch_complete(&mut self, outcome: &BatchOutcome, now: Instant) {
        match batch_message(outcome) {
            Some(message) => {
                self.toast = Some(Toast::new(message, now));
                self.navigate_after_toast = Some(View::FileList);
            }
            None => {
                self.toast = None;
                self.navigate_after_toast = None;
            }
        }
    }

    /// Drains every background result and advances timers. Returns `true`
    /// when something visible changed.
    pub fn tick(&mut self, client: &ApiClient, runtime: &Handle, now: Instant) -> bool {
        let mut changed = false;

        if let Some(outcome) = self.uploads.poll() {
            self.on_batch_complete(&outcome, now);
            changed = true;
        }

        if self.expire_toast(now) {
            if let Some(view) = self.navigate_after_toast.take() {
                self.navigate(view, client, runtime);
            }
            changed = true;
        }

        changed |= self.files.poll();
        changed |= self.previews.poll();
        changed |= self.poll_banner();
        changed
    }

    /// Drops the toast once its window has passed.
    fn expire_toast(&mut self, now: Instant) -> bool {
        match &self.toast {
            Some(toast) if !toast.is_visible(now) => {
                self.toast = None;
                true
            }
            _ => false,
        }
    }

    fn poll_banner(&mut self) -> bool {
        let Some(receiver) = self.banner_receiver.as_mut() else {
            return false;
        };
        match receiver.try_recv() {
            Ok(message) => {
                self.banner = message;
                self.banner_receiver = None;
                true
            }
            Err(oneshot::error::TryRecvError::Empty) => false,
            Err(oneshot::error::TryRecvError::Closed) => {
                self.banner_receiver = None;
                false
            }
        }
    }

    pub fn is_busy(&self) -> bool {
        self.uploads.is_uploading()
            || self.files.is_loading()
            || self.previews.is_loading()
            || self.banner_receiver.is_some()
    }

    /// Mean progress over the pending set, 0.0..=1.0.
    pub fn overall_progress(&self) -> f32 {
        let pending = self.uploads.pending();
        if pending.is_empty() {
            return 0.0;
        }
        let sum: u32 = pending.iter().map(|f| u32::from(f.progress)).sum();
        sum as f32 / (pending.len() as f32 * 100.0)
    }

    pub fn status_text(&self) -> String {
        let pending = self.uploads.pending();
        let done = pending
            .iter()
            .filter(|f| f.status == UploadStatus::Done)
            .count();
        let failed = pending
            .iter()
            .filter(|f| matches!(f.status, UploadStatus::Failed(_)))
            .count();
        format!(
            "Progress: {}/{} files | ✅ Done: {} | ❌ Failed: {}",
            done + failed,
            pending.len(),
            done,
            failed
        )
    }
}
