mod notify;
mod state;
mod ui;

pub use notify::{batch_message, Toast, TOAST_DURATION, UPLOAD_SUCCESS_MESSAGE};
pub use state::{AppState, View};

use crate::api::ApiClient;
use crate::files::ReadyDownload;
use crate::upload::{scan_folder, FileHandle};
use eframe::{egui, App};
use rfd::FileDialog;
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;
use tracing::{info, warn};

const BUSY_REPAINT_INTERVAL: Duration = Duration::from_millis(100);

pub struct CsvUploader {
    runtime: Runtime,
    client: ApiClient,
    state: AppState,
}

impl CsvUploader {
    pub fn new(_cc: &eframe::CreationContext<'_>, runtime: Runtime, client: ApiClient) -> Self {
        info!("Initializing CSV uploader against {}", client.base_url());
        let mut state = AppState::new();
        state.load_banner(&client, runtime.handle());
        Self {
            runtime,
            client,
            state,
        }
    }

    fn navigate(&mut self, view: View) {
        self.state
            .navigate(view, &self.client, self.runtime.handle());
    }

    fn start_upload(&mut self) {
        self.state
            .uploads
            .upload_all(&self.client, self.runtime.handle());
    }

    fn refresh_files(&mut self) {
        self.state.files.refresh(&self.client, self.runtime.handle());
    }

    fn pick_files(&mut self) {
        if let Some(paths) = FileDialog::new().add_filter("CSV", &["csv"]).pick_files() {
            let files = paths.into_iter().map(FileHandle::from_path).collect();
            self.state.uploads.accept_drop(files);
        }
    }

    fn pick_folder(&mut self) {
        if let Some(folder) = FileDialog::new().pick_folder() {
            let files = scan_folder(&folder);
            if files.is_empty() {
                warn!("No csv files found in {}", folder.display());
            }
            self.state.uploads.accept_drop(files);
        }
    }

    fn collect_dropped_files(&mut self, ctx: &egui::Context) {
        let dropped = ctx.input(|i| i.raw.dropped_files.clone());
        if dropped.is_empty() {
            return;
        }

        let files: Vec<FileHandle> = dropped.into_iter().flat_map(handles_from_drop).collect();
        self.state.uploads.accept_drop(files);
    }

    fn save_download(&mut self, download: ReadyDownload) {
        let Some(path) = FileDialog::new()
            .set_file_name(&download.filename)
            .save_file()
        else {
            info!("Save of {} cancelled", download.filename);
            return;
        };

        self.state.save_error = match download.save_to(&path) {
            Ok(()) => None,
            Err(e) => {
                warn!("{:#}", e);
                Some(format!("{:#}", e))
            }
        };
    }

    pub fn update_state(&mut self, ctx: &egui::Context) {
        let now = Instant::now();
        if self
            .state
            .tick(&self.client, self.runtime.handle(), now)
        {
            ctx.request_repaint();
        }

        while let Some(download) = self.state.files.take_ready_download() {
            self.save_download(download);
        }

        // Background tasks report over channels, so keep polling while busy.
        if self.state.is_busy() {
            ctx.request_repaint_after(BUSY_REPAINT_INTERVAL);
        }
        if let Some(toast) = &self.state.toast {
            ctx.request_repaint_after(toast.remaining(now));
        }
    }
}

/// Turns one dropped item into upload candidates. Folders expand to the csv
/// files inside them; everything else goes through the extension filter.
fn handles_from_drop(file: egui::DroppedFile) -> Vec<FileHandle> {
    if let Some(path) = file.path {
        if path.is_dir() {
            return scan_folder(&path);
        }
        return vec![FileHandle::from_path(path)];
    }
    if let Some(bytes) = file.bytes {
        return vec![FileHandle::from_bytes(file.name, bytes.to_vec())];
    }
    warn!("Dropped item {} carried neither a path nor contents", file.name);
    Vec::new()
}

impl App for CsvUploader {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.collect_dropped_files(ctx);
        self.update_state(ctx);
        self.render(ctx);
    }
}
