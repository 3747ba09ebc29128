//! On-demand previews of uploaded files, cached per filename for the session.

use crate::api::{ApiClient, FileId};
use derivative::Derivative;
use std::collections::HashMap;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

pub const MAX_PREVIEW_LINES: usize = 5;

#[derive(Debug, Default)]
pub struct PreviewCache {
    entries: HashMap<String, Vec<String>>,
}

impl PreviewCache {
    /// Stores at most [`MAX_PREVIEW_LINES`] lines, replacing any earlier entry.
    pub fn store(&mut self, filename: impl Into<String>, mut lines: Vec<String>) {
        lines.truncate(MAX_PREVIEW_LINES);
        self.entries.insert(filename.into(), lines);
    }

    pub fn get(&self, filename: &str) -> Option<&[String]> {
        self.entries.get(filename).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

struct PreviewResult {
    filename: String,
    lines: anyhow::Result<Vec<String>>,
}

#[derive(Derivative)]
#[derivative(Debug)]
pub struct PreviewFetcher {
    cache: PreviewCache,
    #[derivative(Debug = "ignore")]
    sender: UnboundedSender<PreviewResult>,
    #[derivative(Debug = "ignore")]
    receiver: UnboundedReceiver<PreviewResult>,
    #[derivative(Debug = "ignore")]
    tasks: Vec<JoinHandle<()>>,
}

impl Default for PreviewFetcher {
    fn default() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            cache: PreviewCache::default(),
            sender,
            receiver,
            tasks: Vec::new(),
        }
    }
}

impl PreviewFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache(&self) -> &PreviewCache {
        &self.cache
    }

    pub fn is_loading(&self) -> bool {
        !self.tasks.is_empty()
    }

    pub fn fetch_preview(&mut self, client: &ApiClient, runtime: &Handle, id: FileId, filename: String) {
        let client = client.clone();
        let sender = self.sender.clone();

        self.tasks.push(runtime.spawn(async move {
            let lines = client.preview(&id).await;
            let _ = sender.send(PreviewResult { filename, lines });
        }));
    }

    /// Moves finished fetches into the cache. Returns `true` if anything changed.
    pub fn poll(&mut self) -> bool {
        // Finished tasks have already queued their result, if they sent one.
        let before = self.tasks.len();
        self.tasks.retain(|task| !task.is_finished());
        let mut changed = self.tasks.len() != before;

        while let Ok(result) = self.receiver.try_recv() {
            self.apply(result);
            changed = true;
        }
        changed
    }

    /// Waits for every outstanding fetch to land in the cache.
    pub async fn settle(&mut self) {
        for task in std::mem::take(&mut self.tasks) {
            if let Err(e) = task.await {
                warn!("Preview task ended without a result: {}", e);
            }
        }
        self.poll();
    }

    fn apply(&mut self, result: PreviewResult) {
        match result.lines {
            Ok(lines) => {
                info!("Preview of {}: {} lines", result.filename, lines.len());
                self.cache.store(result.filename, lines);
            }
            Err(e) => error!("Error fetching preview of {}: {:#}", result.filename, e),
        }
    }
}
