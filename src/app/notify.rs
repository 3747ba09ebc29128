use crate::upload::BatchOutcome;
use std::time::{Duration, Instant};

pub const TOAST_DURATION: Duration = Duration::from_millis(2000);

pub const UPLOAD_SUCCESS_MESSAGE: &str = "Files successfully uploaded!";

/// Transient notification shown for [`TOAST_DURATION`] after it is raised.
#[derive(Debug, Clone)]
pub struct Toast {
    message: String,
    raised_at: Instant,
}

impl Toast {
    pub fn new(message: impl Into<String>, now: Instant) -> Self {
        Self {
            message: message.into(),
            raised_at: now,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_visible(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.raised_at) < TOAST_DURATION
    }

    pub fn remaining(&self, now: Instant) -> Duration {
        TOAST_DURATION.saturating_sub(now.saturating_duration_since(self.raised_at))
    }
}

/// Toast text for a finished batch; `None` when nothing was uploaded.
pub fn batch_message(outcome: &BatchOutcome) -> Option<String> {
    if outcome.succeeded.is_empty() {
        None
    } else if outcome.all_succeeded() {
        Some(UPLOAD_SUCCESS_MESSAGE.to_string())
    } else {
        Some(format!(
            "Uploaded {} of {} files",
            outcome.succeeded.len(),
            outcome.total()
        ))
    }
}
