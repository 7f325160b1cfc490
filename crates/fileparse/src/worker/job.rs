use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// A unit of queued work: one job id plus its cancellation flag.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    pub cancel: Arc<AtomicBool>,
    pub enqueued_at: Instant,
}

impl Job {
    pub fn new(id: impl Into<String>, cancel: Arc<AtomicBool>) -> Self {
        Self {
            id: id.into(),
            cancel,
            enqueued_at: Instant::now(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }
}
