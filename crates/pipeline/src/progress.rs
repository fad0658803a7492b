// crates/pipeline/src/progress.rs
//! Non-blocking progress event emission.
//!
//! Events are plain UTF-8 strings for an external consumer (reporting,
//! CLI progress bar). Back-pressure never blocks the pipeline: a full or
//! closed channel silently drops the event.

use tokio::sync::mpsc;

#[derive(Clone)]
pub struct ProgressSender {
    tx: Option<mpsc::Sender<String>>,
}

impl ProgressSender {
    pub fn new(tx: mpsc::Sender<String>) -> Self {
        Self { tx: Some(tx) }
    }

    /// A sender that drops everything; for runs nobody is watching.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Fire-and-forget emit. Never blocks, never fails.
    pub fn emit(&self, message: impl Into<String>) {
        let Some(tx) = &self.tx else {
            return;
        };
        let message = message.into();
        if let Err(err) = tx.try_send(message) {
            tracing::trace!(error = %err, "progress event dropped");
        }
    }
}

/// Build a progress channel with the given buffer capacity.
pub fn channel(capacity: usize) -> (ProgressSender, mpsc::Receiver<String>) {
    let (tx, rx) = mpsc::channel(capacity);
    (ProgressSender::new(tx), rx)
}
