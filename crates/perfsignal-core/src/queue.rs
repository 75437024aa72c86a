//! The alert-job queue (§6): a fire-and-forget enqueue keyed on a
//! signature. Out of scope is the broker itself — this crate only defines
//! the interface and a couple of reference implementations.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::warn;

use crate::signature::SignatureKey;

/// Name of the queue the source enqueues onto (§6).
pub const GENERATE_PERF_ALERTS_QUEUE: &str = "generate_perf_alerts";

/// Enqueue failures must never roll back ingestion (§7): implementations
/// should log and swallow, not return a `Result` the orchestrator would
/// have to handle.
#[async_trait]
pub trait AlertQueue: Send + Sync {
    async fn enqueue_generate_alerts(&self, signature: SignatureKey);
}

/// Forwards onto a bounded channel — the shape a worker (the daemon)
/// would drain to actually call out to a job queue.
pub struct ChannelAlertQueue {
    sender: mpsc::Sender<SignatureKey>,
}

impl ChannelAlertQueue {
    pub fn new(sender: mpsc::Sender<SignatureKey>) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl AlertQueue for ChannelAlertQueue {
    async fn enqueue_generate_alerts(&self, signature: SignatureKey) {
        if let Err(e) = self.sender.send(signature).await {
            warn!("failed to enqueue alert job; ingestion already committed: {}", e);
        }
    }
}

/// Discards every enqueue. Used where alerting genuinely isn't wired up
/// (demo/debug paths), never as a production default.
pub struct NullAlertQueue;

#[async_trait]
impl AlertQueue for NullAlertQueue {
    async fn enqueue_generate_alerts(&self, _signature: SignatureKey) {}
}

/// Not `cfg(test)`-gated: integration tests under `tests/` link this crate
/// as an ordinary dependency, so a unit-test-only module would be invisible
/// to them.
pub mod test_support {
    use super::*;
    use tokio::sync::Mutex;

    /// Records every enqueued signature for assertions.
    #[derive(Default)]
    pub struct RecordingAlertQueue {
        pub enqueued: Mutex<Vec<SignatureKey>>,
    }

    #[async_trait]
    impl AlertQueue for RecordingAlertQueue {
        async fn enqueue_generate_alerts(&self, signature: SignatureKey) {
            self.enqueued.lock().await.push(signature);
        }
    }
}
