use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use perfsignal_core::config::DetectorSettings;
use perfsignal_core::detector::{Detector, StudentConfidence};
use perfsignal_core::queue::{AlertQueue, ChannelAlertQueue};
use perfsignal_core::store::{Datastore, InMemoryStore};

mod worker;
use worker::ScanWorker;

const ALERT_CHANNEL_CAPACITY: usize = 256;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "perfsignal_daemon=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("starting perfsignal daemon");

    let settings = DetectorSettings::load(std::env::var("PERFSIGNAL_DETECTOR_CONFIG").ok().as_deref())?;
    let detector = Detector::new(settings.into_params("student"), Box::new(StudentConfidence));

    let store: Arc<dyn Datastore> = Arc::new(InMemoryStore::new());
    let (tx, rx) = mpsc::channel(ALERT_CHANNEL_CAPACITY);
    let queue: Arc<dyn AlertQueue> = Arc::new(ChannelAlertQueue::new(tx));

    let worker = ScanWorker::new(rx, store.clone(), detector);
    let worker_handle = tokio::spawn(worker.run());

    // `queue` is held open so the channel stays live; the HTTP/job-queue
    // front end that would actually call `enqueue_generate_alerts` on
    // ingestion is out of scope. This binary only owns the scan loop,
    // config loading, and logging such a worker would have.
    let _queue = queue;

    worker_handle.await?;
    Ok(())
}
