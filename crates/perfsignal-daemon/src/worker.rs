//! Scan worker: drains signature-key notifications pushed onto the alert
//! queue's channel and re-runs the change-point detector over that
//! signature's full series. Stands in for the out-of-scope alert-generation
//! job a real queue consumer would run.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};

use perfsignal_core::detector::{Detector, RevisionPoint};
use perfsignal_core::signature::SignatureKey;
use perfsignal_core::store::Datastore;

pub struct ScanWorker {
    receiver: mpsc::Receiver<SignatureKey>,
    store: Arc<dyn Datastore>,
    detector: Detector,
}

impl ScanWorker {
    pub fn new(receiver: mpsc::Receiver<SignatureKey>, store: Arc<dyn Datastore>, detector: Detector) -> Self {
        Self {
            receiver,
            store,
            detector,
        }
    }

    /// Runs until the channel's senders are all dropped.
    pub async fn run(mut self) {
        info!("scan worker started");
        while let Some(key) = self.receiver.recv().await {
            if let Err(e) = self.scan_one(&key).await {
                warn!("scan failed for signature {:?}: {}", key, e);
            }
        }
        info!("scan worker stopped, channel closed");
    }

    async fn scan_one(&self, key: &SignatureKey) -> Result<(), perfsignal_core::error::StoreError> {
        let signature = match self.store.get_signature(key).await? {
            Some(s) => s,
            None => {
                warn!("signature vanished before scan: {:?}", key);
                return Ok(());
            }
        };

        let datums = self.store.get_series(key).await?;
        let mut series: Vec<RevisionPoint> = datums
            .into_iter()
            .map(|d| RevisionPoint::new(d.push_timestamp, vec![d.value]))
            .collect();

        self.store.begin_transaction().await?;
        self.detector.detect_changes(&mut series, &signature);
        self.store.commit_transaction().await?;

        let flagged: Vec<usize> = series
            .iter()
            .enumerate()
            .filter(|(_, p)| p.change_detected)
            .map(|(i, _)| i)
            .collect();

        if !flagged.is_empty() {
            info!("change points detected for signature {:?}: {:?}", key, flagged);
        }

        Ok(())
    }
}
