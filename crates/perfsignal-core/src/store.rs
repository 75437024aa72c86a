//! The persistence boundary (§6). This core never talks to a database
//! directly — it calls through `Datastore`, and any conforming backend
//! (Postgres, SQLite, an in-memory test double) can be dropped in.
//!
//! `InMemoryStore` here is the reference implementation used by the test
//! suite and the CLI's demo mode; it is not meant for production use, the
//! same way the teacher repo ships a `MockBackend` alongside the real
//! platform backend.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::datum::{Datum, DatumKey, JobId, NewDatum, PushId, Replicate};
use crate::error::StoreError;
use crate::signature::{Signature, SignatureKey};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Framework {
    pub name: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionCollection {
    pub hash: String,
    pub name: String,
}

/// Required store operations (§6): signature upsert/lookup, datum
/// get-or-create, best-effort replicate and multi-commit inserts, the two
/// reference-data lookups ingestion needs, and a transaction scope for the
/// detector's magnitude filter.
#[async_trait]
pub trait Datastore: Send + Sync {
    async fn get_framework_by_name(&self, name: &str) -> Result<Option<Framework>, StoreError>;

    async fn get_option_collection_by_hash(
        &self,
        hash: &str,
    ) -> Result<OptionCollection, StoreError>;

    /// C2's upsert: get-or-create by the identity tuple, returning whether
    /// the row was newly inserted.
    async fn get_or_create_signature(
        &self,
        key: &SignatureKey,
        defaults: Signature,
    ) -> Result<(Signature, bool), StoreError>;

    /// Overwrites the row's fields from `defaults` (`last_updated` already
    /// reconciled by the caller — see `registry::upsert`).
    async fn update_signature(
        &self,
        key: &SignatureKey,
        defaults: Signature,
    ) -> Result<Signature, StoreError>;

    async fn get_signature(&self, key: &SignatureKey) -> Result<Option<Signature>, StoreError>;

    /// Full historical series for a signature, ascending by
    /// `push_timestamp` with ties broken by insertion order — feeds C6.
    async fn get_series(&self, key: &SignatureKey) -> Result<Vec<Datum>, StoreError>;

    #[allow(clippy::too_many_arguments)]
    async fn get_or_create_datum(
        &self,
        repository: &str,
        job: &JobId,
        push: &PushId,
        signature: &SignatureKey,
        push_timestamp: DateTime<Utc>,
        defaults: NewDatum,
    ) -> Result<(Datum, bool), StoreError>;

    async fn bulk_create_replicates(
        &self,
        datum: &DatumKey,
        replicates: &[Replicate],
    ) -> Result<(), StoreError>;

    async fn create_multi_commit_marker(&self, datum: &DatumKey) -> Result<(), StoreError>;

    /// Opens a transaction scope (§5): the magnitude-filter pass must read
    /// and write a consistent snapshot. A single-connection reference
    /// store can treat this as a no-op serialization point; a real
    /// backend starts a DB transaction here and must release it on every
    /// exit path, including errors.
    async fn begin_transaction(&self) -> Result<(), StoreError>;
    async fn commit_transaction(&self) -> Result<(), StoreError>;
    async fn rollback_transaction(&self) -> Result<(), StoreError>;
}

#[derive(Default)]
struct InMemoryState {
    frameworks: HashMap<String, Framework>,
    option_collections: HashMap<String, OptionCollection>,
    signatures: HashMap<SignatureKey, Signature>,
    datums: HashMap<DatumKey, Datum>,
    /// insertion order per signature, to break push_timestamp ties stably.
    datum_order: Vec<DatumKey>,
    replicates: HashMap<DatumKey, Vec<Replicate>>,
    multi_commit: HashSet<DatumKey>,
}

/// An in-process `Datastore`. Good enough to exercise the full pipeline in
/// tests and the CLI's demo mode without a real database.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<InMemoryState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed_framework(&self, name: &str, enabled: bool) {
        let mut state = self.state.lock().await;
        state.frameworks.insert(
            name.to_string(),
            Framework {
                name: name.to_string(),
                enabled,
            },
        );
    }

    pub async fn seed_option_collection(&self, hash: &str, name: &str) {
        let mut state = self.state.lock().await;
        state.option_collections.insert(
            hash.to_string(),
            OptionCollection {
                hash: hash.to_string(),
                name: name.to_string(),
            },
        );
    }

    pub async fn replicate_count(&self, datum: &DatumKey) -> usize {
        let state = self.state.lock().await;
        state.replicates.get(datum).map(|v| v.len()).unwrap_or(0)
    }

    pub async fn is_multi_commit_marked(&self, datum: &DatumKey) -> bool {
        let state = self.state.lock().await;
        state.multi_commit.contains(datum)
    }
}

#[async_trait]
impl Datastore for InMemoryStore {
    async fn get_framework_by_name(&self, name: &str) -> Result<Option<Framework>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.frameworks.get(name).cloned())
    }

    async fn get_option_collection_by_hash(
        &self,
        hash: &str,
    ) -> Result<OptionCollection, StoreError> {
        let state = self.state.lock().await;
        state
            .option_collections
            .get(hash)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("option_collection({hash})")))
    }

    async fn get_or_create_signature(
        &self,
        key: &SignatureKey,
        defaults: Signature,
    ) -> Result<(Signature, bool), StoreError> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state.signatures.get(key) {
            return Ok((existing.clone(), false));
        }
        state.signatures.insert(key.clone(), defaults.clone());
        Ok((defaults, true))
    }

    async fn update_signature(
        &self,
        key: &SignatureKey,
        defaults: Signature,
    ) -> Result<Signature, StoreError> {
        let mut state = self.state.lock().await;
        if !state.signatures.contains_key(key) {
            return Err(StoreError::NotFound(format!("signature({key:?})")));
        }
        state.signatures.insert(key.clone(), defaults.clone());
        Ok(defaults)
    }

    async fn get_signature(&self, key: &SignatureKey) -> Result<Option<Signature>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.signatures.get(key).cloned())
    }

    async fn get_series(&self, key: &SignatureKey) -> Result<Vec<Datum>, StoreError> {
        let state = self.state.lock().await;
        let mut series: Vec<Datum> = state
            .datum_order
            .iter()
            .filter_map(|k| state.datums.get(k))
            .filter(|d| &d.signature == key)
            .cloned()
            .collect();
        series.sort_by_key(|d| d.push_timestamp);
        Ok(series)
    }

    async fn get_or_create_datum(
        &self,
        repository: &str,
        job: &JobId,
        push: &PushId,
        signature: &SignatureKey,
        push_timestamp: DateTime<Utc>,
        defaults: NewDatum,
    ) -> Result<(Datum, bool), StoreError> {
        let mut state = self.state.lock().await;
        let datum_key: DatumKey = (
            repository.to_string(),
            job.0.clone(),
            push.0.clone(),
            signature.clone(),
            push_timestamp,
        );
        if let Some(existing) = state.datums.get(&datum_key) {
            return Ok((existing.clone(), false));
        }
        let datum = Datum {
            repository: repository.to_string(),
            job: job.clone(),
            push: push.clone(),
            signature: signature.clone(),
            push_timestamp,
            value: defaults.value,
            application_version: defaults.application_version,
        };
        state.datums.insert(datum_key.clone(), datum.clone());
        state.datum_order.push(datum_key);
        Ok((datum, true))
    }

    async fn bulk_create_replicates(
        &self,
        datum: &DatumKey,
        replicates: &[Replicate],
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state
            .replicates
            .entry(datum.clone())
            .or_default()
            .extend(replicates.iter().cloned());
        Ok(())
    }

    async fn create_multi_commit_marker(&self, datum: &DatumKey) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.multi_commit.insert(datum.clone());
        Ok(())
    }

    async fn begin_transaction(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn commit_transaction(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn rollback_transaction(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
