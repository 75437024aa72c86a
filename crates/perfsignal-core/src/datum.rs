//! C3 — Datum Recorder: upsert of one measurement per (signature, job, push,
//! timestamp), with optional replicates and an optional multi-commit tag.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::error::StoreError;
use crate::signature::SignatureKey;
use crate::store::Datastore;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PushId(pub String);

/// Identity of a datum: `(repository, job, push, signature, push_timestamp)`
/// (§3). Duplicates on this key are silently coalesced — the existing
/// record wins on value.
pub type DatumKey = (String, String, String, SignatureKey, DateTime<Utc>);

#[derive(Debug, Clone, PartialEq)]
pub struct Datum {
    pub repository: String,
    pub job: JobId,
    pub push: PushId,
    pub signature: SignatureKey,
    pub push_timestamp: DateTime<Utc>,
    pub value: f64,
    pub application_version: String,
}

impl Datum {
    pub fn key(&self) -> DatumKey {
        (
            self.repository.clone(),
            self.job.0.clone(),
            self.push.0.clone(),
            self.signature.clone(),
            self.push_timestamp,
        )
    }

    /// A datum is tagged multi-commit only at creation time, and only if
    /// the artifact's own `pushTimestamp` differed from the job's push
    /// time (§3, `MultiCommitDatum`).
    pub fn should_mark_as_multi_commit(&self, is_multi_commit: bool, created: bool) -> bool {
        is_multi_commit && created
    }
}

/// Fields supplied on first creation; ignored (existing value wins) on a
/// duplicate-key upsert.
#[derive(Debug, Clone)]
pub struct NewDatum {
    pub value: f64,
    pub application_version: String,
}

/// One raw sub-measurement belonging to a datum (§3). Best-effort: insert
/// failures never abort datum ingestion.
#[derive(Debug, Clone, PartialEq)]
pub struct Replicate {
    pub value: f64,
}

/// C3 — `record`.
///
/// 1. Upserts the datum by its identity key.
/// 2. If newly created and the caller says this is multi-commit data,
///    creates the `MultiCommitDatum` marker.
/// 3. If newly created and the caller passed replicates, bulk-inserts them.
///    Per §3's lifecycle invariant, replicates and multi-commit markers are
///    created only alongside datum *creation*, never on an upsert of an
///    already-existing datum — so both steps below are gated on `created`,
///    not merely on "replicates were supplied" (see DESIGN.md).
///
/// Replicate-insert failures are logged at `info` and swallowed (§7d): they
/// must never fail the surrounding ingestion.
#[allow(clippy::too_many_arguments)]
pub async fn record(
    store: &dyn Datastore,
    repository: &str,
    job: JobId,
    push: PushId,
    signature: &SignatureKey,
    push_timestamp: DateTime<Utc>,
    value: f64,
    application_version: &str,
    replicates: &[f64],
    is_multi_commit: bool,
) -> Result<(Datum, bool), StoreError> {
    let (datum, created) = store
        .get_or_create_datum(
            repository,
            &job,
            &push,
            signature,
            push_timestamp,
            NewDatum {
                value,
                application_version: application_version.to_string(),
            },
        )
        .await?;

    if datum.should_mark_as_multi_commit(is_multi_commit, created) {
        store.create_multi_commit_marker(&datum.key()).await?;
    }

    if created && !replicates.is_empty() {
        let values: Vec<Replicate> = replicates.iter().map(|&v| Replicate { value: v }).collect();
        if let Err(e) = store.bulk_create_replicates(&datum.key(), &values).await {
            info!("failed to ingest replicates for datum {:?}: {}", datum.key(), e);
        }
    }

    Ok((datum, created))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> SignatureKey {
        (
            "autoland".to_string(),
            "talos".to_string(),
            "".to_string(),
            "deadbeef".to_string(),
        )
    }

    #[test]
    fn multi_commit_marker_gated_on_created_and_flag() {
        let datum = Datum {
            repository: "autoland".into(),
            job: JobId("job1".into()),
            push: PushId("push1".into()),
            signature: key(),
            push_timestamp: Utc::now(),
            value: 1.0,
            application_version: String::new(),
        };

        assert!(datum.should_mark_as_multi_commit(true, true));
        assert!(!datum.should_mark_as_multi_commit(true, false));
        assert!(!datum.should_mark_as_multi_commit(false, true));
    }
}
