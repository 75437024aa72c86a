//! Error taxonomy for the ingestion and detection pipeline.
//!
//! Mirrors the propagation policy of the source design: validation failures
//! abort before any write, store failures propagate for the caller to retry,
//! and replicate-insert failures are logged and swallowed rather than raised
//! at all (see `orchestrator::ingest_artifact`, which never returns a
//! `ReplicateInsertError` — it only logs one).

use thiserror::Error;

/// Errors that can surface from ingestion.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The artifact failed upstream schema validation. Nothing was written.
    #[error("artifact failed validation: {0}")]
    Validation(String),

    /// A transient datastore failure. Retriable by the caller.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors surfaced by the `Datastore` trait's mutating operations.
///
/// Modeled as retriable: a caller that sees this should retry the whole
/// artifact, since each datum is independently durable and idempotent.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("backing store unavailable: {0}")]
    Unavailable(String),

    #[error("unique constraint violated for {0}")]
    Conflict(String),

    #[error("record not found: {0}")]
    NotFound(String),
}

/// Raised only internally by replicate ingestion; never escapes
/// `datum::record` — it is caught and logged at `info` level per §7(d).
#[derive(Debug, Error)]
#[error("failed to ingest replicates: {0}")]
pub struct ReplicateInsertError(pub String);
