//! C2 — Signature Registry: upsert-by-hash of signature metadata, preserving
//! `last_updated` monotonicity.

use crate::error::StoreError;
use crate::signature::{Signature, SignatureKey};
use crate::store::Datastore;

/// `upsert(repo, hash, framework, application, defaults)` from §4.2.
///
/// Locates the row by its identity tuple. If absent, inserts `defaults`
/// as-is. If present, reconciles `last_updated` to
/// `max(existing.last_updated, defaults.last_updated)` and then overwrites
/// every other field from `defaults` — so `last_updated` is the only field
/// that ever takes the *old* row into account; everything else is
/// unconditionally replaced by the newest ingest.
///
/// Concurrent creators racing on the same identity tuple are expected to
/// collide on the store's unique constraint; one observes `created = true`
/// and the other falls through to the update branch, matching §4.2's
/// failure-mode note.
pub async fn upsert(
    store: &dyn Datastore,
    key: &SignatureKey,
    mut defaults: Signature,
) -> Result<Signature, StoreError> {
    let (signature, created) = store.get_or_create_signature(key, defaults.clone()).await?;
    if created {
        return Ok(signature);
    }

    if signature.last_updated > defaults.last_updated {
        defaults.last_updated = signature.last_updated;
    }
    store.update_signature(key, defaults).await
}
