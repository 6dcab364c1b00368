//! # One-Directional Cancellation
//!
//! Cancellation propagates downstream only. Cancelling a source
//! (dispatch or sales bill) cancels every submitted counterpart linked
//! to it, by canonical or legacy reference; cancelling a generated
//! document (receipt or purchase bill) never touches its source's
//! lifecycle — it only clears the reference pair so the source can be
//! paired again.
//!
//! The cascade suppresses the backlink check a host framework would
//! apply to the generated side — the counterpart's own cancellation must
//! not turn around and try to cancel the source it is linked to.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use ibt_core::DocId;
use ibt_doc::{DocumentStore, LifecycleError, LinkField, StoreError, TransferDocument};

/// What a cancellation touched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancellationOutcome {
    /// Documents transitioned to cancelled, the requested one first.
    pub cancelled: Vec<DocId>,
    /// Reference slots cleared, as (document, slot) pairs.
    pub references_cleared: Vec<(DocId, LinkField)>,
}

/// Errors from the cancellation flow.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CancelError {
    /// The document does not exist.
    #[error("document not found: {0}")]
    NotFound(DocId),

    /// The document is not in a cancellable state.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// The underlying store refused a write.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Cancel a document, applying the one-directional policy.
pub fn cancel_document<S: DocumentStore>(
    store: &S,
    doc_id: DocId,
) -> Result<CancellationOutcome, CancelError> {
    let doc = store.get(&doc_id).ok_or(CancelError::NotFound(doc_id))?;

    if doc.role.is_source() {
        cancel_source(store, doc)
    } else {
        cancel_generated(store, doc)
    }
}

/// Cancel a source document and cascade to its submitted counterparts.
fn cancel_source<S: DocumentStore>(
    store: &S,
    mut doc: TransferDocument,
) -> Result<CancellationOutcome, CancelError> {
    let mut outcome = CancellationOutcome::default();

    doc.cancel()?;
    store.update(doc.clone())?;
    outcome.cancelled.push(doc.id);

    for mut counterpart in store.counterparts_of(&doc.id) {
        if !counterpart.is_submitted() {
            continue;
        }
        // The counterpart is cancelled directly, with no backlink
        // enforcement: its link to the source must not block, and its
        // own generated-side cleanup must not run against the source we
        // are already cancelling.
        counterpart.cancel()?;
        store.update(counterpart.clone())?;
        outcome.cancelled.push(counterpart.id);
        tracing::info!(
            source = %doc.id,
            counterpart = %counterpart.id,
            "cancellation cascaded to generated counterpart"
        );
    }

    Ok(outcome)
}

/// Cancel a generated document; clear the reference pair, leave the
/// source's lifecycle untouched.
fn cancel_generated<S: DocumentStore>(
    store: &S,
    mut doc: TransferDocument,
) -> Result<CancellationOutcome, CancelError> {
    let mut outcome = CancellationOutcome::default();

    doc.cancel()?;
    store.update(doc.clone())?;
    outcome.cancelled.push(doc.id);

    for (field, source_id) in doc.outbound_links() {
        if field == LinkField::Legacy {
            // Legacy references are never written, including clears.
            continue;
        }
        let Some(source) = store.get(&source_id) else {
            continue;
        };
        // Clear only if the source still points back at the cancelled
        // document through the same slot.
        let source_points_back = source.reference(field) == Some(doc.id);
        let doc_points = store
            .get(&doc.id)
            .map(|d| d.reference(field) == Some(source_id))
            .unwrap_or(false);
        if source_points_back || doc_points {
            store.unlink(&doc.id, &source_id, field)?;
            if source_points_back {
                outcome.references_cleared.push((source_id, field));
            }
            if doc_points {
                outcome.references_cleared.push((doc.id, field));
            }
        }
    }

    Ok(outcome)
}
