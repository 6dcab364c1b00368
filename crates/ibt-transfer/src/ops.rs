//! # Operator Conversion Flows
//!
//! The request/response operations exposed to operators: marking
//! documents as internal transfers (singly and in bulk, with a
//! write-free preview mode), the standalone item-match pre-check, the
//! submit-time validation contract, and the best-effort compliance
//! notification hook.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use ibt_core::DocId;
use ibt_doc::{
    DocRole, DocumentStore, LinkField, PartyDirectory, StoreError, TransferDocument,
};

use crate::parity::{diff_documents, validate_parity, MatchReport, ParityError};
use crate::scope::{is_legal_pair, validate_links, LinkageError};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from the operator flows.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OpsError {
    /// The document does not exist.
    #[error("document not found: {0}")]
    NotFound(DocId),

    /// The underlying store refused a write.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A submission blocked by linkage or parity rules.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    /// The document's links violate the scope rules.
    #[error(transparent)]
    Linkage(#[from] LinkageError),

    /// The document is out of parity with its source.
    #[error(transparent)]
    Parity(#[from] ParityError),

    /// The linked source disappeared between validation steps.
    #[error("source document not found: {0}")]
    SourceNotFound(DocId),
}

// ---------------------------------------------------------------------------
// convert_to_internal
// ---------------------------------------------------------------------------

/// Result of a single conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvertOutcome {
    /// The flag was set by this call.
    Converted,
    /// The document was already marked internal; nothing changed.
    AlreadyInternal,
}

/// Mark a document as an internal transfer, optionally linking it to a
/// known counterpart. Idempotent: re-converting an already-internal
/// document is a no-op, and an already-present identical link is kept.
pub fn convert_to_internal<S: DocumentStore>(
    store: &S,
    doc_id: DocId,
    counterpart: Option<DocId>,
) -> Result<ConvertOutcome, OpsError> {
    let mut doc = store.get(&doc_id).ok_or(OpsError::NotFound(doc_id))?;

    let outcome = if doc.internal_transfer {
        ConvertOutcome::AlreadyInternal
    } else {
        doc.internal_transfer = true;
        store.update(doc.clone())?;
        ConvertOutcome::Converted
    };

    if let Some(other) = counterpart {
        let field = pairing_field(&doc, store.get(&other).as_ref());
        if doc.reference(field) != Some(other) {
            store.link(&doc_id, &other, field)?;
        }
    }

    Ok(outcome)
}

/// The slot a manual pairing belongs in: the intake slot for a sales
/// bill / receipt pair, the canonical slot otherwise.
fn pairing_field(doc: &TransferDocument, other: Option<&TransferDocument>) -> LinkField {
    match other {
        Some(other) => {
            let roles = (doc.role, other.role);
            if matches!(
                roles,
                (DocRole::SalesBill, DocRole::Receipt) | (DocRole::Receipt, DocRole::SalesBill)
            ) {
                LinkField::Intake
            } else {
                LinkField::Counterpart
            }
        }
        None => LinkField::Counterpart,
    }
}

// ---------------------------------------------------------------------------
// Bulk conversion
// ---------------------------------------------------------------------------

/// Counts reported by the bulk conversion flows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionCounts {
    /// Documents inspected.
    pub scanned: usize,
    /// Documents converted (or convertible, in preview).
    pub converted: usize,
    /// Converted documents that already carried a counterpart link.
    pub linked: usize,
    /// Documents skipped: no party represents the counterparty unit.
    pub skipped: usize,
}

/// Convert every eligible submitted document on or after `from_date`.
///
/// A document is eligible when its counterparty registration resolves to
/// a flagged internal party. With `force`, documents whose lookup fails
/// are still converted when they already carry a legacy reference —
/// evidence the pair predates tax-ID backfill.
pub fn bulk_convert<S: DocumentStore, P: PartyDirectory>(
    store: &S,
    parties: &P,
    from_date: NaiveDate,
    force: bool,
) -> Result<ConversionCounts, OpsError> {
    run_bulk(store, parties, from_date, force, true)
}

/// [`bulk_convert`] without writes: report what would happen.
pub fn bulk_preview<S: DocumentStore, P: PartyDirectory>(
    store: &S,
    parties: &P,
    from_date: NaiveDate,
    force: bool,
) -> Result<ConversionCounts, OpsError> {
    run_bulk(store, parties, from_date, force, false)
}

fn run_bulk<S: DocumentStore, P: PartyDirectory>(
    store: &S,
    parties: &P,
    from_date: NaiveDate,
    force: bool,
    apply: bool,
) -> Result<ConversionCounts, OpsError> {
    let mut counts = ConversionCounts::default();

    for doc in store.all() {
        if !doc.is_submitted() || doc.internal_transfer || doc.posting_date < from_date {
            continue;
        }
        counts.scanned += 1;

        let eligible = match &doc.counterparty_tin {
            Some(tin) => parties.party_representing(tin).is_ok(),
            None => false,
        };
        let forced = !eligible && force && doc.legacy_reference.is_some();

        if !eligible && !forced {
            counts.skipped += 1;
            continue;
        }

        counts.converted += 1;
        if doc.counterpart_reference.is_some() || doc.legacy_reference.is_some() {
            counts.linked += 1;
        }
        if apply {
            let mut updated = doc.clone();
            updated.internal_transfer = true;
            store.update(updated)?;
        }
    }

    tracing::info!(
        from_date = %from_date,
        force,
        apply,
        scanned = counts.scanned,
        converted = counts.converted,
        linked = counts.linked,
        skipped = counts.skipped,
        "bulk internal-transfer conversion pass finished"
    );
    Ok(counts)
}

// ---------------------------------------------------------------------------
// Pre-checks and submit validation
// ---------------------------------------------------------------------------

/// Non-blocking item-match pre-check between two documents, for UI use
/// before a manual link. Reuses the parity comparison in full-report
/// mode.
pub fn validate_items_match<S: DocumentStore>(
    store: &S,
    source_id: DocId,
    candidate_id: DocId,
) -> Result<MatchReport, OpsError> {
    let source = store.get(&source_id).ok_or(OpsError::NotFound(source_id))?;
    let candidate = store
        .get(&candidate_id)
        .ok_or(OpsError::NotFound(candidate_id))?;
    Ok(diff_documents(&source, &candidate))
}

/// The submit-time validation contract for generated documents: links
/// must match the single legal pattern for the resolved scope, and the
/// document must be in parity with its linked source.
pub fn validate_submission<S: DocumentStore>(
    store: &S,
    doc: &TransferDocument,
) -> Result<(), SubmitError> {
    validate_links(store, doc)?;

    if !doc.role.is_generated() {
        return Ok(());
    }
    // validate_links guarantees exactly one upstream link; find it,
    // skipping downstream pointers (a stocked-chain receipt also points
    // at the purchase bill generated from it).
    for (field, target) in doc.outbound_links() {
        if field == LinkField::Legacy {
            continue;
        }
        let source = store
            .get(&target)
            .ok_or(SubmitError::SourceNotFound(target))?;
        if is_legal_pair(doc.role, source.role, field) {
            continue;
        }
        validate_parity(&source, doc)?;
        break;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Compliance notification (best-effort)
// ---------------------------------------------------------------------------

/// Downstream compliance integration failed. Never blocks submission.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("compliance notification failed: {0}")]
pub struct NotifyError(pub String);

/// Downstream transport-compliance integration (waybill generation and
/// the like), notified after a document submits.
pub trait ComplianceNotifier {
    /// React to a submitted document.
    fn document_submitted(&self, doc: &TransferDocument) -> Result<(), NotifyError>;
}

/// Invoke the notifier, degrading failures to a warning. Returns whether
/// the notification succeeded so callers can surface an informational
/// message.
pub fn notify_submission<N: ComplianceNotifier>(notifier: &N, doc: &TransferDocument) -> bool {
    match notifier.document_submitted(doc) {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(
                doc = %doc.id,
                role = %doc.role,
                error = %err,
                "compliance notification failed; submission proceeds"
            );
            false
        }
    }
}
