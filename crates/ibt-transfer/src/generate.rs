//! # Counterpart Document Generation
//!
//! Builds the receiving-side document for a submitted source transfer:
//! a receipt from a dispatch (intra-jurisdiction), a purchase bill from
//! a sales bill (inter-jurisdiction), a receipt from a sales bill (the
//! stocked intake chain), or a purchase bill from such a receipt.
//!
//! ## One-Shot Semantics
//!
//! Generation is all-or-nothing: if any non-cancelled counterpart
//! already exists for the source, generation is refused outright.
//! Quantity netting (`qty + returned − received`) decides which source
//! lines are *eligible*, covering receipts recorded outside this engine;
//! eligible lines are mirrored verbatim.
//!
//! The candidate is parity-validated before insert, and the
//! bidirectional reference is written atomically — a failed reference
//! write rolls the candidate insert back.

use thiserror::Error;

use ibt_core::DocId;
use ibt_doc::{
    DocRole, DocumentStore, LinkField, PartyDirectory, PartyError, StoreError, TransferDocument,
    TransferLine,
};

use crate::parity::{validate_parity, ParityError};
use crate::scope::{is_legal_pair, resolve_scope, JurisdictionScope};

// ---------------------------------------------------------------------------
// Tax engine seam
// ---------------------------------------------------------------------------

/// Tax re-derivation failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("tax re-derivation failed: {0}")]
pub struct TaxEngineError(pub String);

/// Host tax computation, invoked on the candidate after its party and
/// addresses are in place. Taxes are re-derived for the receiving side,
/// never copied from the source.
pub trait TaxEngine {
    /// Derive and write the candidate's tax totals from its own party,
    /// addresses, and lines.
    fn rederive(&self, doc: &mut TransferDocument) -> Result<(), TaxEngineError>;
}

/// Tax engine that derives zero tax — the correct behavior for goods
/// movements with no invoice value recognition.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTaxEngine;

impl TaxEngine for NullTaxEngine {
    fn rederive(&self, doc: &mut TransferDocument) -> Result<(), TaxEngineError> {
        doc.totals.tax_total = rust_decimal::Decimal::ZERO;
        doc.totals.base_tax_total = rust_decimal::Decimal::ZERO;
        Ok(())
    }
}

/// Tax engine applying a single flat rate to the net total. Stands in
/// for the host tax engine in tests and demos.
#[derive(Debug, Clone, Copy)]
pub struct FlatRateTaxEngine {
    /// Tax rate as a fraction (0.18 for 18%).
    pub rate: rust_decimal::Decimal,
}

impl TaxEngine for FlatRateTaxEngine {
    fn rederive(&self, doc: &mut TransferDocument) -> Result<(), TaxEngineError> {
        let net: rust_decimal::Decimal = doc.lines.iter().map(|l| l.net_amount).sum();
        let base_net: rust_decimal::Decimal = doc.lines.iter().map(|l| l.base_net_amount).sum();
        doc.totals.tax_total = ibt_core::round_money(net * self.rate);
        doc.totals.base_tax_total = ibt_core::round_money(base_net * self.rate);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors refusing or failing counterpart generation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerateError {
    /// The source does not exist.
    #[error("source document not found: {0}")]
    SourceNotFound(DocId),

    /// Only submitted documents generate counterparts.
    #[error("source document {0} is not submitted")]
    SourceNotSubmitted(DocId),

    /// The source role cannot originate a counterpart in its scope.
    #[error("document {doc} ({role}) cannot originate a counterpart in {scope} scope")]
    WrongSourceRole {
        /// The refused source.
        doc: DocId,
        /// Its role.
        role: DocRole,
        /// The resolved scope.
        scope: JurisdictionScope,
    },

    /// A non-cancelled counterpart already exists.
    #[error("source document {doc} is already linked to {existing}")]
    AlreadyLinked {
        /// The refused source.
        doc: DocId,
        /// The existing counterpart.
        existing: DocId,
    },

    /// The source names no counterparty registration to generate for.
    #[error("source document {0} carries no counterparty tax registration")]
    MissingCounterpartyTin(DocId),

    /// Every source line is already fully received.
    #[error("source document {0}: quantity already fully received")]
    QuantityExhausted(DocId),

    /// Party directory lookup failed.
    #[error(transparent)]
    Party(#[from] PartyError),

    /// The candidate failed parity against its source.
    #[error(transparent)]
    Parity(#[from] ParityError),

    /// Tax re-derivation failed.
    #[error(transparent)]
    Tax(#[from] TaxEngineError),

    /// The underlying store refused a write.
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// Collaborators the generator needs.
pub struct GenerationContext<'a, S, P, T>
where
    S: DocumentStore,
    P: PartyDirectory,
    T: TaxEngine,
{
    /// Document storage.
    pub store: &'a S,
    /// Party directory for the receiving unit lookup.
    pub parties: &'a P,
    /// Host tax computation.
    pub taxes: &'a T,
}

/// The generated-role and link slot for a source document, per the legal
/// pattern of its scope. The stocked intake chain is selected by the
/// source itself: a sales bill generates a receipt when `stocked` is
/// requested, and a receipt with an intake reference generates the
/// purchase bill completing the chain.
fn target_shape(
    source: &TransferDocument,
    scope: JurisdictionScope,
    stocked: bool,
) -> Option<(DocRole, LinkField)> {
    match (scope, source.role) {
        (JurisdictionScope::Same, DocRole::Dispatch) => {
            Some((DocRole::Receipt, LinkField::Counterpart))
        }
        (JurisdictionScope::Different, DocRole::SalesBill) if stocked => {
            Some((DocRole::Receipt, LinkField::Intake))
        }
        (JurisdictionScope::Different, DocRole::SalesBill) => {
            Some((DocRole::PurchaseBill, LinkField::Counterpart))
        }
        (JurisdictionScope::Different, DocRole::Receipt)
            if source.intake_reference.is_some() =>
        {
            Some((DocRole::PurchaseBill, LinkField::Counterpart))
        }
        _ => None,
    }
}

/// Generate the counterpart for a submitted source document.
///
/// `stocked` requests the intake chain from a sales bill (a receipt is
/// generated instead of the purchase bill); it is ignored for other
/// source roles.
///
/// On success the candidate is inserted, both reference slots are
/// written, and the candidate is returned as stored.
pub fn generate_counterpart<S, P, T>(
    ctx: &GenerationContext<'_, S, P, T>,
    source_id: DocId,
    stocked: bool,
) -> Result<TransferDocument, GenerateError>
where
    S: DocumentStore,
    P: PartyDirectory,
    T: TaxEngine,
{
    let source = ctx
        .store
        .get(&source_id)
        .ok_or(GenerateError::SourceNotFound(source_id))?;
    if !source.is_submitted() {
        return Err(GenerateError::SourceNotSubmitted(source_id));
    }

    let scope = resolve_scope(&source).scope;
    let (target_role, link_field) =
        target_shape(&source, scope, stocked).ok_or(GenerateError::WrongSourceRole {
            doc: source_id,
            role: source.role,
            scope,
        })?;

    // Strict one-shot: any live counterpart refuses generation.
    if let Some(existing) = live_counterpart(ctx.store, &source) {
        return Err(GenerateError::AlreadyLinked {
            doc: source_id,
            existing,
        });
    }

    let other_tin = source
        .counterparty_tin
        .clone()
        .ok_or(GenerateError::MissingCounterpartyTin(source_id))?;
    let party = ctx.parties.party_representing(&other_tin)?;

    // Dispatch → receipt and bill → bill cross to the other side, so
    // the registrations swap and the address roles invert. The receipt →
    // purchase-bill hop of the stocked chain stays on the receiving
    // side: the receipt already carries that side's orientation.
    let crossing = source.role != DocRole::Receipt;

    let mut candidate = TransferDocument::new(target_role, source.posting_date);
    if crossing {
        candidate.unit_tin = source.counterparty_tin.clone();
        candidate.counterparty_tin = source.unit_tin.clone();
        candidate.addresses = source.addresses.inverted();
    } else {
        candidate.unit_tin = source.unit_tin.clone();
        candidate.counterparty_tin = source.counterparty_tin.clone();
        candidate.addresses = source.addresses.clone();
    }
    candidate.party = Some(party.id);
    candidate.currency = source.currency.clone();
    candidate.internal_transfer = true;

    for line in source.lines.iter().filter(|l| {
        l.unreceived_qty() > rust_decimal::Decimal::ZERO
    }) {
        candidate.lines.push(mirror_line(line));
    }
    if candidate.lines.is_empty() {
        return Err(GenerateError::QuantityExhausted(source_id));
    }

    ctx.taxes.rederive(&mut candidate)?;
    candidate.rederive_totals();

    validate_parity(&source, &candidate)?;

    ctx.store.insert(candidate.clone())?;
    if let Err(err) = ctx.store.link(&source_id, &candidate.id, link_field) {
        // Roll the candidate back; the pair is all-or-nothing.
        let _ = ctx.store.remove(&candidate.id);
        return Err(err.into());
    }

    tracing::info!(
        source = %source_id,
        candidate = %candidate.id,
        role = %target_role,
        field = %link_field,
        scope = %scope,
        "generated transfer counterpart"
    );

    // Return the stored state, references included.
    Ok(ctx
        .store
        .get(&candidate.id)
        .unwrap_or(candidate))
}

/// The live (non-cancelled) counterpart of a source, if any.
///
/// Links are symmetric, so direction comes from the roles: a linked
/// document counts as a counterpart of `source` only when some legal
/// pattern has `source`'s role on the originating side and the linked
/// document's role on the generated side through that slot. A receipt's
/// own upstream intake link to its sales bill is *not* a counterpart of
/// the receipt.
fn live_counterpart<S: DocumentStore>(store: &S, source: &TransferDocument) -> Option<DocId> {
    let mut linked: Vec<(LinkField, TransferDocument)> = Vec::new();
    for (field, target) in source.outbound_links() {
        if let Some(doc) = store.get(&target) {
            linked.push((field, doc));
        }
    }
    for doc in store.all() {
        for (field, target) in doc.outbound_links() {
            if target == source.id {
                linked.push((field, doc.clone()));
            }
        }
    }

    linked
        .into_iter()
        .find(|(field, doc)| !doc.is_cancelled() && is_legal_pair(source.role, doc.role, *field))
        .map(|(_, doc)| doc.id)
}

/// Mirror one eligible source line onto a candidate line: quantities,
/// rates, and amounts verbatim; locations and costing cleared for
/// downstream re-derivation; bridging fields pointed back at the source.
fn mirror_line(src: &TransferLine) -> TransferLine {
    TransferLine {
        id: ibt_core::LineId::new(),
        item_code: src.item_code.clone(),
        uom: src.uom.clone(),
        qty: src.qty,
        stock_qty: src.stock_qty,
        rate: src.rate,
        amount: src.amount,
        net_amount: src.net_amount,
        base_rate: src.base_rate,
        base_amount: src.base_amount,
        base_net_amount: src.base_net_amount,
        warehouse: None,
        cost_center: None,
        expense_account: None,
        source_line: Some(src.id),
        transfer_rate: src.transfer_rate.or(Some(src.base_rate)),
        received_qty: rust_decimal::Decimal::ZERO,
        returned_qty: rust_decimal::Decimal::ZERO,
    }
}

/// Convenience for callers that only need the shape decision (used by
/// the scope diagnostic).
pub fn expected_counterpart(
    source: &TransferDocument,
    stocked: bool,
) -> Option<(DocRole, LinkField)> {
    target_shape(source, resolve_scope(source).scope, stocked)
}
