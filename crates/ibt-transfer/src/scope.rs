//! # Jurisdiction Scope Resolution
//!
//! A transfer between two units of one consolidated business is either
//! intra-jurisdiction (both units share a tax registration — goods move
//! on dispatch/receipt documents) or inter-jurisdiction (registrations
//! differ — settlement requires the invoice pair). The scope fixes the
//! single legal (role, link-field) pattern for the generated counterpart.
//!
//! ## Fallback
//!
//! When a tax ID is missing the scope is inferred from whichever legal
//! link already exists; when neither an ID nor a link is available the
//! transfer is classified as intra-jurisdiction — the stricter branch,
//! which demands transport detail rather than silently permitting an
//! unlinked document. The resolution source is always reported so the
//! fallback is auditable.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use ibt_core::DocId;
use ibt_doc::{DocRole, DocumentStore, LinkField, TransferDocument};

// ---------------------------------------------------------------------------
// JurisdictionScope
// ---------------------------------------------------------------------------

/// Whether the two sides of a transfer share a tax registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JurisdictionScope {
    /// Both units carry the same tax registration.
    Same,
    /// The units are separately registered.
    Different,
}

impl JurisdictionScope {
    /// Return the string value for serialization and display.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Same => "same",
            Self::Different => "different",
        }
    }
}

impl std::fmt::Display for JurisdictionScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a scope classification was arrived at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeResolution {
    /// Both tax IDs were present and compared.
    FromTaxIds,
    /// A tax ID was missing; the existing link in this slot decided.
    FromExistingLink(LinkField),
    /// Neither IDs nor links were available; defaulted to the stricter
    /// intra-jurisdiction branch.
    DefaultedToSame,
}

/// A scope classification together with its provenance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedScope {
    /// The classification.
    pub scope: JurisdictionScope,
    /// How it was resolved.
    pub resolution: ScopeResolution,
}

/// Classify a document's transfer scope.
///
/// Uses the two tax registrations when both are present; otherwise falls
/// back to whichever legal link already exists, and finally defaults to
/// [`JurisdictionScope::Same`] with a warning.
pub fn resolve_scope(doc: &TransferDocument) -> ResolvedScope {
    if let (Some(own), Some(other)) = (&doc.unit_tin, &doc.counterparty_tin) {
        let scope = if own == other {
            JurisdictionScope::Same
        } else {
            JurisdictionScope::Different
        };
        return ResolvedScope {
            scope,
            resolution: ScopeResolution::FromTaxIds,
        };
    }

    // A counterpart link on a goods document implies the intra branch;
    // on a bill, the inter branch. An intake link only exists on the
    // inter-jurisdiction stocked chain.
    if doc.intake_reference.is_some() {
        return ResolvedScope {
            scope: JurisdictionScope::Different,
            resolution: ScopeResolution::FromExistingLink(LinkField::Intake),
        };
    }
    if doc.counterpart_reference.is_some() || doc.legacy_reference.is_some() {
        let field = if doc.counterpart_reference.is_some() {
            LinkField::Counterpart
        } else {
            LinkField::Legacy
        };
        let scope = match doc.role {
            DocRole::Dispatch | DocRole::Receipt => JurisdictionScope::Same,
            DocRole::SalesBill | DocRole::PurchaseBill => JurisdictionScope::Different,
        };
        return ResolvedScope {
            scope,
            resolution: ScopeResolution::FromExistingLink(field),
        };
    }

    tracing::warn!(
        doc = %doc.id,
        role = %doc.role,
        "no tax registrations or links available — defaulting transfer scope to same-jurisdiction"
    );
    ResolvedScope {
        scope: JurisdictionScope::Same,
        resolution: ScopeResolution::DefaultedToSame,
    }
}

// ---------------------------------------------------------------------------
// Legal link patterns
// ---------------------------------------------------------------------------

/// A legal (source role, generated role, link slot) triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkPattern {
    /// Role of the document that originates the pair.
    pub source: DocRole,
    /// Role of the generated counterpart.
    pub generated: DocRole,
    /// The reference slot that carries the pair.
    pub field: LinkField,
}

const SAME_PATTERNS: &[LinkPattern] = &[LinkPattern {
    source: DocRole::Dispatch,
    generated: DocRole::Receipt,
    field: LinkField::Counterpart,
}];

const DIFFERENT_PATTERNS: &[LinkPattern] = &[
    LinkPattern {
        source: DocRole::SalesBill,
        generated: DocRole::PurchaseBill,
        field: LinkField::Counterpart,
    },
    // Stocked chain: the receiving side takes physical stock in before
    // invoicing. The receipt hangs off the sales bill via the intake
    // slot, and the purchase bill generated from that receipt pairs with
    // it through the canonical slot.
    LinkPattern {
        source: DocRole::SalesBill,
        generated: DocRole::Receipt,
        field: LinkField::Intake,
    },
    LinkPattern {
        source: DocRole::Receipt,
        generated: DocRole::PurchaseBill,
        field: LinkField::Counterpart,
    },
];

/// The legal link patterns for a scope.
pub fn legal_patterns(scope: JurisdictionScope) -> &'static [LinkPattern] {
    match scope {
        JurisdictionScope::Same => SAME_PATTERNS,
        JurisdictionScope::Different => DIFFERENT_PATTERNS,
    }
}

/// Whether `(source, generated)` through `field` is a legal pair in any
/// scope. The legacy slot stands in for the canonical one on older
/// documents.
pub fn is_legal_pair(source: DocRole, generated: DocRole, field: LinkField) -> bool {
    let effective = if field == LinkField::Legacy {
        LinkField::Counterpart
    } else {
        field
    };
    SAME_PATTERNS
        .iter()
        .chain(DIFFERENT_PATTERNS)
        .any(|p| p.source == source && p.generated == generated && p.field == effective)
}

// ---------------------------------------------------------------------------
// Link validation
// ---------------------------------------------------------------------------

/// Linkage violations. All of these block submission.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkageError {
    /// A generated document carries links into both source roles.
    #[error("ambiguous source: document {doc} links both a goods document and a bill")]
    AmbiguousSource {
        /// The offending document.
        doc: DocId,
    },

    /// A generated document carries no outbound link.
    #[error("document {doc} ({role}) carries no link to its source")]
    MissingLink {
        /// The offending document.
        doc: DocId,
        /// Its role.
        role: DocRole,
    },

    /// A generated document carries more than one outbound link where
    /// one is legal.
    #[error("document {doc} carries {count} outbound links; exactly one is legal")]
    DuplicateLink {
        /// The offending document.
        doc: DocId,
        /// How many links it carries.
        count: usize,
    },

    /// The link does not match the legal pattern for the resolved scope.
    #[error(
        "document {doc} ({role}) links via {field} in {scope} scope; no legal pattern matches"
    )]
    WrongScope {
        /// The offending document.
        doc: DocId,
        /// Its role.
        role: DocRole,
        /// The slot carrying the link.
        field: LinkField,
        /// The resolved scope.
        scope: JurisdictionScope,
    },

    /// The link target has the wrong role for the pattern.
    #[error(
        "document {doc} links {target} via {field}, which is a {actual} — expected a {expected}"
    )]
    WrongRole {
        /// The offending document.
        doc: DocId,
        /// The linked document.
        target: DocId,
        /// The slot carrying the link.
        field: LinkField,
        /// The role the pattern expects.
        expected: DocRole,
        /// The role actually found.
        actual: DocRole,
    },

    /// The link target does not exist.
    #[error("document {doc} links missing document {target}")]
    TargetNotFound {
        /// The offending document.
        doc: DocId,
        /// The dangling reference.
        target: DocId,
    },
}

/// Validate a generated document's links at submit time.
///
/// A generated document must carry exactly one upstream link — a link
/// toward the document it was generated from. Links where this document
/// is itself the originating side of a legal pair (a stocked-chain
/// receipt pointing at the purchase bill generated from it) are
/// downstream and do not count. The upstream link must match the single
/// legal pattern for the resolved scope, and the document must not be
/// claimable by both a goods document and a bill.
pub fn validate_links<S: DocumentStore>(
    store: &S,
    doc: &TransferDocument,
) -> Result<(), LinkageError> {
    if !doc.role.is_generated() {
        return Ok(());
    }

    let links: Vec<(LinkField, DocId)> = doc
        .outbound_links()
        .into_iter()
        .filter(|(field, _)| *field != LinkField::Legacy)
        .collect();

    // Resolve targets up front; a dangling reference is its own error.
    let mut upstream = Vec::with_capacity(links.len());
    for (field, target) in &links {
        let target_doc = store.get(target).ok_or(LinkageError::TargetNotFound {
            doc: doc.id,
            target: *target,
        })?;
        // A link where this document originates the pair is downstream;
        // only upstream links name a source.
        if is_legal_pair(doc.role, target_doc.role, *field) {
            continue;
        }
        upstream.push((*field, *target, target_doc.role));
    }

    if upstream.is_empty() {
        return Err(LinkageError::MissingLink {
            doc: doc.id,
            role: doc.role,
        });
    }

    // Links into both a goods document and a bill cannot name a single
    // source.
    let has_goods_source = upstream.iter().any(|(_, _, role)| role.moves_stock());
    let has_bill_source = upstream.iter().any(|(_, _, role)| !role.moves_stock());
    if has_goods_source && has_bill_source {
        return Err(LinkageError::AmbiguousSource { doc: doc.id });
    }

    if upstream.len() > 1 {
        return Err(LinkageError::DuplicateLink {
            doc: doc.id,
            count: upstream.len(),
        });
    }

    let (field, target, actual_role) = upstream[0];
    let scope = resolve_scope(doc).scope;
    let candidates: Vec<&LinkPattern> = legal_patterns(scope)
        .iter()
        .filter(|p| p.generated == doc.role && p.field == field)
        .collect();

    if candidates.is_empty() {
        return Err(LinkageError::WrongScope {
            doc: doc.id,
            role: doc.role,
            field,
            scope,
        });
    }
    if !candidates.iter().any(|p| p.source == actual_role) {
        return Err(LinkageError::WrongRole {
            doc: doc.id,
            target,
            field,
            expected: candidates[0].source,
            actual: actual_role,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ibt_core::Tin;
    use ibt_doc::MemoryDocumentStore;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 4, 1).unwrap()
    }

    fn tin(s: &str) -> Tin {
        Tin::new(s).unwrap()
    }

    fn doc(role: DocRole) -> TransferDocument {
        TransferDocument::new(role, date())
    }

    // -- scope resolution --

    #[test]
    fn equal_tins_resolve_same() {
        let mut d = doc(DocRole::Dispatch);
        d.unit_tin = Some(tin("27UNITHO01"));
        d.counterparty_tin = Some(tin("27unitho01"));
        let resolved = resolve_scope(&d);
        assert_eq!(resolved.scope, JurisdictionScope::Same);
        assert_eq!(resolved.resolution, ScopeResolution::FromTaxIds);
    }

    #[test]
    fn differing_tins_resolve_different() {
        let mut d = doc(DocRole::SalesBill);
        d.unit_tin = Some(tin("27UNITHO01"));
        d.counterparty_tin = Some(tin("29UNITBLR1"));
        assert_eq!(resolve_scope(&d).scope, JurisdictionScope::Different);
    }

    #[test]
    fn missing_tin_infers_from_counterpart_link_and_role() {
        let mut r = doc(DocRole::Receipt);
        r.counterpart_reference = Some(DocId::new());
        let resolved = resolve_scope(&r);
        assert_eq!(resolved.scope, JurisdictionScope::Same);
        assert_eq!(
            resolved.resolution,
            ScopeResolution::FromExistingLink(LinkField::Counterpart)
        );

        let mut p = doc(DocRole::PurchaseBill);
        p.counterpart_reference = Some(DocId::new());
        assert_eq!(resolve_scope(&p).scope, JurisdictionScope::Different);
    }

    #[test]
    fn intake_link_always_infers_different() {
        let mut r = doc(DocRole::Receipt);
        r.intake_reference = Some(DocId::new());
        let resolved = resolve_scope(&r);
        assert_eq!(resolved.scope, JurisdictionScope::Different);
        assert_eq!(
            resolved.resolution,
            ScopeResolution::FromExistingLink(LinkField::Intake)
        );
    }

    #[test]
    fn nothing_available_defaults_to_same() {
        let d = doc(DocRole::Dispatch);
        let resolved = resolve_scope(&d);
        assert_eq!(resolved.scope, JurisdictionScope::Same);
        assert_eq!(resolved.resolution, ScopeResolution::DefaultedToSame);
    }

    // -- legal patterns --

    #[test]
    fn same_scope_has_single_pattern() {
        let patterns = legal_patterns(JurisdictionScope::Same);
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].source, DocRole::Dispatch);
        assert_eq!(patterns[0].generated, DocRole::Receipt);
    }

    // -- link validation --

    fn stored(store: &MemoryDocumentStore, d: TransferDocument) -> DocId {
        let id = d.id;
        store.insert(d).unwrap();
        id
    }

    #[test]
    fn source_documents_skip_validation() {
        let store = MemoryDocumentStore::new();
        let d = doc(DocRole::Dispatch);
        assert!(validate_links(&store, &d).is_ok());
    }

    #[test]
    fn unlinked_generated_document_rejected() {
        let store = MemoryDocumentStore::new();
        let r = doc(DocRole::Receipt);
        assert!(matches!(
            validate_links(&store, &r),
            Err(LinkageError::MissingLink { .. })
        ));
    }

    #[test]
    fn valid_same_scope_receipt_passes() {
        let store = MemoryDocumentStore::new();
        let dispatch_id = stored(&store, doc(DocRole::Dispatch));

        let mut r = doc(DocRole::Receipt);
        r.unit_tin = Some(tin("27UNITHO01"));
        r.counterparty_tin = Some(tin("27UNITHO01"));
        r.counterpart_reference = Some(dispatch_id);
        assert!(validate_links(&store, &r).is_ok());
    }

    #[test]
    fn receipt_claimed_by_both_roles_is_ambiguous() {
        let store = MemoryDocumentStore::new();
        let dispatch_id = stored(&store, doc(DocRole::Dispatch));
        let bill_id = stored(&store, doc(DocRole::SalesBill));

        let mut r = doc(DocRole::Receipt);
        r.counterpart_reference = Some(dispatch_id);
        r.intake_reference = Some(bill_id);
        assert_eq!(
            validate_links(&store, &r),
            Err(LinkageError::AmbiguousSource { doc: r.id })
        );
    }

    #[test]
    fn wrong_scope_link_rejected() {
        let store = MemoryDocumentStore::new();
        let bill_id = stored(&store, doc(DocRole::SalesBill));

        // A receipt in same scope must pair with a dispatch, not hang off
        // a sales bill via the intake slot.
        let mut r = doc(DocRole::Receipt);
        r.unit_tin = Some(tin("27UNITHO01"));
        r.counterparty_tin = Some(tin("27UNITHO01"));
        r.intake_reference = Some(bill_id);
        assert!(matches!(
            validate_links(&store, &r),
            Err(LinkageError::WrongScope { .. })
        ));
    }

    #[test]
    fn wrong_role_target_rejected() {
        let store = MemoryDocumentStore::new();
        let other_receipt = stored(&store, doc(DocRole::Receipt));

        let mut r = doc(DocRole::Receipt);
        r.unit_tin = Some(tin("27UNITHO01"));
        r.counterparty_tin = Some(tin("27UNITHO01"));
        r.counterpart_reference = Some(other_receipt);
        assert!(matches!(
            validate_links(&store, &r),
            Err(LinkageError::WrongRole { .. })
        ));
    }

    #[test]
    fn dangling_target_rejected() {
        let store = MemoryDocumentStore::new();
        let mut r = doc(DocRole::Receipt);
        r.counterpart_reference = Some(DocId::new());
        assert!(matches!(
            validate_links(&store, &r),
            Err(LinkageError::TargetNotFound { .. })
        ));
    }
}
