//! # Mismatch Reports
//!
//! Scanner output types. Reports are ephemeral — recomputed on every
//! scan, never persisted — and always carry both sides' values so a
//! reviewer can act without re-querying.

use serde::Serialize;

use ibt_core::{DocId, ItemCode};
use ibt_doc::DocRole;
use ibt_transfer::LinkageError;

/// One discrepancy found by the scanner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Finding {
    /// The expected counterpart does not exist at all.
    MissingDocument {
        /// The role the chain is missing.
        expected: DocRole,
    },

    /// An aggregated line value differs between the two sides.
    LineMismatch {
        /// The item the discrepancy is on.
        item: ItemCode,
        /// Which field differs.
        field: &'static str,
        /// Value on the source side.
        source_value: String,
        /// Value on the counterpart side.
        counterpart_value: String,
    },

    /// A header total differs between the two sides.
    HeaderMismatch {
        /// Which header field differs.
        field: &'static str,
        /// Value on the source side.
        source_value: String,
        /// Value on the counterpart side.
        counterpart_value: String,
    },

    /// A generated document's links are missing, duplicated, or point at
    /// the wrong role.
    InvalidLinkage {
        /// The violation, as the submit-time validator would state it.
        reason: String,
    },
}

/// One scanner record: a document pair (or lone document) and what is
/// wrong with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MismatchRecord {
    /// The source-side document (or the offending document itself for
    /// linkage findings).
    pub source: DocId,
    /// Its role.
    pub source_role: DocRole,
    /// The counterpart, when one exists.
    pub counterpart: Option<DocId>,
    /// What was found.
    pub finding: Finding,
}

impl MismatchRecord {
    /// A missing-counterpart record.
    pub fn missing(source: DocId, source_role: DocRole, expected: DocRole) -> Self {
        Self {
            source,
            source_role,
            counterpart: None,
            finding: Finding::MissingDocument { expected },
        }
    }

    /// An invalid-linkage record from a submit-time linkage violation.
    pub fn invalid_linkage(doc: DocId, role: DocRole, error: &LinkageError) -> Self {
        Self {
            source: doc,
            source_role: role,
            counterpart: None,
            finding: Finding::InvalidLinkage {
                reason: error.to_string(),
            },
        }
    }
}
