#![deny(missing_docs)]

//! # ibt-transfer — Transfer Pairing Engine
//!
//! Decides which document pairs must be linked and in which direction
//! ([`scope`]), proves line-for-line parity between a source and its
//! counterpart ([`parity`]), builds counterpart documents ([`generate`]),
//! enforces the downstream-only cancellation policy ([`cancel`]), and
//! exposes the operator conversion flows ([`ops`]).
//!
//! ## Control Flow
//!
//! Within one document's lifecycle the components run strictly in order:
//! scope resolution → parity validation → generation (with the atomic
//! bidirectional reference write). Cancellation and the conversion flows
//! are entered from host lifecycle events.

pub mod cancel;
pub mod generate;
pub mod ops;
pub mod parity;
pub mod scope;

pub use cancel::{cancel_document, CancelError, CancellationOutcome};
pub use generate::{
    expected_counterpart, generate_counterpart, FlatRateTaxEngine, GenerateError,
    GenerationContext, NullTaxEngine, TaxEngine, TaxEngineError,
};
pub use ops::{
    bulk_convert, bulk_preview, convert_to_internal, notify_submission, validate_items_match,
    validate_submission, ComplianceNotifier, ConversionCounts, ConvertOutcome, NotifyError,
    OpsError, SubmitError,
};
pub use parity::{diff_documents, validate_parity, HeaderDiff, LineDiff, MatchReport, ParityError};
pub use scope::{
    is_legal_pair, legal_patterns, resolve_scope, validate_links, JurisdictionScope, LinkPattern,
    LinkageError, ResolvedScope, ScopeResolution,
};
