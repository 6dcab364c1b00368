#![deny(missing_docs)]

//! # ibt-ledger — Branch-Accounting Ledger Engine
//!
//! The ledger side of the transfer stack: rewrites a same-jurisdiction
//! goods movement's generic stock postings into the four-leg branch
//! pattern ([`rewrite`]), coordinates idempotent lock-guarded
//! recomputation after upstream corrections ([`repost`] on top of
//! [`lock`]), exposes the extension points the host engine calls
//! ([`hooks`]), and answers support questions read-only ([`debug`]).
//!
//! ## Fail-Closed Posture
//!
//! Generic postings are always valid. Every path in this crate either
//! produces a complete, balanced replacement set or leaves the generic
//! rows standing — nothing is ever half-applied.

pub mod debug;
pub mod entry;
pub mod hooks;
pub mod lock;
pub mod repost;
pub mod rewrite;
pub mod settings;

pub use debug::{debug_scope, BillingAmountSource, LineAmountProbe, ScopeDiagnostic};
pub use entry::{is_balanced, LedgerLine, VoucherKey};
pub use hooks::{BranchAccountingProcessor, LedgerPipeline, LedgerPostProcessor, RepostHook};
pub use lock::{
    Acquire, LockHandle, LockStore, MarkerStore, MemoryLockStore, MemoryMarkerStore,
};
pub use repost::{
    force_rewrite_ledger, GenericLedger, GenericLedgerError, LedgerStore, MemoryLedgerStore,
    MemoryTrackingStore, PaymentLedgerRow, RepostCoordinator, RepostOutcome,
    RepostTrackingRecord, SkipCause, Strategy, TrackingStatus, TrackingStore,
};
pub use rewrite::{rewrite_postings, RewriteOutcome, SkipReason};
pub use settings::{AccountMap, BranchAccountingSettings, SettingsError};
