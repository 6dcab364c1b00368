//! # Repost Coordination
//!
//! Recomputes a voucher's ledger rows after an upstream valuation or
//! ledger correction, under a per-voucher TTL lock and a per-trigger
//! processed marker so the same correction is never applied twice.
//!
//! ## State Machine
//!
//! Per `(trigger, voucher)`:
//!
//! ```text
//! UNPROCESSED ─acquire──▶ LOCKED ─▶ { APPLIED | SKIPPED | FAILED }
//! ```
//!
//! A concurrent second attempt observes the lock and reports
//! [`RepostOutcome::Skipped`] — contention is not an error. A completed
//! correction leaves a marker; re-triggering with the same trigger ID
//! skips. A failed force rebuild restores the pre-existing rows
//! (savepoint semantics) and records the error on the tracking record
//! for the next trigger to retry.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use ibt_core::{AccountId, PartyId};
use ibt_doc::{DocumentStore, TransferDocument};
use ibt_transfer::{resolve_scope, JurisdictionScope};

use crate::entry::{LedgerLine, VoucherKey};
use crate::lock::{Acquire, LockStore, MarkerStore};
use crate::rewrite::{rewrite_postings, RewriteOutcome};
use crate::settings::BranchAccountingSettings;

// ---------------------------------------------------------------------------
// Tracking records
// ---------------------------------------------------------------------------

/// Lifecycle of a tracking record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingStatus {
    /// Created, not yet picked up.
    Pending,
    /// A holder is rewriting under the lock.
    InProgress,
    /// The last correction completed.
    Completed,
    /// The last correction failed (or its holder vanished); retryable.
    Failed,
}

/// One row per voucher in the repost tracking table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepostTrackingRecord {
    /// The guarded voucher.
    pub voucher: VoucherKey,
    /// Current status.
    pub status: TrackingStatus,
    /// When the active lock lapses, while `InProgress`.
    pub lock_expires_at: Option<DateTime<Utc>>,
    /// The last failure, while `Failed`.
    pub last_error: Option<String>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

/// Storage for tracking records.
pub trait TrackingStore {
    /// Fetch the record for a voucher.
    fn get(&self, voucher: &VoucherKey) -> Option<RepostTrackingRecord>;
    /// Insert or replace a record.
    fn put(&self, record: RepostTrackingRecord);
    /// Snapshot every record.
    fn all(&self) -> Vec<RepostTrackingRecord>;
}

/// In-memory tracking store.
#[derive(Debug, Default)]
pub struct MemoryTrackingStore {
    records: Mutex<HashMap<VoucherKey, RepostTrackingRecord>>,
}

impl MemoryTrackingStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl TrackingStore for MemoryTrackingStore {
    fn get(&self, voucher: &VoucherKey) -> Option<RepostTrackingRecord> {
        self.records.lock().get(voucher).cloned()
    }

    fn put(&self, record: RepostTrackingRecord) {
        self.records.lock().insert(record.voucher, record);
    }

    fn all(&self) -> Vec<RepostTrackingRecord> {
        self.records.lock().values().cloned().collect()
    }
}

// ---------------------------------------------------------------------------
// Ledger storage and the host collaborator
// ---------------------------------------------------------------------------

/// One payment-ledger row, deleted and regenerated alongside the general
/// ledger on a force rebuild.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentLedgerRow {
    /// The owning voucher.
    pub voucher: VoucherKey,
    /// The receivable/payable account.
    pub account: AccountId,
    /// The party owing or owed.
    pub party: Option<PartyId>,
    /// Signed outstanding amount.
    pub amount: Decimal,
}

/// Storage for ledger and payment-ledger rows, keyed by voucher.
pub trait LedgerStore {
    /// The general-ledger rows of a voucher.
    fn rows_for(&self, voucher: &VoucherKey) -> Vec<LedgerLine>;
    /// Replace the general-ledger rows of a voucher.
    fn replace_rows(&self, voucher: &VoucherKey, rows: Vec<LedgerLine>);
    /// The payment-ledger rows of a voucher.
    fn payment_rows_for(&self, voucher: &VoucherKey) -> Vec<PaymentLedgerRow>;
    /// Replace the payment-ledger rows of a voucher.
    fn replace_payment_rows(&self, voucher: &VoucherKey, rows: Vec<PaymentLedgerRow>);
}

/// In-memory ledger store.
#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    rows: Mutex<HashMap<VoucherKey, Vec<LedgerLine>>>,
    payment_rows: Mutex<HashMap<VoucherKey, Vec<PaymentLedgerRow>>>,
}

impl MemoryLedgerStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStore for MemoryLedgerStore {
    fn rows_for(&self, voucher: &VoucherKey) -> Vec<LedgerLine> {
        self.rows.lock().get(voucher).cloned().unwrap_or_default()
    }

    fn replace_rows(&self, voucher: &VoucherKey, rows: Vec<LedgerLine>) {
        self.rows.lock().insert(*voucher, rows);
    }

    fn payment_rows_for(&self, voucher: &VoucherKey) -> Vec<PaymentLedgerRow> {
        self.payment_rows
            .lock()
            .get(voucher)
            .cloned()
            .unwrap_or_default()
    }

    fn replace_payment_rows(&self, voucher: &VoucherKey, rows: Vec<PaymentLedgerRow>) {
        self.payment_rows.lock().insert(*voucher, rows);
    }
}

/// The host's generic ledger machinery failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("generic ledger error: {0}")]
pub struct GenericLedgerError(pub String);

/// The host's generic ledger/valuation machinery, as seen by the
/// coordinator.
pub trait GenericLedger {
    /// Re-run the host's own ledger repost for a voucher
    /// (non-destructive strategy).
    fn repost_voucher(&self, voucher: &VoucherKey) -> Result<(), GenericLedgerError>;

    /// Produce the generic stock postings a voucher would receive today
    /// (input to the force-rebuild rewrite).
    fn generic_postings(&self, doc: &TransferDocument)
        -> Result<Vec<LedgerLine>, GenericLedgerError>;
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Why a run was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipCause {
    /// Another holder owns the voucher lock.
    LockHeld,
    /// This trigger was already applied to this voucher.
    AlreadyApplied,
}

/// Result of one coordinator run for one voucher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepostOutcome {
    /// The correction ran; row counts before and after, for audit.
    Applied {
        /// General-ledger rows before.
        rows_before: usize,
        /// General-ledger rows after.
        rows_after: usize,
    },
    /// Nothing ran, by design.
    Skipped(SkipCause),
    /// The correction failed and was rolled back.
    Failed {
        /// The recorded failure.
        error: String,
    },
}

/// Correction strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Delegate to the host's own repost; record row counts.
    NonDestructive,
    /// Delete the voucher's ledger and payment-ledger rows and
    /// regenerate them through the rewrite, rolling back on any error.
    ForceRebuild,
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

/// Default voucher lock TTL.
pub const DEFAULT_LOCK_TTL_MINUTES: i64 = 10;
/// Default processed-marker TTL.
pub const DEFAULT_MARKER_TTL_HOURS: i64 = 24;

/// Lock-guarded, idempotent repost coordination.
pub struct RepostCoordinator<'a, L, M, T, S>
where
    L: LockStore,
    M: MarkerStore,
    T: TrackingStore,
    S: LedgerStore,
{
    locks: &'a L,
    markers: &'a M,
    tracking: &'a T,
    ledger: &'a S,
    lock_ttl: Duration,
    marker_ttl: Duration,
}

impl<'a, L, M, T, S> RepostCoordinator<'a, L, M, T, S>
where
    L: LockStore,
    M: MarkerStore,
    T: TrackingStore,
    S: LedgerStore,
{
    /// Build a coordinator with the default TTLs.
    pub fn new(locks: &'a L, markers: &'a M, tracking: &'a T, ledger: &'a S) -> Self {
        Self {
            locks,
            markers,
            tracking,
            ledger,
            lock_ttl: Duration::minutes(DEFAULT_LOCK_TTL_MINUTES),
            marker_ttl: Duration::hours(DEFAULT_MARKER_TTL_HOURS),
        }
    }

    /// Override the lock TTL.
    pub fn with_lock_ttl(mut self, ttl: Duration) -> Self {
        self.lock_ttl = ttl;
        self
    }

    /// Override the marker TTL.
    pub fn with_marker_ttl(mut self, ttl: Duration) -> Self {
        self.marker_ttl = ttl;
        self
    }

    /// Run one correction for one voucher under the lock/marker scheme.
    pub fn process_voucher(
        &self,
        trigger_id: &str,
        doc: &TransferDocument,
        host: &dyn GenericLedger,
        settings: &BranchAccountingSettings,
        strategy: Strategy,
    ) -> RepostOutcome {
        let voucher = VoucherKey::new(doc.role, doc.id);
        let marker_key = format!("{trigger_id}::{voucher}");

        if self.markers.is_marked(&marker_key) {
            tracing::debug!(%voucher, trigger = trigger_id, "correction already applied");
            return RepostOutcome::Skipped(SkipCause::AlreadyApplied);
        }

        let lock_key = format!("repost::{voucher}");
        let handle = match self.locks.acquire(&lock_key, self.lock_ttl) {
            Acquire::Acquired(handle) => handle,
            Acquire::AlreadyHeld => {
                tracing::debug!(%voucher, trigger = trigger_id, "voucher lock held; skipping");
                return RepostOutcome::Skipped(SkipCause::LockHeld);
            }
        };

        self.tracking.put(RepostTrackingRecord {
            voucher,
            status: TrackingStatus::InProgress,
            lock_expires_at: Some(handle.expires_at),
            last_error: None,
            updated_at: Utc::now(),
        });

        let result = match strategy {
            Strategy::NonDestructive => self.run_non_destructive(&voucher, host),
            Strategy::ForceRebuild => self.run_force_rebuild(&voucher, doc, host, settings),
        };

        let outcome = match result {
            Ok((rows_before, rows_after)) => {
                self.markers.mark(&marker_key, self.marker_ttl);
                self.tracking.put(RepostTrackingRecord {
                    voucher,
                    status: TrackingStatus::Completed,
                    lock_expires_at: None,
                    last_error: None,
                    updated_at: Utc::now(),
                });
                tracing::info!(
                    %voucher,
                    trigger = trigger_id,
                    rows_before,
                    rows_after,
                    "repost correction applied"
                );
                RepostOutcome::Applied {
                    rows_before,
                    rows_after,
                }
            }
            Err(err) => {
                self.tracking.put(RepostTrackingRecord {
                    voucher,
                    status: TrackingStatus::Failed,
                    lock_expires_at: None,
                    last_error: Some(err.0.clone()),
                    updated_at: Utc::now(),
                });
                tracing::warn!(
                    %voucher,
                    trigger = trigger_id,
                    error = %err,
                    "repost correction failed and was rolled back"
                );
                RepostOutcome::Failed { error: err.0 }
            }
        };

        self.locks.release(handle);
        outcome
    }

    /// Delegate to the host repost, recording row counts.
    fn run_non_destructive(
        &self,
        voucher: &VoucherKey,
        host: &dyn GenericLedger,
    ) -> Result<(usize, usize), GenericLedgerError> {
        let rows_before = self.ledger.rows_for(voucher).len();
        host.repost_voucher(voucher)?;
        let rows_after = self.ledger.rows_for(voucher).len();
        Ok((rows_before, rows_after))
    }

    /// Delete and regenerate under savepoint semantics: any failure
    /// restores the snapshot, never leaving the voucher half-deleted.
    fn run_force_rebuild(
        &self,
        voucher: &VoucherKey,
        doc: &TransferDocument,
        host: &dyn GenericLedger,
        settings: &BranchAccountingSettings,
    ) -> Result<(usize, usize), GenericLedgerError> {
        let snapshot_rows = self.ledger.rows_for(voucher);
        let snapshot_payment = self.ledger.payment_rows_for(voucher);
        let rows_before = snapshot_rows.len();

        self.ledger.replace_rows(voucher, Vec::new());
        self.ledger.replace_payment_rows(voucher, Vec::new());

        let rebuilt = host.generic_postings(doc).map(|generic| {
            match rewrite_postings(doc, &generic, settings) {
                RewriteOutcome::Rewritten(rows) => rows,
                RewriteOutcome::Unchanged(_) => generic,
            }
        });

        match rebuilt {
            Ok(rows) => {
                let rows_after = rows.len();
                self.ledger.replace_rows(voucher, rows);
                Ok((rows_before, rows_after))
            }
            Err(err) => {
                self.ledger.replace_rows(voucher, snapshot_rows);
                self.ledger.replace_payment_rows(voucher, snapshot_payment);
                Err(err)
            }
        }
    }

    /// Housekeeping: reclassify `InProgress` records whose lock has
    /// lapsed to `Failed`, so the next trigger retries them. Returns the
    /// reclaimed voucher keys.
    pub fn reclaim_stale(&self) -> Vec<VoucherKey> {
        let now = Utc::now();
        let mut reclaimed = Vec::new();

        for record in self.tracking.all() {
            let expired = record.status == TrackingStatus::InProgress
                && record
                    .lock_expires_at
                    .map(|at| at <= now)
                    .unwrap_or(true);
            if expired {
                self.tracking.put(RepostTrackingRecord {
                    status: TrackingStatus::Failed,
                    lock_expires_at: None,
                    last_error: Some("lock expired; reclaimed by housekeeping".to_string()),
                    updated_at: now,
                    ..record
                });
                tracing::warn!(voucher = %record.voucher, "stale repost lock reclaimed");
                reclaimed.push(record.voucher);
            }
        }
        reclaimed
    }
}

// ---------------------------------------------------------------------------
// Manual escalation
// ---------------------------------------------------------------------------

/// Run the force-rebuild path for every in-scope voucher: submitted
/// same-jurisdiction goods movements marked as internal transfers, on or
/// after the settings cutoff. The manual operator escalation.
pub fn force_rewrite_ledger<D, L, M, T, S>(
    coordinator: &RepostCoordinator<'_, L, M, T, S>,
    documents: &D,
    trigger_id: &str,
    host: &dyn GenericLedger,
    settings: &BranchAccountingSettings,
) -> Vec<(VoucherKey, RepostOutcome)>
where
    D: DocumentStore,
    L: LockStore,
    M: MarkerStore,
    T: TrackingStore,
    S: LedgerStore,
{
    let mut processed = Vec::new();
    for doc in documents.all() {
        let in_scope = doc.is_submitted()
            && doc.internal_transfer
            && doc.role.moves_stock()
            && resolve_scope(&doc).scope == JurisdictionScope::Same
            && settings.applies_on(doc.posting_date);
        if !in_scope {
            continue;
        }
        let voucher = VoucherKey::new(doc.role, doc.id);
        let outcome =
            coordinator.process_voucher(trigger_id, &doc, host, settings, Strategy::ForceRebuild);
        processed.push((voucher, outcome));
    }
    processed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::{MemoryLockStore, MemoryMarkerStore};
    use chrono::NaiveDate;
    use ibt_core::{AccountId, ItemCode, Tin};
    use ibt_doc::{DocRole, TransferLine};
    use rust_decimal_macros::dec;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 4, 10).unwrap()
    }

    fn account(name: &str) -> AccountId {
        AccountId::new(name).unwrap()
    }

    fn settings() -> BranchAccountingSettings {
        BranchAccountingSettings {
            enabled: true,
            transit_account: Some(account("Stock In Transit - L")),
            transfer_account: Some(account("Branch Transfers - L")),
            debtor_account: Some(account("Inter Branch Debtors - L")),
            creditor_account: Some(account("Inter Branch Creditors - L")),
            force_rewrite: false,
            cutoff_date: None,
        }
    }

    fn goods_doc() -> TransferDocument {
        let mut doc = TransferDocument::new(DocRole::Dispatch, date());
        doc.unit_tin = Some(Tin::new("27UNITHO01").unwrap());
        doc.counterparty_tin = Some(Tin::new("27UNITHO01").unwrap());
        doc.internal_transfer = true;
        doc.lines.push(TransferLine::new(
            ItemCode::new("X").unwrap(),
            dec!(10),
            dec!(100),
        ));
        doc.rederive_totals();
        doc.submit().unwrap();
        doc
    }

    /// Host that produces a fixed generic posting set, or fails.
    struct FakeHost {
        fail: bool,
    }

    impl GenericLedger for FakeHost {
        fn repost_voucher(&self, _voucher: &VoucherKey) -> Result<(), GenericLedgerError> {
            if self.fail {
                return Err(GenericLedgerError("host repost exploded".into()));
            }
            Ok(())
        }

        fn generic_postings(
            &self,
            doc: &TransferDocument,
        ) -> Result<Vec<LedgerLine>, GenericLedgerError> {
            if self.fail {
                return Err(GenericLedgerError("valuation unavailable".into()));
            }
            let voucher = VoucherKey::new(doc.role, doc.id);
            Ok(vec![
                LedgerLine::credit(
                    account("Stores - L"),
                    dec!(800),
                    None,
                    voucher,
                    doc.posting_date,
                )
                .as_stock(),
                LedgerLine::debit(
                    account("Goods Clearing - L"),
                    dec!(800),
                    None,
                    voucher,
                    doc.posting_date,
                ),
            ])
        }
    }

    struct Fixture {
        locks: MemoryLockStore,
        markers: MemoryMarkerStore,
        tracking: MemoryTrackingStore,
        ledger: MemoryLedgerStore,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                locks: MemoryLockStore::new(),
                markers: MemoryMarkerStore::new(),
                tracking: MemoryTrackingStore::new(),
                ledger: MemoryLedgerStore::new(),
            }
        }

        fn coordinator(&self) -> RepostCoordinator<'_, MemoryLockStore, MemoryMarkerStore, MemoryTrackingStore, MemoryLedgerStore> {
            RepostCoordinator::new(&self.locks, &self.markers, &self.tracking, &self.ledger)
        }
    }

    #[test]
    fn force_rebuild_applies_rewrite() {
        let fx = Fixture::new();
        let doc = goods_doc();
        let voucher = VoucherKey::new(doc.role, doc.id);
        let host = FakeHost { fail: false };

        let outcome = fx.coordinator().process_voucher(
            "trigger-1",
            &doc,
            &host,
            &settings(),
            Strategy::ForceRebuild,
        );
        assert_eq!(
            outcome,
            RepostOutcome::Applied {
                rows_before: 0,
                rows_after: 4
            }
        );
        let rows = fx.ledger.rows_for(&voucher);
        assert_eq!(rows.len(), 4);
        assert!(crate::entry::is_balanced(&rows));
        assert_eq!(
            fx.tracking.get(&voucher).unwrap().status,
            TrackingStatus::Completed
        );
    }

    #[test]
    fn second_trigger_with_same_id_skips() {
        let fx = Fixture::new();
        let doc = goods_doc();
        let host = FakeHost { fail: false };
        let coordinator = fx.coordinator();

        coordinator.process_voucher("trigger-1", &doc, &host, &settings(), Strategy::ForceRebuild);
        let second = coordinator.process_voucher(
            "trigger-1",
            &doc,
            &host,
            &settings(),
            Strategy::ForceRebuild,
        );
        assert_eq!(second, RepostOutcome::Skipped(SkipCause::AlreadyApplied));
    }

    #[test]
    fn held_lock_observed_not_errored() {
        let fx = Fixture::new();
        let doc = goods_doc();
        let voucher = VoucherKey::new(doc.role, doc.id);
        let host = FakeHost { fail: false };

        // Another worker holds the voucher lock.
        let _held = fx
            .locks
            .acquire(&format!("repost::{voucher}"), Duration::minutes(10));

        let outcome = fx.coordinator().process_voucher(
            "trigger-1",
            &doc,
            &host,
            &settings(),
            Strategy::ForceRebuild,
        );
        assert_eq!(outcome, RepostOutcome::Skipped(SkipCause::LockHeld));
        // No rows were touched.
        assert!(fx.ledger.rows_for(&voucher).is_empty());
    }

    #[test]
    fn force_rebuild_is_idempotent_across_triggers() {
        let fx = Fixture::new();
        let doc = goods_doc();
        let voucher = VoucherKey::new(doc.role, doc.id);
        let host = FakeHost { fail: false };
        let coordinator = fx.coordinator();

        coordinator.process_voucher("trigger-1", &doc, &host, &settings(), Strategy::ForceRebuild);
        let first_rows = fx.ledger.rows_for(&voucher);

        let outcome = coordinator.process_voucher(
            "trigger-2",
            &doc,
            &host,
            &settings(),
            Strategy::ForceRebuild,
        );
        assert_eq!(
            outcome,
            RepostOutcome::Applied {
                rows_before: 4,
                rows_after: 4
            }
        );
        assert_eq!(fx.ledger.rows_for(&voucher), first_rows);
    }

    #[test]
    fn failed_rebuild_rolls_back_and_records_error() {
        let fx = Fixture::new();
        let doc = goods_doc();
        let voucher = VoucherKey::new(doc.role, doc.id);

        // Seed pre-existing rows and payment rows.
        let seeded = vec![LedgerLine::debit(
            account("Seeded - L"),
            dec!(1),
            None,
            voucher,
            date(),
        )];
        fx.ledger.replace_rows(&voucher, seeded.clone());
        fx.ledger.replace_payment_rows(
            &voucher,
            vec![PaymentLedgerRow {
                voucher,
                account: account("Inter Branch Debtors - L"),
                party: None,
                amount: dec!(1000),
            }],
        );

        let host = FakeHost { fail: true };
        let outcome = fx.coordinator().process_voucher(
            "trigger-1",
            &doc,
            &host,
            &settings(),
            Strategy::ForceRebuild,
        );
        assert!(matches!(outcome, RepostOutcome::Failed { .. }));

        // Savepoint rollback: everything restored.
        assert_eq!(fx.ledger.rows_for(&voucher), seeded);
        assert_eq!(fx.ledger.payment_rows_for(&voucher).len(), 1);

        let record = fx.tracking.get(&voucher).unwrap();
        assert_eq!(record.status, TrackingStatus::Failed);
        assert_eq!(record.last_error.as_deref(), Some("valuation unavailable"));

        // A later trigger may retry: the lock was released.
        let retry_host = FakeHost { fail: false };
        let retry = fx.coordinator().process_voucher(
            "trigger-2",
            &doc,
            &retry_host,
            &settings(),
            Strategy::ForceRebuild,
        );
        assert!(matches!(retry, RepostOutcome::Applied { .. }));
    }

    #[test]
    fn non_destructive_records_counts() {
        let fx = Fixture::new();
        let doc = goods_doc();
        let voucher = VoucherKey::new(doc.role, doc.id);
        fx.ledger.replace_rows(
            &voucher,
            vec![LedgerLine::debit(account("A"), dec!(1), None, voucher, date())],
        );

        let host = FakeHost { fail: false };
        let outcome = fx.coordinator().process_voucher(
            "trigger-1",
            &doc,
            &host,
            &settings(),
            Strategy::NonDestructive,
        );
        assert_eq!(
            outcome,
            RepostOutcome::Applied {
                rows_before: 1,
                rows_after: 1
            }
        );
    }

    #[test]
    fn reclaim_flags_expired_in_progress_records() {
        let fx = Fixture::new();
        let doc = goods_doc();
        let voucher = VoucherKey::new(doc.role, doc.id);

        fx.tracking.put(RepostTrackingRecord {
            voucher,
            status: TrackingStatus::InProgress,
            lock_expires_at: Some(Utc::now() - Duration::minutes(1)),
            last_error: None,
            updated_at: Utc::now() - Duration::minutes(20),
        });

        let reclaimed = fx.coordinator().reclaim_stale();
        assert_eq!(reclaimed, vec![voucher]);
        let record = fx.tracking.get(&voucher).unwrap();
        assert_eq!(record.status, TrackingStatus::Failed);
        assert!(record.last_error.as_deref().unwrap().contains("reclaimed"));
    }

    #[test]
    fn reclaim_leaves_live_locks_alone() {
        let fx = Fixture::new();
        let doc = goods_doc();
        let voucher = VoucherKey::new(doc.role, doc.id);

        fx.tracking.put(RepostTrackingRecord {
            voucher,
            status: TrackingStatus::InProgress,
            lock_expires_at: Some(Utc::now() + Duration::minutes(5)),
            last_error: None,
            updated_at: Utc::now(),
        });

        assert!(fx.coordinator().reclaim_stale().is_empty());
    }

    #[test]
    fn manual_escalation_covers_in_scope_vouchers_only() {
        use ibt_doc::MemoryDocumentStore;

        let fx = Fixture::new();
        let docs = MemoryDocumentStore::new();
        let host = FakeHost { fail: false };

        let in_scope = goods_doc();
        let in_scope_id = in_scope.id;
        docs.insert(in_scope).unwrap();

        let mut outsider = goods_doc();
        outsider.counterparty_tin = Some(Tin::new("29UNITBLR1").unwrap());
        docs.insert(outsider).unwrap();

        let mut unconverted = goods_doc();
        unconverted.internal_transfer = false;
        docs.insert(unconverted).unwrap();

        let coordinator = fx.coordinator();
        let processed =
            force_rewrite_ledger(&coordinator, &docs, "manual-1", &host, &settings());
        assert_eq!(processed.len(), 1);
        assert_eq!(processed[0].0.doc, in_scope_id);
        assert!(matches!(processed[0].1, RepostOutcome::Applied { .. }));
    }
}
