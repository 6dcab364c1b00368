//! The branch-accounting posting pattern end to end: mirrored four-leg
//! sets for both sides of a transfer, lock contention on concurrent
//! reposts, and force-rebuild idempotence.

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use ibt_core::{AccountId, ItemCode, Tin};
use ibt_doc::{DocRole, TransferDocument, TransferLine};
use ibt_ledger::{
    is_balanced, BranchAccountingSettings, GenericLedger, GenericLedgerError, LedgerLine,
    LedgerStore, LockStore, MemoryLedgerStore, MemoryLockStore, MemoryMarkerStore,
    MemoryTrackingStore, RepostCoordinator, RepostOutcome, RewriteOutcome, SkipCause, Strategy,
    VoucherKey,
};

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

/// A submitted same-scope goods document: one line, 10 × 100.
fn goods(role: DocRole) -> TransferDocument {
    let mut doc = TransferDocument::new(role, date());
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

/// Host producing generic stock postings valued at 800.
struct Host;

impl GenericLedger for Host {
    fn repost_voucher(&self, _voucher: &VoucherKey) -> Result<(), GenericLedgerError> {
        Ok(())
    }

    fn generic_postings(
        &self,
        doc: &TransferDocument,
    ) -> Result<Vec<LedgerLine>, GenericLedgerError> {
        let voucher = VoucherKey::new(doc.role, doc.id);
        let stock = account("Stores - L");
        let clearing = account("Goods Clearing - L");
        Ok(match doc.role {
            DocRole::Dispatch => vec![
                LedgerLine::credit(stock, dec!(800), None, voucher, doc.posting_date).as_stock(),
                LedgerLine::debit(clearing, dec!(800), None, voucher, doc.posting_date),
            ],
            _ => vec![
                LedgerLine::debit(stock, dec!(800), None, voucher, doc.posting_date).as_stock(),
                LedgerLine::credit(clearing, dec!(800), None, voucher, doc.posting_date),
            ],
        })
    }
}

#[test]
fn both_sides_emit_mirrored_balanced_sets() {
    let host = Host;
    let dispatch = goods(DocRole::Dispatch);
    let receipt = goods(DocRole::Receipt);

    let dispatch_rows = match ibt_ledger::rewrite_postings(
        &dispatch,
        &host.generic_postings(&dispatch).unwrap(),
        &settings(),
    ) {
        RewriteOutcome::Rewritten(rows) => rows,
        other => panic!("dispatch not rewritten: {other:?}"),
    };
    let receipt_rows = match ibt_ledger::rewrite_postings(
        &receipt,
        &host.generic_postings(&receipt).unwrap(),
        &settings(),
    ) {
        RewriteOutcome::Rewritten(rows) => rows,
        other => panic!("receipt not rewritten: {other:?}"),
    };

    for rows in [&dispatch_rows, &receipt_rows] {
        assert_eq!(rows.len(), 4);
        assert!(is_balanced(rows));
        let debit: Decimal = rows.iter().map(|l| l.debit).sum();
        assert_eq!(debit, dec!(1800));
    }

    // Mirror: what the dispatch debits to the debtor, the receipt
    // credits to the creditor, and the transit/stock legs flip sides.
    assert_eq!(dispatch_rows[0].account, account("Inter Branch Debtors - L"));
    assert_eq!(dispatch_rows[0].debit, dec!(1000));
    assert_eq!(receipt_rows[0].account, account("Inter Branch Creditors - L"));
    assert_eq!(receipt_rows[0].credit, dec!(1000));
    assert_eq!(dispatch_rows[2].debit, dec!(800));
    assert_eq!(receipt_rows[2].credit, dec!(800));
}

#[test]
fn concurrent_repost_skips_on_held_lock() {
    let locks = MemoryLockStore::new();
    let markers = MemoryMarkerStore::new();
    let tracking = MemoryTrackingStore::new();
    let ledger = MemoryLedgerStore::new();
    let coordinator = RepostCoordinator::new(&locks, &markers, &tracking, &ledger)
        .with_lock_ttl(Duration::minutes(10));

    let receipt = goods(DocRole::Receipt);
    let voucher = VoucherKey::new(receipt.role, receipt.id);

    // A concurrent worker already holds the voucher lock.
    let held = locks
        .acquire(&format!("repost::{voucher}"), Duration::minutes(10))
        .handle()
        .unwrap();

    let outcome = coordinator.process_voucher(
        "valuation-fix-1",
        &receipt,
        &Host,
        &settings(),
        Strategy::ForceRebuild,
    );
    assert_eq!(outcome, RepostOutcome::Skipped(SkipCause::LockHeld));
    assert!(ledger.rows_for(&voucher).is_empty());

    // Once the holder finishes, the same trigger applies cleanly — and
    // exactly once.
    locks.release(held);
    let applied = coordinator.process_voucher(
        "valuation-fix-1",
        &receipt,
        &Host,
        &settings(),
        Strategy::ForceRebuild,
    );
    assert!(matches!(applied, RepostOutcome::Applied { .. }));
    assert_eq!(ledger.rows_for(&voucher).len(), 4);

    let replay = coordinator.process_voucher(
        "valuation-fix-1",
        &receipt,
        &Host,
        &settings(),
        Strategy::ForceRebuild,
    );
    assert_eq!(replay, RepostOutcome::Skipped(SkipCause::AlreadyApplied));
    assert_eq!(ledger.rows_for(&voucher).len(), 4);
}

#[test]
fn force_rebuild_twice_yields_identical_rows() {
    let locks = MemoryLockStore::new();
    let markers = MemoryMarkerStore::new();
    let tracking = MemoryTrackingStore::new();
    let ledger = MemoryLedgerStore::new();
    let coordinator = RepostCoordinator::new(&locks, &markers, &tracking, &ledger);

    let dispatch = goods(DocRole::Dispatch);
    let voucher = VoucherKey::new(dispatch.role, dispatch.id);

    coordinator.process_voucher(
        "trigger-a",
        &dispatch,
        &Host,
        &settings(),
        Strategy::ForceRebuild,
    );
    let first = ledger.rows_for(&voucher);

    let outcome = coordinator.process_voucher(
        "trigger-b",
        &dispatch,
        &Host,
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
    assert_eq!(ledger.rows_for(&voucher), first);
}
