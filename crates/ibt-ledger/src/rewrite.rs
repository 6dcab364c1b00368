//! # Branch-Accounting Ledger Rewrite
//!
//! Replaces the generic stock-movement postings of a same-jurisdiction
//! dispatch or receipt with the four-leg branch pattern: the goods value
//! moves through a transit account, and the billing value moves through
//! an inter-branch debtor/creditor against the transfer clearing
//! account.
//!
//! ## Fail-Closed
//!
//! The rewrite is a pure function of (document, generic rows, settings).
//! Any condition that prevents a clean, balanced four-leg set — a line
//! whose billing amount cannot be derived, zero or multiple stock
//! accounts, an imbalance — aborts the rewrite and leaves the generic
//! rows standing. Generic postings are always valid; a partially
//! rewritten set never is.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use ibt_core::{money_eq, round_money, AccountId, LineId};
use ibt_doc::{DocRole, TransferDocument};
use ibt_transfer::{resolve_scope, JurisdictionScope};

use crate::entry::{is_balanced, LedgerLine, VoucherKey};
use crate::settings::{AccountMap, BranchAccountingSettings};

/// Why a rewrite did not happen. Generic postings stand in every case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The feature is disabled in settings.
    Disabled,
    /// The document posts before the configured cutoff.
    BeforeCutoff,
    /// The voucher is not a submitted same-jurisdiction goods movement.
    OutOfScope,
    /// An account in the branch mapping is not configured.
    AccountsNotConfigured,
    /// A line's billing amount could not be derived and the force
    /// override is off.
    UnderivableBillingAmount {
        /// The offending line.
        line: LineId,
    },
    /// The billing value across the document is zero.
    ZeroTransferAmount,
    /// No stock account appears on the expected side of the generic
    /// rows.
    NoStockAccount,
    /// More than one distinct stock account appears; the pattern needs
    /// exactly one.
    MultipleStockAccounts {
        /// How many distinct stock accounts were found.
        count: usize,
    },
    /// The rewritten set did not balance.
    Imbalanced {
        /// Total debit of the attempted set.
        debit: String,
        /// Total credit of the attempted set.
        credit: String,
    },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disabled => f.write_str("branch accounting disabled"),
            Self::BeforeCutoff => f.write_str("posting date before cutoff"),
            Self::OutOfScope => f.write_str("not a submitted same-jurisdiction goods movement"),
            Self::AccountsNotConfigured => f.write_str("branch accounts not configured"),
            Self::UnderivableBillingAmount { line } => {
                write!(f, "billing amount underivable for line {line}")
            }
            Self::ZeroTransferAmount => f.write_str("transfer amount is zero"),
            Self::NoStockAccount => f.write_str("no stock account in generic postings"),
            Self::MultipleStockAccounts { count } => {
                write!(f, "{count} distinct stock accounts in generic postings")
            }
            Self::Imbalanced { debit, credit } => {
                write!(f, "rewritten set imbalanced: debit {debit}, credit {credit}")
            }
        }
    }
}

/// Result of a rewrite attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum RewriteOutcome {
    /// The four-leg set that replaces the generic rows.
    Rewritten(Vec<LedgerLine>),
    /// The generic rows stand, for this reason.
    Unchanged(SkipReason),
}

impl RewriteOutcome {
    /// The rewritten rows, if any.
    pub fn rows(&self) -> Option<&[LedgerLine]> {
        match self {
            Self::Rewritten(rows) => Some(rows),
            Self::Unchanged(_) => None,
        }
    }
}

/// Attempt the branch-accounting rewrite for a voucher.
///
/// Returns [`RewriteOutcome::Unchanged`] with the reason whenever the
/// rewrite does not apply or cannot be completed cleanly; abort reasons
/// are logged, precondition skips are not.
pub fn rewrite_postings(
    doc: &TransferDocument,
    generic: &[LedgerLine],
    settings: &BranchAccountingSettings,
) -> RewriteOutcome {
    if !settings.enabled {
        return RewriteOutcome::Unchanged(SkipReason::Disabled);
    }
    if !settings.applies_on(doc.posting_date) {
        return RewriteOutcome::Unchanged(SkipReason::BeforeCutoff);
    }
    if !doc.role.moves_stock()
        || !doc.is_submitted()
        || resolve_scope(doc).scope != JurisdictionScope::Same
    {
        return RewriteOutcome::Unchanged(SkipReason::OutOfScope);
    }
    let Some(accounts) = settings.accounts() else {
        return RewriteOutcome::Unchanged(SkipReason::AccountsNotConfigured);
    };

    let transfer_amount = match transfer_amount(doc, settings.force_rewrite) {
        Ok(amount) => amount,
        Err(reason) => return abort(doc, reason),
    };
    let (stock_account, valuation_amount) = match stock_leg(doc.role, generic) {
        Ok(found) => found,
        Err(reason) => return abort(doc, reason),
    };

    let voucher = VoucherKey::new(doc.role, doc.id);
    let rows = build_legs(
        doc,
        voucher,
        &accounts,
        stock_account,
        transfer_amount,
        valuation_amount,
    );

    if !is_balanced(&rows) {
        let debit: Decimal = rows.iter().map(|l| l.debit).sum();
        let credit: Decimal = rows.iter().map(|l| l.credit).sum();
        return abort(
            doc,
            SkipReason::Imbalanced {
                debit: debit.to_string(),
                credit: credit.to_string(),
            },
        );
    }

    RewriteOutcome::Rewritten(rows)
}

fn abort(doc: &TransferDocument, reason: SkipReason) -> RewriteOutcome {
    tracing::warn!(
        doc = %doc.id,
        role = %doc.role,
        reason = %reason,
        "branch-accounting rewrite aborted; generic postings stand"
    );
    RewriteOutcome::Unchanged(reason)
}

/// Sum the billing value across the document's lines.
///
/// With the force override, a line whose billing amount cannot be
/// derived contributes zero instead of aborting.
fn transfer_amount(doc: &TransferDocument, force: bool) -> Result<Decimal, SkipReason> {
    let mut total = Decimal::ZERO;
    for line in &doc.lines {
        match line.billing_amount() {
            Some(amount) => total += amount,
            None if force => {}
            None => {
                return Err(SkipReason::UnderivableBillingAmount { line: line.id });
            }
        }
    }
    let total = round_money(total);
    if total <= Decimal::ZERO {
        return Err(SkipReason::ZeroTransferAmount);
    }
    Ok(total)
}

/// Find the single stock account on the expected side of the generic
/// rows, and its summed amount. Goods leave the dispatching warehouse as
/// a credit; they arrive at the receiving warehouse as a debit.
fn stock_leg(role: DocRole, generic: &[LedgerLine]) -> Result<(AccountId, Decimal), SkipReason> {
    let mut accounts: Vec<AccountId> = Vec::new();
    let mut amount = Decimal::ZERO;

    for row in generic.iter().filter(|r| r.is_stock_account) {
        let side_amount = match role {
            DocRole::Dispatch => row.credit,
            _ => row.debit,
        };
        if side_amount.is_zero() {
            continue;
        }
        if !accounts.contains(&row.account) {
            accounts.push(row.account.clone());
        }
        amount += side_amount;
    }

    match accounts.len() {
        0 => Err(SkipReason::NoStockAccount),
        1 => Ok((accounts.remove(0), round_money(amount))),
        count => Err(SkipReason::MultipleStockAccounts { count }),
    }
}

/// Emit the four legs for one side of the transfer.
fn build_legs(
    doc: &TransferDocument,
    voucher: VoucherKey,
    accounts: &AccountMap,
    stock_account: AccountId,
    transfer_amount: Decimal,
    valuation_amount: Decimal,
) -> Vec<LedgerLine> {
    let date = doc.posting_date;
    match doc.role {
        DocRole::Dispatch => vec![
            LedgerLine::debit(
                accounts.debtor_account.clone(),
                transfer_amount,
                Some(accounts.transfer_account.clone()),
                voucher,
                date,
            )
            .with_party(doc.party),
            LedgerLine::credit(
                accounts.transfer_account.clone(),
                transfer_amount,
                Some(accounts.debtor_account.clone()),
                voucher,
                date,
            ),
            LedgerLine::debit(
                accounts.transit_account.clone(),
                valuation_amount,
                Some(stock_account.clone()),
                voucher,
                date,
            ),
            LedgerLine::credit(
                stock_account,
                valuation_amount,
                Some(accounts.transit_account.clone()),
                voucher,
                date,
            )
            .as_stock(),
        ],
        // Receipt: the mirror image, with the creditor in place of the
        // debtor.
        _ => vec![
            LedgerLine::credit(
                accounts.creditor_account.clone(),
                transfer_amount,
                Some(accounts.transfer_account.clone()),
                voucher,
                date,
            )
            .with_party(doc.party),
            LedgerLine::debit(
                accounts.transfer_account.clone(),
                transfer_amount,
                Some(accounts.creditor_account.clone()),
                voucher,
                date,
            ),
            LedgerLine::credit(
                accounts.transit_account.clone(),
                valuation_amount,
                Some(stock_account.clone()),
                voucher,
                date,
            ),
            LedgerLine::debit(
                stock_account,
                valuation_amount,
                Some(accounts.transit_account.clone()),
                voucher,
                date,
            )
            .as_stock(),
        ],
    }
}
