//! # Ledger Lines and Voucher Keys
//!
//! The ledger row shape this engine reads (the host's generic stock
//! postings) and emits (the branch-accounting pattern), plus the voucher
//! key that names a document in ledger and tracking stores.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use ibt_core::{money_eq, round_money, AccountId, DocId, PartyId};
use ibt_doc::DocRole;

/// Identifies the document a ledger row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VoucherKey {
    /// The document's role.
    pub role: DocRole,
    /// The document's identity.
    pub doc: DocId,
}

impl VoucherKey {
    /// Build a voucher key.
    pub fn new(role: DocRole, doc: DocId) -> Self {
        Self { role, doc }
    }
}

impl std::fmt::Display for VoucherKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.role, self.doc)
    }
}

/// One general-ledger row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerLine {
    /// The posted account.
    pub account: AccountId,
    /// Debit amount (zero when this is a credit row).
    pub debit: Decimal,
    /// Credit amount (zero when this is a debit row).
    pub credit: Decimal,
    /// The offsetting account.
    pub against: Option<AccountId>,
    /// Party on receivable/payable rows.
    pub party: Option<PartyId>,
    /// The owning voucher.
    pub voucher: VoucherKey,
    /// Posting date.
    pub posting_date: NaiveDate,
    /// Whether the account is a stock account in the host chart. Set by
    /// the host valuation engine on generic rows; the rewrite inspects
    /// it to find the valuation leg.
    pub is_stock_account: bool,
}

impl LedgerLine {
    /// A debit row, amounts rounded at money precision.
    pub fn debit(
        account: AccountId,
        amount: Decimal,
        against: Option<AccountId>,
        voucher: VoucherKey,
        posting_date: NaiveDate,
    ) -> Self {
        Self {
            account,
            debit: round_money(amount),
            credit: Decimal::ZERO,
            against,
            party: None,
            voucher,
            posting_date,
            is_stock_account: false,
        }
    }

    /// A credit row, amounts rounded at money precision.
    pub fn credit(
        account: AccountId,
        amount: Decimal,
        against: Option<AccountId>,
        voucher: VoucherKey,
        posting_date: NaiveDate,
    ) -> Self {
        Self {
            account,
            debit: Decimal::ZERO,
            credit: round_money(amount),
            against,
            party: None,
            voucher,
            posting_date,
            is_stock_account: false,
        }
    }

    /// Attach a party to the row.
    pub fn with_party(mut self, party: Option<PartyId>) -> Self {
        self.party = party;
        self
    }

    /// Flag the row's account as a stock account.
    pub fn as_stock(mut self) -> Self {
        self.is_stock_account = true;
        self
    }
}

/// Whether a row set balances: total debits equal total credits at money
/// precision.
pub fn is_balanced(lines: &[LedgerLine]) -> bool {
    let debit: Decimal = lines.iter().map(|l| l.debit).sum();
    let credit: Decimal = lines.iter().map(|l| l.credit).sum();
    money_eq(debit, credit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 4, 1).unwrap()
    }

    fn account(name: &str) -> AccountId {
        AccountId::new(name).unwrap()
    }

    fn voucher() -> VoucherKey {
        VoucherKey::new(DocRole::Dispatch, DocId::new())
    }

    #[test]
    fn constructors_round_amounts() {
        let row = LedgerLine::debit(account("A"), dec!(10.005), None, voucher(), date());
        assert_eq!(row.debit, dec!(10.00));
        assert_eq!(row.credit, dec!(0));
    }

    #[test]
    fn balance_check() {
        let v = voucher();
        let lines = vec![
            LedgerLine::debit(account("A"), dec!(100), None, v, date()),
            LedgerLine::credit(account("B"), dec!(60), None, v, date()),
            LedgerLine::credit(account("C"), dec!(40), None, v, date()),
        ];
        assert!(is_balanced(&lines));

        let unbalanced = &lines[..2];
        assert!(!is_balanced(unbalanced));
    }

    #[test]
    fn empty_set_balances() {
        assert!(is_balanced(&[]));
    }
}
