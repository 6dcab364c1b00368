//! # Scope Diagnostics
//!
//! Read-only introspection for support use: how a voucher's scope was
//! classified, what it links to, how each line's billing amount
//! resolves, and which stock accounts the generic postings offer. No
//! state is touched.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use ibt_core::{AccountId, DocId, LineId};
use ibt_doc::{DocRole, DocStatus, LinkField, TransferDocument};
use ibt_transfer::{expected_counterpart, resolve_scope, JurisdictionScope, ScopeResolution};

use crate::entry::LedgerLine;
use crate::settings::BranchAccountingSettings;

/// How one line's billing amount resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingAmountSource {
    /// Taken from the line's base net amount.
    NetAmount,
    /// Derived from the transfer-rate mirror times stock quantity.
    TransferRate,
    /// Not derivable; the rewrite would abort on this line without the
    /// force override.
    Underivable,
}

/// Per-line amount probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineAmountProbe {
    /// The probed line.
    pub line: LineId,
    /// Its billing amount, when derivable.
    pub billing_amount: Option<Decimal>,
    /// Where the amount came from.
    pub source: BillingAmountSource,
}

/// Read-only snapshot of a voucher's classification and amount
/// resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeDiagnostic {
    /// The inspected document.
    pub doc: DocId,
    /// Its role.
    pub role: DocRole,
    /// Its lifecycle state.
    pub status: DocStatus,
    /// The resolved scope.
    pub scope: JurisdictionScope,
    /// How the scope was resolved.
    pub resolution: ScopeResolution,
    /// Whether the engine applies given the settings switch and cutoff.
    pub engine_applies: bool,
    /// Whether the four-account mapping is complete.
    pub accounts_configured: bool,
    /// The counterpart role and link slot the legal pattern expects for
    /// this document as a source, when it can originate one.
    pub expected_counterpart: Option<(DocRole, LinkField)>,
    /// Every outbound reference the document carries.
    pub links: Vec<(LinkField, DocId)>,
    /// Per-line billing amount resolution.
    pub line_amounts: Vec<LineAmountProbe>,
    /// The summed billing value, when every line resolves.
    pub transfer_amount: Option<Decimal>,
    /// Distinct stock accounts on the expected side of the generic
    /// postings.
    pub stock_account_candidates: Vec<AccountId>,
}

/// Build the diagnostic snapshot for a voucher.
pub fn debug_scope(
    doc: &TransferDocument,
    generic: &[LedgerLine],
    settings: &BranchAccountingSettings,
) -> ScopeDiagnostic {
    let resolved = resolve_scope(doc);

    let line_amounts: Vec<LineAmountProbe> = doc
        .lines
        .iter()
        .map(|line| {
            let billing_amount = line.billing_amount();
            let source = if billing_amount.is_none() {
                BillingAmountSource::Underivable
            } else if line.base_net_amount.is_zero() {
                BillingAmountSource::TransferRate
            } else {
                BillingAmountSource::NetAmount
            };
            LineAmountProbe {
                line: line.id,
                billing_amount,
                source,
            }
        })
        .collect();

    let transfer_amount = line_amounts
        .iter()
        .map(|p| p.billing_amount)
        .sum::<Option<Decimal>>();

    let mut stock_account_candidates: Vec<AccountId> = Vec::new();
    for row in generic.iter().filter(|r| r.is_stock_account) {
        let side_amount = match doc.role {
            DocRole::Dispatch => row.credit,
            _ => row.debit,
        };
        if !side_amount.is_zero() && !stock_account_candidates.contains(&row.account) {
            stock_account_candidates.push(row.account.clone());
        }
    }

    ScopeDiagnostic {
        doc: doc.id,
        role: doc.role,
        status: doc.status,
        scope: resolved.scope,
        resolution: resolved.resolution,
        engine_applies: settings.applies_on(doc.posting_date),
        accounts_configured: settings.accounts().is_some(),
        expected_counterpart: expected_counterpart(doc, false),
        links: doc.outbound_links(),
        line_amounts,
        transfer_amount,
        stock_account_candidates,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ibt_core::{ItemCode, Tin};
    use ibt_doc::TransferLine;
    use rust_decimal_macros::dec;

    use crate::entry::VoucherKey;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 4, 10).unwrap()
    }

    #[test]
    fn snapshot_reports_scope_amounts_and_candidates() {
        let mut doc = TransferDocument::new(DocRole::Dispatch, date());
        doc.unit_tin = Some(Tin::new("27UNITHO01").unwrap());
        doc.counterparty_tin = Some(Tin::new("27UNITHO01").unwrap());
        doc.lines.push(TransferLine::new(
            ItemCode::new("X").unwrap(),
            dec!(10),
            dec!(100),
        ));
        let mut rate_only = TransferLine::new(ItemCode::new("Y").unwrap(), dec!(5), dec!(0));
        rate_only.transfer_rate = Some(dec!(20));
        doc.lines.push(rate_only);
        doc.submit().unwrap();

        let voucher = VoucherKey::new(doc.role, doc.id);
        let generic = vec![LedgerLine::credit(
            AccountId::new("Stores - L").unwrap(),
            dec!(800),
            None,
            voucher,
            date(),
        )
        .as_stock()];

        let settings = BranchAccountingSettings {
            enabled: true,
            ..Default::default()
        };
        let snapshot = debug_scope(&doc, &generic, &settings);

        assert_eq!(snapshot.scope, JurisdictionScope::Same);
        assert!(snapshot.engine_applies);
        assert!(!snapshot.accounts_configured);
        assert_eq!(snapshot.line_amounts[0].source, BillingAmountSource::NetAmount);
        assert_eq!(
            snapshot.line_amounts[1].source,
            BillingAmountSource::TransferRate
        );
        assert_eq!(snapshot.transfer_amount, Some(dec!(1100)));
        assert_eq!(snapshot.stock_account_candidates.len(), 1);
        assert_eq!(
            snapshot.expected_counterpart,
            Some((DocRole::Receipt, LinkField::Counterpart))
        );
    }

    #[test]
    fn underivable_line_nulls_the_total() {
        let mut doc = TransferDocument::new(DocRole::Dispatch, date());
        let dead = TransferLine::new(ItemCode::new("X").unwrap(), dec!(1), dec!(0));
        doc.lines.push(dead);

        let snapshot = debug_scope(&doc, &[], &BranchAccountingSettings::default());
        assert_eq!(
            snapshot.line_amounts[0].source,
            BillingAmountSource::Underivable
        );
        assert_eq!(snapshot.transfer_amount, None);
    }

    #[test]
    fn serializes_for_support_payloads() {
        let doc = TransferDocument::new(DocRole::Receipt, date());
        let snapshot = debug_scope(&doc, &[], &BranchAccountingSettings::default());
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["role"], "receipt");
        assert_eq!(json["scope"], "same");
    }
}
