//! # Transfer Documents and Lines
//!
//! The core data model: one [`TransferDocument`] struct covering the four
//! roles, with explicit optional fields for everything the engine reads
//! or writes, and [`TransferLine`] items carrying the per-line bridging
//! fields (source back-reference and transfer-rate mirror).
//!
//! ## Lifecycle
//!
//! ```text
//! DRAFT ─submit()──▶ SUBMITTED ─cancel()──▶ CANCELLED
//! ```
//!
//! Invalid transitions are rejected with [`LifecycleError`], never
//! silently absorbed. Header totals on a submitted document change only
//! through [`TransferDocument::rederive_totals`].

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use ibt_core::{round_money, AccountId, DocId, ItemCode, LineId, PartyId, Tin, WarehouseId};

use crate::address::AddressSet;

// ---------------------------------------------------------------------------
// DocRole
// ---------------------------------------------------------------------------

/// The four transfer document roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocRole {
    /// Outbound goods movement with no invoice value recognition.
    Dispatch,
    /// Inbound goods movement, counterpart to a dispatch.
    Receipt,
    /// Invoice-bearing document on the issuing side.
    SalesBill,
    /// Invoice-bearing document on the receiving side.
    PurchaseBill,
}

impl DocRole {
    /// Whether documents of this role originate a transfer chain.
    pub fn is_source(&self) -> bool {
        matches!(self, Self::Dispatch | Self::SalesBill)
    }

    /// Whether documents of this role are generated counterparts.
    pub fn is_generated(&self) -> bool {
        matches!(self, Self::Receipt | Self::PurchaseBill)
    }

    /// Whether this role moves physical stock.
    pub fn moves_stock(&self) -> bool {
        matches!(self, Self::Dispatch | Self::Receipt)
    }

    /// Return the string value for serialization and display.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dispatch => "dispatch",
            Self::Receipt => "receipt",
            Self::SalesBill => "sales_bill",
            Self::PurchaseBill => "purchase_bill",
        }
    }
}

impl std::fmt::Display for DocRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// DocStatus
// ---------------------------------------------------------------------------

/// Document lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocStatus {
    /// Editable, not yet effective.
    Draft,
    /// Effective; totals immutable outside the controlled re-derivation.
    Submitted,
    /// Terminal state.
    Cancelled,
}

impl DocStatus {
    /// Return the string value for serialization and display.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for DocStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attempted an invalid lifecycle transition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid transition from {from} to {to} for document {doc}")]
pub struct LifecycleError {
    /// The document on which the transition was attempted.
    pub doc: DocId,
    /// Current state.
    pub from: DocStatus,
    /// Attempted target state.
    pub to: DocStatus,
}

// ---------------------------------------------------------------------------
// LinkField
// ---------------------------------------------------------------------------

/// The outbound reference slots a document carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkField {
    /// Canonical cross-reference between a source and its counterpart.
    Counterpart,
    /// Compatibility reference written by older tooling. Honored when
    /// enumerating counterparts, never written by this engine.
    Legacy,
    /// Secondary reference used only for the stocked
    /// sales-bill → receipt chain.
    Intake,
}

impl LinkField {
    /// Return the string value for serialization and display.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Counterpart => "counterpart_reference",
            Self::Legacy => "legacy_reference",
            Self::Intake => "intake_reference",
        }
    }
}

impl std::fmt::Display for LinkField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// TransferLine
// ---------------------------------------------------------------------------

/// A single line item on a transfer document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferLine {
    /// Line identity, stable across edits.
    pub id: LineId,
    /// Item (SKU) code.
    pub item_code: ItemCode,
    /// Unit of measure.
    pub uom: String,
    /// Transacted quantity in the document's unit of measure.
    pub qty: Decimal,
    /// Quantity in the stock unit of measure.
    pub stock_qty: Decimal,
    /// Unit rate in transaction currency.
    pub rate: Decimal,
    /// Line amount in transaction currency.
    pub amount: Decimal,
    /// Line amount net of discounts in transaction currency.
    pub net_amount: Decimal,
    /// Unit rate in the owning unit's base currency.
    pub base_rate: Decimal,
    /// Line amount in base currency.
    pub base_amount: Decimal,
    /// Net line amount in base currency.
    pub base_net_amount: Decimal,
    /// Stock location. Cleared on generated lines so the receiving side
    /// re-derives it.
    pub warehouse: Option<WarehouseId>,
    /// Cost center. Cleared on generated lines.
    pub cost_center: Option<String>,
    /// Expense account. Cleared on generated lines.
    pub expense_account: Option<AccountId>,
    /// On a generated line, the exact source line it mirrors.
    pub source_line: Option<LineId>,
    /// Mirror of the rate the transfer was valued at on the source side.
    pub transfer_rate: Option<Decimal>,
    /// Quantity already received against this line by earlier intake
    /// documents.
    pub received_qty: Decimal,
    /// Quantity returned against this line.
    pub returned_qty: Decimal,
}

impl TransferLine {
    /// Create a line with the given item, quantity, and rate; amounts
    /// derived, base currency at parity, all bridging fields empty.
    pub fn new(item_code: ItemCode, qty: Decimal, rate: Decimal) -> Self {
        let amount = qty * rate;
        Self {
            id: LineId::new(),
            item_code,
            uom: "Nos".to_string(),
            qty,
            stock_qty: qty,
            rate,
            amount,
            net_amount: amount,
            base_rate: rate,
            base_amount: amount,
            base_net_amount: amount,
            warehouse: None,
            cost_center: None,
            expense_account: None,
            source_line: None,
            transfer_rate: None,
            received_qty: Decimal::ZERO,
            returned_qty: Decimal::ZERO,
        }
    }

    /// Quantity not yet received against this line.
    pub fn unreceived_qty(&self) -> Decimal {
        self.qty + self.returned_qty - self.received_qty
    }

    /// The billing amount this line contributes to a branch transfer:
    /// the base net amount, falling back to the transfer-rate mirror
    /// times stock quantity. `None` when neither is derivable.
    pub fn billing_amount(&self) -> Option<Decimal> {
        if !self.base_net_amount.is_zero() {
            return Some(self.base_net_amount);
        }
        self.transfer_rate
            .map(|rate| rate * self.stock_qty)
            .filter(|amount| !amount.is_zero())
    }
}

// ---------------------------------------------------------------------------
// HeaderTotals
// ---------------------------------------------------------------------------

/// Header totals in transaction and base currency.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeaderTotals {
    /// Net total in transaction currency.
    pub net_total: Decimal,
    /// Tax total in transaction currency.
    pub tax_total: Decimal,
    /// Grand total in transaction currency.
    pub grand_total: Decimal,
    /// Net total in base currency.
    pub base_net_total: Decimal,
    /// Tax total in base currency.
    pub base_tax_total: Decimal,
    /// Grand total in base currency.
    pub base_grand_total: Decimal,
}

// ---------------------------------------------------------------------------
// TransferDocument
// ---------------------------------------------------------------------------

/// A transfer document in any of the four roles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferDocument {
    /// Document identity.
    pub id: DocId,
    /// Which of the four roles this document plays.
    pub role: DocRole,
    /// Lifecycle state.
    pub status: DocStatus,
    /// Ledger posting date.
    pub posting_date: NaiveDate,
    /// Tax registration of the owning unit.
    pub unit_tin: Option<Tin>,
    /// Tax registration of the counterparty unit.
    pub counterparty_tin: Option<Tin>,
    /// The party record on the other side of the transfer.
    pub party: Option<PartyId>,
    /// Transaction currency code.
    pub currency: String,
    /// Ordered line items.
    pub lines: Vec<TransferLine>,
    /// Header totals.
    pub totals: HeaderTotals,
    /// Canonical cross-reference to the counterpart document.
    pub counterpart_reference: Option<DocId>,
    /// Compatibility reference written by older tooling.
    pub legacy_reference: Option<DocId>,
    /// Secondary reference for the stocked sales-bill → receipt chain.
    pub intake_reference: Option<DocId>,
    /// Address slots.
    pub addresses: AddressSet,
    /// Whether this document has been marked as an internal transfer.
    pub internal_transfer: bool,
}

impl TransferDocument {
    /// Create a draft document with no lines and empty references.
    pub fn new(role: DocRole, posting_date: NaiveDate) -> Self {
        Self {
            id: DocId::new(),
            role,
            status: DocStatus::Draft,
            posting_date,
            unit_tin: None,
            counterparty_tin: None,
            party: None,
            currency: "INR".to_string(),
            lines: Vec::new(),
            totals: HeaderTotals::default(),
            counterpart_reference: None,
            legacy_reference: None,
            intake_reference: None,
            addresses: AddressSet::default(),
            internal_transfer: false,
        }
    }

    /// Whether the document is in the submitted state.
    pub fn is_submitted(&self) -> bool {
        self.status == DocStatus::Submitted
    }

    /// Whether the document is cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.status == DocStatus::Cancelled
    }

    /// Transition `Draft → Submitted`.
    ///
    /// # Errors
    ///
    /// [`LifecycleError`] unless the document is currently a draft.
    pub fn submit(&mut self) -> Result<(), LifecycleError> {
        if self.status != DocStatus::Draft {
            return Err(LifecycleError {
                doc: self.id,
                from: self.status,
                to: DocStatus::Submitted,
            });
        }
        self.status = DocStatus::Submitted;
        Ok(())
    }

    /// Transition `Submitted → Cancelled`.
    ///
    /// # Errors
    ///
    /// [`LifecycleError`] unless the document is currently submitted.
    pub fn cancel(&mut self) -> Result<(), LifecycleError> {
        if self.status != DocStatus::Submitted {
            return Err(LifecycleError {
                doc: self.id,
                from: self.status,
                to: DocStatus::Cancelled,
            });
        }
        self.status = DocStatus::Cancelled;
        Ok(())
    }

    /// Find a line by its identity.
    pub fn line(&self, id: LineId) -> Option<&TransferLine> {
        self.lines.iter().find(|l| l.id == id)
    }

    /// The controlled totals re-derivation pass: net totals from the
    /// lines, grand totals as net plus tax, everything rounded at money
    /// precision. This is the only sanctioned way totals change after
    /// submission.
    pub fn rederive_totals(&mut self) {
        let net: Decimal = self.lines.iter().map(|l| l.net_amount).sum();
        let base_net: Decimal = self.lines.iter().map(|l| l.base_net_amount).sum();
        self.totals.net_total = round_money(net);
        self.totals.base_net_total = round_money(base_net);
        self.totals.grand_total = round_money(net + self.totals.tax_total);
        self.totals.base_grand_total = round_money(base_net + self.totals.base_tax_total);
    }

    /// Every outbound reference this document currently carries.
    pub fn outbound_links(&self) -> Vec<(LinkField, DocId)> {
        let mut links = Vec::new();
        if let Some(id) = self.counterpart_reference {
            links.push((LinkField::Counterpart, id));
        }
        if let Some(id) = self.legacy_reference {
            links.push((LinkField::Legacy, id));
        }
        if let Some(id) = self.intake_reference {
            links.push((LinkField::Intake, id));
        }
        links
    }

    /// Read the given reference slot.
    pub fn reference(&self, field: LinkField) -> Option<DocId> {
        match field {
            LinkField::Counterpart => self.counterpart_reference,
            LinkField::Legacy => self.legacy_reference,
            LinkField::Intake => self.intake_reference,
        }
    }

    /// Write the given reference slot.
    pub fn set_reference(&mut self, field: LinkField, value: Option<DocId>) {
        match field {
            LinkField::Counterpart => self.counterpart_reference = value,
            LinkField::Legacy => self.legacy_reference = value,
            LinkField::Intake => self.intake_reference = value,
        }
    }
}
