//! # Reconciliation Scanner
//!
//! Batch, read-only sweep over completed transfer chains. Three shapes:
//! dispatch → receipt (same jurisdiction), sales bill → purchase bill
//! (inter-jurisdiction), and sales bill → receipt → purchase bill (the
//! stocked intake chain).
//!
//! For each source: a missing counterpart is reported outright;
//! otherwise counterpart lines are aggregated by their matched source
//! line — falling back to item-code aggregation when line links are
//! incomplete — and compared at fixed precision with zero tolerance.
//! A pair that aggregates clean is reported clean even when per-line
//! links were imperfect.
//!
//! An independent sweep reports submitted generated documents whose
//! links are missing, duplicated, or wrong-role, regardless of quantity
//! matching.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use ibt_core::{money_eq, qty_eq, ItemCode};
use ibt_doc::{DocRole, DocumentStore, TransferDocument};
use ibt_transfer::validate_links;

use crate::report::{Finding, MismatchRecord};

/// Read-only scanner over a document store.
pub struct Scanner<'a, S: DocumentStore> {
    store: &'a S,
}

/// Per-item aggregate of one side of a pair.
#[derive(Debug, Default, Clone, PartialEq)]
struct ItemAggregate {
    qty: Decimal,
    taxable_value: Decimal,
    warehouses: Vec<Option<String>>,
}

impl<'a, S: DocumentStore> Scanner<'a, S> {
    /// Create a scanner over the store.
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Run the full sweep.
    pub fn scan(&self) -> Vec<MismatchRecord> {
        let docs = self.store.all();
        let mut records = Vec::new();

        for doc in docs.iter().filter(|d| Self::is_scannable_source(d)) {
            self.scan_chain(doc, &docs, &mut records);
        }
        for doc in docs.iter().filter(|d| Self::is_scannable_generated(d)) {
            if let Err(err) = validate_links(self.store, doc) {
                records.push(MismatchRecord::invalid_linkage(doc.id, doc.role, &err));
            }
        }

        tracing::info!(
            documents = docs.len(),
            findings = records.len(),
            "reconciliation scan finished"
        );
        records
    }

    fn is_scannable_source(doc: &TransferDocument) -> bool {
        doc.is_submitted() && doc.internal_transfer && doc.role.is_source()
    }

    fn is_scannable_generated(doc: &TransferDocument) -> bool {
        doc.is_submitted() && doc.internal_transfer && doc.role.is_generated()
    }

    /// Walk one source's chain and append findings.
    fn scan_chain(
        &self,
        source: &TransferDocument,
        docs: &[TransferDocument],
        records: &mut Vec<MismatchRecord>,
    ) {
        match source.role {
            DocRole::Dispatch => {
                match self.find_linked(source, docs, DocRole::Receipt) {
                    Some(receipt) => {
                        self.compare_pair(source, &receipt, None, records);
                    }
                    None => {
                        records.push(MismatchRecord::missing(
                            source.id,
                            source.role,
                            DocRole::Receipt,
                        ));
                    }
                }
            }
            DocRole::SalesBill => {
                // The stocked chain goes through an intake receipt; the
                // direct chain pairs with the purchase bill. Either way
                // the chain is only complete once a purchase bill
                // exists.
                let intake = source
                    .intake_reference
                    .and_then(|id| docs.iter().find(|d| d.id == id))
                    .filter(|d| d.role == DocRole::Receipt && !d.is_cancelled());

                let purchase = match intake {
                    Some(receipt) => self.find_linked(receipt, docs, DocRole::PurchaseBill),
                    None => self.find_linked(source, docs, DocRole::PurchaseBill),
                };

                match purchase {
                    Some(bill) => {
                        self.compare_pair(source, &bill, intake, records);
                    }
                    None => {
                        records.push(MismatchRecord::missing(
                            source.id,
                            source.role,
                            DocRole::PurchaseBill,
                        ));
                    }
                }
            }
            _ => {}
        }
    }

    /// The submitted document of `role` linked to `doc` via the
    /// canonical or legacy slot, in either direction.
    fn find_linked(
        &self,
        doc: &TransferDocument,
        docs: &[TransferDocument],
        role: DocRole,
    ) -> Option<TransferDocument> {
        docs.iter()
            .find(|other| {
                other.role == role
                    && other.is_submitted()
                    && (other.counterpart_reference == Some(doc.id)
                        || other.legacy_reference == Some(doc.id)
                        || doc.counterpart_reference == Some(other.id)
                        || doc.legacy_reference == Some(other.id))
            })
            .cloned()
    }

    /// Compare a source/counterpart pair, aggregating counterpart lines
    /// by matched source line, with item-code fallback.
    fn compare_pair(
        &self,
        source: &TransferDocument,
        counterpart: &TransferDocument,
        middle: Option<&TransferDocument>,
        records: &mut Vec<MismatchRecord>,
    ) {
        let links_complete = counterpart.lines.iter().all(|line| {
            self.resolve_source_item(source, middle, line).is_some()
        });

        let (source_agg, counterpart_agg) = if links_complete {
            (
                aggregate_by_item(source.lines.iter().map(|l| (l.item_code.clone(), l))),
                aggregate_by_item(counterpart.lines.iter().filter_map(|l| {
                    self.resolve_source_item(source, middle, l)
                        .map(|item| (item, l))
                })),
            )
        } else {
            // Fallback: both sides keyed by their own item codes.
            (
                aggregate_by_item(source.lines.iter().map(|l| (l.item_code.clone(), l))),
                aggregate_by_item(
                    counterpart
                        .lines
                        .iter()
                        .map(|l| (l.item_code.clone(), l)),
                ),
            )
        };

        compare_aggregates(source, counterpart, &source_agg, &counterpart_agg, records);
        compare_headers(source, counterpart, records);
    }

    /// The source-side item a counterpart line mirrors, resolving the
    /// back-reference through the intake middle document when the chain
    /// is stocked. `None` when any hop is missing.
    fn resolve_source_item(
        &self,
        source: &TransferDocument,
        middle: Option<&TransferDocument>,
        line: &ibt_doc::TransferLine,
    ) -> Option<ItemCode> {
        let back_ref = line.source_line?;
        match middle {
            None => source.line(back_ref).map(|l| l.item_code.clone()),
            Some(mid) => {
                let mid_line = mid.line(back_ref)?;
                let origin = mid_line.source_line?;
                source.line(origin).map(|l| l.item_code.clone())
            }
        }
    }
}

/// Sum quantities and taxable values per item code.
fn aggregate_by_item<'l>(
    lines: impl Iterator<Item = (ItemCode, &'l ibt_doc::TransferLine)>,
) -> BTreeMap<String, ItemAggregate> {
    let mut aggregates: BTreeMap<String, ItemAggregate> = BTreeMap::new();
    for (item, line) in lines {
        let entry = aggregates.entry(item.as_str().to_string()).or_default();
        entry.qty += line.qty;
        entry.taxable_value += line.base_net_amount;
        entry
            .warehouses
            .push(line.warehouse.as_ref().map(|w| w.as_str().to_string()));
    }
    aggregates
}

fn compare_aggregates(
    source: &TransferDocument,
    counterpart: &TransferDocument,
    source_agg: &BTreeMap<String, ItemAggregate>,
    counterpart_agg: &BTreeMap<String, ItemAggregate>,
    records: &mut Vec<MismatchRecord>,
) {
    let mut push = |item: &str, field: &'static str, sv: String, cv: String| {
        let item_code = ItemCode::new(item).expect("aggregate keys are non-empty");
        records.push(MismatchRecord {
            source: source.id,
            source_role: source.role,
            counterpart: Some(counterpart.id),
            finding: Finding::LineMismatch {
                item: item_code,
                field,
                source_value: sv,
                counterpart_value: cv,
            },
        });
    };

    for (item, src) in source_agg {
        match counterpart_agg.get(item) {
            None => {
                push(item, "item_code", item.clone(), "absent".to_string());
            }
            Some(cpart) => {
                if !qty_eq(src.qty, cpart.qty) {
                    push(item, "qty", src.qty.to_string(), cpart.qty.to_string());
                }
                if !money_eq(src.taxable_value, cpart.taxable_value) {
                    push(
                        item,
                        "taxable_value",
                        src.taxable_value.to_string(),
                        cpart.taxable_value.to_string(),
                    );
                }
                // Warehouses compare only where both sides carry one;
                // generated lines legitimately clear theirs for
                // re-derivation.
                for (sw, cw) in src.warehouses.iter().zip(cpart.warehouses.iter()) {
                    if let (Some(sw), Some(cw)) = (sw, cw) {
                        if sw != cw {
                            push(item, "warehouse", sw.clone(), cw.clone());
                        }
                    }
                }
            }
        }
    }
    for item in counterpart_agg.keys() {
        if !source_agg.contains_key(item) {
            push(item, "item_code", "absent".to_string(), item.clone());
        }
    }
}

fn compare_headers(
    source: &TransferDocument,
    counterpart: &TransferDocument,
    records: &mut Vec<MismatchRecord>,
) {
    let fields = [
        (
            "grand_total",
            source.totals.grand_total,
            counterpart.totals.grand_total,
        ),
        (
            "tax_total",
            source.totals.tax_total,
            counterpart.totals.tax_total,
        ),
    ];
    for (field, sv, cv) in fields {
        if !money_eq(sv, cv) {
            records.push(MismatchRecord {
                source: source.id,
                source_role: source.role,
                counterpart: Some(counterpart.id),
                finding: Finding::HeaderMismatch {
                    field,
                    source_value: sv.to_string(),
                    counterpart_value: cv.to_string(),
                },
            });
        }
    }
}
