//! # Parity Validation
//!
//! Proves line-for-line and header-total equality between a source
//! transfer document and a candidate counterpart. Quantities and rates
//! compare at six decimal places, monetary amounts at two, zero
//! tolerance.
//!
//! ## Modes
//!
//! - [`validate_parity`] is the blocking form: the first violation is
//!   returned as a structured [`ParityError`] naming the offending row,
//!   field, expected value, and actual value. Used before inserting a
//!   generated document and again at submit time.
//! - [`diff_documents`] is the non-blocking form: it collects every
//!   discrepancy into a [`MatchReport`]. The reconciliation scanner and
//!   the standalone pre-check operation build on this.
//!
//! Only *eligible* source lines participate: lines whose unreceived
//! quantity is positive. Lines already fully received by earlier intake
//! documents are not expected to reappear on the counterpart.

use std::collections::HashSet;

use serde::Serialize;
use thiserror::Error;

use ibt_core::{money_eq, qty_eq, LineId};
use ibt_doc::{TransferDocument, TransferLine};

// ---------------------------------------------------------------------------
// Errors and report types
// ---------------------------------------------------------------------------

/// A parity violation. Every variant names what differed and where.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParityError {
    /// The candidate has a different number of lines than the source has
    /// eligible lines.
    #[error("line count mismatch: source has {expected} eligible lines, candidate has {actual}")]
    LineCountMismatch {
        /// Eligible source line count.
        expected: usize,
        /// Candidate line count.
        actual: usize,
    },

    /// A candidate line carries no source back-reference.
    #[error("row {row}: line carries no source back-reference")]
    MissingBackReference {
        /// 1-based candidate row.
        row: usize,
    },

    /// A candidate line's back-reference resolves to no eligible source
    /// line.
    #[error("row {row}: back-reference {line} resolves to no eligible source line")]
    DanglingBackReference {
        /// 1-based candidate row.
        row: usize,
        /// The dangling reference.
        line: LineId,
    },

    /// Two candidate lines point at the same source line.
    #[error("row {row}: source line {line} is already consumed by another row")]
    DuplicateBackReference {
        /// 1-based candidate row.
        row: usize,
        /// The doubly-consumed source line.
        line: LineId,
    },

    /// A field on a candidate line differs from its source line.
    #[error("row {row}: field {field:?} mismatch — expected {expected}, actual {actual}")]
    FieldMismatch {
        /// 1-based candidate row.
        row: usize,
        /// The differing field.
        field: &'static str,
        /// Value on the source line.
        expected: String,
        /// Value on the candidate line.
        actual: String,
    },

    /// An eligible source line is not consumed by any candidate line.
    #[error("source line {line} is not mirrored by any candidate line")]
    UnconsumedSourceLine {
        /// The unmirrored source line.
        line: LineId,
    },

    /// A header total differs after recomputing the candidate's totals
    /// from its lines.
    #[error("header field {field:?} mismatch — expected {expected}, actual {actual}")]
    HeaderMismatch {
        /// The differing header field.
        field: &'static str,
        /// Value on the source document.
        expected: String,
        /// Value on the candidate document.
        actual: String,
    },
}

/// One field-level discrepancy on a line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineDiff {
    /// 1-based candidate row.
    pub row: usize,
    /// The differing field.
    pub field: &'static str,
    /// Value on the source line.
    pub expected: String,
    /// Value on the candidate line.
    pub actual: String,
}

/// One header-level discrepancy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderDiff {
    /// The differing header field.
    pub field: &'static str,
    /// Value on the source document.
    pub expected: String,
    /// Value on the candidate document.
    pub actual: String,
}

/// Full non-blocking comparison result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MatchReport {
    /// Eligible source line count vs candidate line count, when they
    /// differ.
    pub line_count: Option<(usize, usize)>,
    /// Candidate rows (1-based) that could not be mapped to a source
    /// line.
    pub unmapped_rows: Vec<usize>,
    /// Eligible source lines no candidate line consumed.
    pub unconsumed_source_lines: Vec<LineId>,
    /// Field-level line discrepancies.
    pub line_diffs: Vec<LineDiff>,
    /// Header discrepancies.
    pub header_diffs: Vec<HeaderDiff>,
}

impl MatchReport {
    /// Whether the two documents are in full parity.
    pub fn is_match(&self) -> bool {
        self.line_count.is_none()
            && self.unmapped_rows.is_empty()
            && self.unconsumed_source_lines.is_empty()
            && self.line_diffs.is_empty()
            && self.header_diffs.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Shared comparators
// ---------------------------------------------------------------------------

fn eligible_lines(source: &TransferDocument) -> Vec<&TransferLine> {
    source
        .lines
        .iter()
        .filter(|l| l.unreceived_qty() > rust_decimal::Decimal::ZERO)
        .collect()
}

fn compare_lines(row: usize, src: &TransferLine, cand: &TransferLine) -> Vec<LineDiff> {
    let mut diffs = Vec::new();
    let mut push = |field: &'static str, expected: String, actual: String| {
        diffs.push(LineDiff {
            row,
            field,
            expected,
            actual,
        });
    };

    if src.item_code != cand.item_code {
        push(
            "item_code",
            src.item_code.to_string(),
            cand.item_code.to_string(),
        );
    }
    if src.uom != cand.uom {
        push("uom", src.uom.clone(), cand.uom.clone());
    }

    let qty_fields = [
        ("qty", src.qty, cand.qty),
        ("stock_qty", src.stock_qty, cand.stock_qty),
        ("rate", src.rate, cand.rate),
        ("base_rate", src.base_rate, cand.base_rate),
    ];
    for (field, expected, actual) in qty_fields {
        if !qty_eq(expected, actual) {
            push(field, expected.to_string(), actual.to_string());
        }
    }

    let money_fields = [
        ("amount", src.amount, cand.amount),
        ("net_amount", src.net_amount, cand.net_amount),
        ("base_amount", src.base_amount, cand.base_amount),
        ("base_net_amount", src.base_net_amount, cand.base_net_amount),
    ];
    for (field, expected, actual) in money_fields {
        if !money_eq(expected, actual) {
            push(field, expected.to_string(), actual.to_string());
        }
    }

    diffs
}

fn compare_headers(source: &TransferDocument, candidate: &TransferDocument) -> Vec<HeaderDiff> {
    // Header totals are only trusted after re-deriving the candidate's
    // totals from its own lines.
    let mut rederived = candidate.clone();
    rederived.rederive_totals();

    let fields = [
        ("net_total", source.totals.net_total, rederived.totals.net_total),
        ("tax_total", source.totals.tax_total, rederived.totals.tax_total),
        (
            "grand_total",
            source.totals.grand_total,
            rederived.totals.grand_total,
        ),
        (
            "base_net_total",
            source.totals.base_net_total,
            rederived.totals.base_net_total,
        ),
        (
            "base_tax_total",
            source.totals.base_tax_total,
            rederived.totals.base_tax_total,
        ),
        (
            "base_grand_total",
            source.totals.base_grand_total,
            rederived.totals.base_grand_total,
        ),
    ];

    fields
        .into_iter()
        .filter(|(_, expected, actual)| !money_eq(*expected, *actual))
        .map(|(field, expected, actual)| HeaderDiff {
            field,
            expected: expected.to_string(),
            actual: actual.to_string(),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Blocking validation
// ---------------------------------------------------------------------------

/// Validate full parity between a source and a candidate counterpart.
///
/// # Errors
///
/// The first violation found, as a structured [`ParityError`].
pub fn validate_parity(
    source: &TransferDocument,
    candidate: &TransferDocument,
) -> Result<(), ParityError> {
    let eligible = eligible_lines(source);

    if eligible.len() != candidate.lines.len() {
        return Err(ParityError::LineCountMismatch {
            expected: eligible.len(),
            actual: candidate.lines.len(),
        });
    }

    let mut consumed: HashSet<LineId> = HashSet::new();
    for (idx, cand) in candidate.lines.iter().enumerate() {
        let row = idx + 1;
        let source_line_id = cand
            .source_line
            .ok_or(ParityError::MissingBackReference { row })?;
        let src = eligible
            .iter()
            .find(|l| l.id == source_line_id)
            .ok_or(ParityError::DanglingBackReference {
                row,
                line: source_line_id,
            })?;
        if !consumed.insert(source_line_id) {
            return Err(ParityError::DuplicateBackReference {
                row,
                line: source_line_id,
            });
        }

        if let Some(diff) = compare_lines(row, src, cand).into_iter().next() {
            return Err(ParityError::FieldMismatch {
                row: diff.row,
                field: diff.field,
                expected: diff.expected,
                actual: diff.actual,
            });
        }
    }

    if let Some(missed) = eligible.iter().find(|l| !consumed.contains(&l.id)) {
        return Err(ParityError::UnconsumedSourceLine { line: missed.id });
    }

    if let Some(diff) = compare_headers(source, candidate).into_iter().next() {
        return Err(ParityError::HeaderMismatch {
            field: diff.field,
            expected: diff.expected,
            actual: diff.actual,
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Non-blocking diff
// ---------------------------------------------------------------------------

/// Compare two documents and report every discrepancy.
///
/// Candidate lines without a usable back-reference are listed in
/// [`MatchReport::unmapped_rows`] rather than failing the comparison;
/// the caller decides whether to fall back to item-code aggregation.
pub fn diff_documents(source: &TransferDocument, candidate: &TransferDocument) -> MatchReport {
    let eligible = eligible_lines(source);
    let mut report = MatchReport::default();

    if eligible.len() != candidate.lines.len() {
        report.line_count = Some((eligible.len(), candidate.lines.len()));
    }

    let mut consumed: HashSet<LineId> = HashSet::new();
    for (idx, cand) in candidate.lines.iter().enumerate() {
        let row = idx + 1;
        let src = cand
            .source_line
            .and_then(|id| eligible.iter().find(|l| l.id == id).copied());
        match src {
            Some(src) if consumed.insert(src.id) => {
                report.line_diffs.extend(compare_lines(row, src, cand));
            }
            _ => report.unmapped_rows.push(row),
        }
    }

    report.unconsumed_source_lines = eligible
        .iter()
        .filter(|l| !consumed.contains(&l.id))
        .map(|l| l.id)
        .collect();

    report.header_diffs = compare_headers(source, candidate);
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ibt_doc::DocRole;
    use rust_decimal_macros::dec;

    use ibt_core::ItemCode;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 4, 1).unwrap()
    }

    fn item(code: &str) -> ItemCode {
        ItemCode::new(code).unwrap()
    }

    /// A dispatch with one 10 × 100 line and its faithful receipt.
    fn pair() -> (TransferDocument, TransferDocument) {
        let mut source = TransferDocument::new(DocRole::Dispatch, date());
        source
            .lines
            .push(TransferLine::new(item("X"), dec!(10), dec!(100)));
        source.rederive_totals();

        let mut candidate = TransferDocument::new(DocRole::Receipt, date());
        let mut mirrored = source.lines[0].clone();
        mirrored.source_line = Some(mirrored.id);
        mirrored.id = ibt_core::LineId::new();
        candidate.lines.push(mirrored);
        candidate.rederive_totals();

        (source, candidate)
    }

    #[test]
    fn faithful_mirror_passes() {
        let (source, candidate) = pair();
        validate_parity(&source, &candidate).unwrap();
        assert!(diff_documents(&source, &candidate).is_match());
    }

    #[test]
    fn edited_qty_names_row_and_field() {
        let (source, mut candidate) = pair();
        candidate.lines[0].qty = dec!(9);
        let err = validate_parity(&source, &candidate).unwrap_err();
        assert_eq!(
            err,
            ParityError::FieldMismatch {
                row: 1,
                field: "qty",
                expected: "10".to_string(),
                actual: "9".to_string(),
            }
        );
    }

    #[test]
    fn line_count_checked_first() {
        let (source, mut candidate) = pair();
        candidate.lines.clear();
        assert_eq!(
            validate_parity(&source, &candidate),
            Err(ParityError::LineCountMismatch {
                expected: 1,
                actual: 0
            })
        );
    }

    #[test]
    fn missing_back_reference_rejected() {
        let (source, mut candidate) = pair();
        candidate.lines[0].source_line = None;
        assert_eq!(
            validate_parity(&source, &candidate),
            Err(ParityError::MissingBackReference { row: 1 })
        );
    }

    #[test]
    fn duplicate_back_reference_rejected() {
        let (mut source, mut candidate) = pair();
        source
            .lines
            .push(TransferLine::new(item("Y"), dec!(5), dec!(10)));
        source.rederive_totals();

        // Mirror the second source line but point it at the first.
        let mut second = source.lines[1].clone();
        second.id = ibt_core::LineId::new();
        second.source_line = Some(source.lines[0].id);
        candidate.lines.push(second);

        assert_eq!(
            validate_parity(&source, &candidate),
            Err(ParityError::DuplicateBackReference {
                row: 2,
                line: source.lines[0].id
            })
        );
    }

    #[test]
    fn fully_received_lines_are_not_eligible() {
        let (mut source, candidate) = pair();
        let mut exhausted = TransferLine::new(item("Z"), dec!(3), dec!(10));
        exhausted.received_qty = dec!(3);
        source.lines.push(exhausted);
        // Header totals intentionally left as computed before the push:
        // the exhausted line does not participate in parity at all.
        validate_parity(&source, &candidate).unwrap();

        let report = diff_documents(&source, &candidate);
        assert!(report.unconsumed_source_lines.is_empty());
        assert!(report.is_match());
    }

    #[test]
    fn header_mismatch_after_rederivation() {
        let (source, mut candidate) = pair();
        // Tamper with the candidate's stored totals: re-derivation fixes
        // them, so parity still holds.
        candidate.totals.net_total = dec!(999);
        validate_parity(&source, &candidate).unwrap();

        // A genuine tax difference shows up as a header mismatch.
        candidate.totals.tax_total = dec!(5);
        let err = validate_parity(&source, &candidate).unwrap_err();
        assert!(matches!(
            err,
            ParityError::HeaderMismatch {
                field: "tax_total",
                ..
            }
        ));
    }

    #[test]
    fn diff_collects_all_discrepancies() {
        let (source, mut candidate) = pair();
        candidate.lines[0].qty = dec!(9);
        candidate.lines[0].rate = dec!(101);
        let report = diff_documents(&source, &candidate);
        assert!(!report.is_match());
        let fields: Vec<&str> = report.line_diffs.iter().map(|d| d.field).collect();
        assert!(fields.contains(&"qty"));
        assert!(fields.contains(&"rate"));
        // amount fields were derived from the original qty/rate and are
        // untouched, so they still match.
        assert!(!fields.contains(&"amount"));
    }

    #[test]
    fn diff_reports_unmapped_rows_instead_of_failing() {
        let (source, mut candidate) = pair();
        candidate.lines[0].source_line = None;
        let report = diff_documents(&source, &candidate);
        assert_eq!(report.unmapped_rows, vec![1]);
        assert_eq!(report.unconsumed_source_lines, vec![source.lines[0].id]);
    }
}
