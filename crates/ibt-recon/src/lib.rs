#![deny(missing_docs)]

//! # ibt-recon — Transfer Chain Reconciliation
//!
//! A batch, read-only scanner over completed transfer chains. It never
//! mutates documents or ledgers: every run recomputes its
//! [`MismatchRecord`]s from current state, reporting missing
//! counterparts, aggregated quantity/value drift, header drift, and
//! invalid linkage.

pub mod report;
pub mod scanner;

pub use report::{Finding, MismatchRecord};
pub use scanner::Scanner;
