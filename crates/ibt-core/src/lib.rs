#![deny(missing_docs)]

//! # ibt-core — Foundational Types for the Interbranch Transfer Stack
//!
//! This crate defines the types every other crate in the workspace depends
//! on. It has no internal crate dependencies — only `serde`, `thiserror`,
//! `uuid`, and `rust_decimal` from the external ecosystem.
//!
//! ## Design Principles
//!
//! 1. **Newtype wrappers for domain primitives.** Every identifier is a
//!    distinct type. You cannot pass an [`AccountId`] where a
//!    [`WarehouseId`] is expected.
//!
//! 2. **All quantities and amounts are `rust_decimal::Decimal`.** Floats
//!    never carry money. Comparison happens only through the fixed-precision
//!    helpers in [`money`]: six decimal places for quantities and rates,
//!    two for monetary amounts.
//!
//! 3. **Structured errors with `thiserror`.** No `Box<dyn Error>`, no
//!    `.unwrap()` outside tests.

pub mod error;
pub mod identity;
pub mod money;

// Re-export primary types at crate root for ergonomic imports.
pub use error::IdentityError;
pub use identity::{AccountId, DocId, ItemCode, LineId, PartyId, Tin, WarehouseId};
pub use money::{
    money_eq, qty_eq, round_money, round_qty, MONEY_PLACES, QTY_PLACES,
};
