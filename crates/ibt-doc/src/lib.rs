#![deny(missing_docs)]

//! # ibt-doc — Transfer Document Model
//!
//! Typed documents for the four transfer roles (dispatch, receipt, sales
//! bill, purchase bill), their line items and lifecycle, the document
//! store abstraction, the atomic bidirectional link operation, and the
//! party directory that maps an internal unit to the single party record
//! representing it.
//!
//! ## Design
//!
//! - One [`TransferDocument`] struct with a [`DocRole`] discriminant, not
//!   four ad hoc record shapes. Every field the engine reads or writes is
//!   explicit; absence is `Option<T>`, never an implicit missing key.
//! - The cyclic counterpart references are written by a single atomic
//!   [`DocumentStore::link`] operation — both sides or neither.
//! - Lifecycle transitions (`Draft → Submitted → Cancelled`) are methods
//!   that reject invalid transitions instead of free field writes.

pub mod address;
pub mod document;
pub mod link;
pub mod party;
pub mod store;

pub use address::AddressSet;
pub use document::{
    DocRole, DocStatus, HeaderTotals, LifecycleError, LinkField, TransferDocument, TransferLine,
};
pub use link::{
    Actor, AuditSink, LinkAction, LinkAuditEntry, LinkError, LinkLedger, MemoryAuditSink,
};
pub use party::{MemoryPartyDirectory, Party, PartyDirectory, PartyError};
pub use store::{DocumentStore, MemoryDocumentStore, StoreError};
