//! # Error Types
//!
//! Construction errors for the validated identity newtypes. Each variant
//! carries the rejected input so callers can report exactly what failed.

use thiserror::Error;

/// Error constructing a validated identifier.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// Tax registration number failed format validation.
    #[error("invalid tax registration number: {0:?}")]
    InvalidTin(String),

    /// Account identifier was empty or whitespace.
    #[error("account identifier must be non-empty")]
    EmptyAccount,

    /// Warehouse identifier was empty or whitespace.
    #[error("warehouse identifier must be non-empty")]
    EmptyWarehouse,

    /// Item code was empty or whitespace.
    #[error("item code must be non-empty")]
    EmptyItemCode,
}
