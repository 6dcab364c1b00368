//! # Identity Newtypes
//!
//! Domain-primitive newtypes for identifiers throughout the stack. Each
//! identifier is a distinct type — you cannot pass a [`DocId`] where a
//! [`LineId`] is expected.
//!
//! ## Validation
//!
//! String-based identifiers ([`Tin`], [`AccountId`], [`WarehouseId`],
//! [`ItemCode`]) validate at construction time. UUID-based identifiers
//! ([`DocId`], [`LineId`], [`PartyId`]) are always valid by construction.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::IdentityError;

// ---------------------------------------------------------------------------
// UUID-based identifiers (always valid by construction)
// ---------------------------------------------------------------------------

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            /// Create a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Create an identifier from an existing UUID.
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Access the underlying UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id! {
    /// A unique identifier for a transfer document (dispatch, receipt,
    /// sales bill, or purchase bill).
    DocId
}

uuid_id! {
    /// A unique identifier for a single line item within a transfer
    /// document. Generated lines carry the source [`LineId`] they mirror.
    LineId
}

uuid_id! {
    /// A unique identifier for a party record (the customer/supplier
    /// record that represents an internal unit on the other side of a
    /// transfer).
    PartyId
}

// ---------------------------------------------------------------------------
// String-based identifiers (validated at construction)
// ---------------------------------------------------------------------------

/// Tax registration number of a branch or separately registered unit.
///
/// Two documents whose units carry the same `Tin` settle as an
/// intra-jurisdiction branch transfer; differing `Tin`s require
/// invoice-based settlement.
///
/// # Validation
///
/// - Must be 5-20 characters after trimming
/// - Must be alphanumeric (ASCII letters and digits only)
/// - Stored in uppercase form for consistent equality
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tin(String);

impl Tin {
    /// Create a tax registration number, validating format.
    ///
    /// The value is uppercased for storage so equality checks are
    /// case-insensitive.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::InvalidTin`] if the format is invalid.
    pub fn new(value: impl Into<String>) -> Result<Self, IdentityError> {
        let s = value.into();
        let upper = s.trim().to_uppercase();

        if upper.len() < 5 || upper.len() > 20 {
            return Err(IdentityError::InvalidTin(s));
        }
        if !upper.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(IdentityError::InvalidTin(s));
        }

        Ok(Self(upper))
    }

    /// Access the registration number string (uppercase).
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Tin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A ledger account identifier (path within the host chart of accounts).
///
/// The engine never interprets account structure; it only posts to the
/// accounts named in its settings and in incoming generic ledger lines.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(String);

impl AccountId {
    /// Create an account identifier from a non-empty string.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::EmptyAccount`] for empty or
    /// whitespace-only input.
    pub fn new(value: impl Into<String>) -> Result<Self, IdentityError> {
        let s = value.into();
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(IdentityError::EmptyAccount);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Access the account string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A warehouse (stock location) identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WarehouseId(String);

impl WarehouseId {
    /// Create a warehouse identifier from a non-empty string.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::EmptyWarehouse`] for empty or
    /// whitespace-only input.
    pub fn new(value: impl Into<String>) -> Result<Self, IdentityError> {
        let s = value.into();
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(IdentityError::EmptyWarehouse);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Access the warehouse string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WarehouseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An item (SKU) code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemCode(String);

impl ItemCode {
    /// Create an item code from a non-empty string.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::EmptyItemCode`] for empty or
    /// whitespace-only input.
    pub fn new(value: impl Into<String>) -> Result<Self, IdentityError> {
        let s = value.into();
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(IdentityError::EmptyItemCode);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Access the item code string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ItemCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -- UUID identifiers --

    #[test]
    fn doc_id_unique() {
        let a = DocId::new();
        let b = DocId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn line_id_from_uuid_roundtrip() {
        let uuid = Uuid::new_v4();
        let id = LineId::from_uuid(uuid);
        assert_eq!(*id.as_uuid(), uuid);
    }

    // -- Tin --

    #[test]
    fn tin_valid() {
        let tin = Tin::new("27AAACX1234F1ZP").unwrap();
        assert_eq!(tin.as_str(), "27AAACX1234F1ZP");
    }

    #[test]
    fn tin_lowercased_to_upper() {
        let tin = Tin::new("27aaacx1234f1zp").unwrap();
        assert_eq!(tin.as_str(), "27AAACX1234F1ZP");
    }

    #[test]
    fn tin_equality_case_insensitive() {
        assert_eq!(
            Tin::new("27AAACX1234F1ZP").unwrap(),
            Tin::new("27aaacx1234f1zp").unwrap()
        );
    }

    #[test]
    fn tin_rejects_invalid() {
        assert!(Tin::new("").is_err());
        assert!(Tin::new("ABCD").is_err()); // too short (4)
        assert!(Tin::new("27-AAACX-1234").is_err()); // non-alphanumeric
        assert!(Tin::new("A".repeat(21)).is_err()); // too long
    }

    // -- AccountId / WarehouseId / ItemCode --

    #[test]
    fn account_id_trims() {
        let acc = AccountId::new("  Stock In Transit - L ").unwrap();
        assert_eq!(acc.as_str(), "Stock In Transit - L");
    }

    #[test]
    fn account_id_rejects_empty() {
        assert!(AccountId::new("").is_err());
        assert!(AccountId::new("   ").is_err());
    }

    #[test]
    fn warehouse_rejects_empty() {
        assert!(WarehouseId::new("").is_err());
        assert!(matches!(
            WarehouseId::new(" "),
            Err(IdentityError::EmptyWarehouse)
        ));
    }

    #[test]
    fn item_code_rejects_empty() {
        assert!(matches!(ItemCode::new(""), Err(IdentityError::EmptyItemCode)));
    }

    #[test]
    fn serde_roundtrip() {
        let tin = Tin::new("27AAACX1234F1ZP").unwrap();
        let json = serde_json::to_string(&tin).unwrap();
        let back: Tin = serde_json::from_str(&json).unwrap();
        assert_eq!(tin, back);
    }
}
