//! # Address Set
//!
//! The four address slots a transfer document carries, with the role
//! inversion used when generating a counterpart: the issuing side's own
//! billing address becomes the receiving side's counterparty address and
//! vice versa, and shipping/dispatch swap the same way.

use serde::{Deserialize, Serialize};

/// Addresses attached to a transfer document. All slots are references
/// into the host address book, opaque to this engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressSet {
    /// The owning unit's billing address.
    pub billing: Option<String>,
    /// The counterparty's billing address.
    pub counterparty_billing: Option<String>,
    /// Where the goods are shipped to.
    pub shipping: Option<String>,
    /// Where the goods are dispatched from.
    pub dispatch: Option<String>,
}

impl AddressSet {
    /// Return the address set as seen from the other side of the
    /// transfer: own and counterparty billing swap, shipping and
    /// dispatch swap.
    pub fn inverted(&self) -> AddressSet {
        AddressSet {
            billing: self.counterparty_billing.clone(),
            counterparty_billing: self.billing.clone(),
            shipping: self.dispatch.clone(),
            dispatch: self.shipping.clone(),
        }
    }
}
