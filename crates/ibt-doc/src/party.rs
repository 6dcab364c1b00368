//! # Party Directory
//!
//! Maps an internal unit's tax registration to the single party record
//! flagged to represent that unit. Counterpart generation resolves the
//! receiving unit here; absence and ambiguity are both hard errors.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use ibt_core::{PartyId, Tin};

/// A customer/supplier record that may represent an internal unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    /// Party identity.
    pub id: PartyId,
    /// Display name.
    pub name: String,
    /// Tax registration of the unit this party stands for, when any.
    pub unit_tin: Option<Tin>,
    /// Whether this party is flagged as representing an internal unit.
    pub represents_unit: bool,
}

/// Errors resolving the party for a unit.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PartyError {
    /// No party is flagged for the unit.
    #[error("no party configured for unit {0}")]
    NoPartyForUnit(Tin),

    /// More than one party is flagged for the unit.
    #[error("{count} parties configured for unit {tin}; exactly one expected")]
    AmbiguousParty {
        /// The unit whose lookup was ambiguous.
        tin: Tin,
        /// How many flagged parties matched.
        count: usize,
    },
}

/// Lookup of the party representing an internal unit.
pub trait PartyDirectory {
    /// Resolve the single flagged party for the unit with this tax
    /// registration.
    ///
    /// # Errors
    ///
    /// [`PartyError::NoPartyForUnit`] when none is flagged,
    /// [`PartyError::AmbiguousParty`] when more than one is.
    fn party_representing(&self, tin: &Tin) -> Result<Party, PartyError>;
}

/// In-memory party directory for tests and embedders.
#[derive(Debug, Default)]
pub struct MemoryPartyDirectory {
    parties: RwLock<Vec<Party>>,
}

impl MemoryPartyDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a party.
    pub fn register(&self, party: Party) {
        self.parties.write().push(party);
    }
}

impl PartyDirectory for MemoryPartyDirectory {
    fn party_representing(&self, tin: &Tin) -> Result<Party, PartyError> {
        let parties = self.parties.read();
        let matches: Vec<&Party> = parties
            .iter()
            .filter(|p| p.represents_unit && p.unit_tin.as_ref() == Some(tin))
            .collect();
        match matches.len() {
            0 => Err(PartyError::NoPartyForUnit(tin.clone())),
            1 => Ok(matches[0].clone()),
            count => Err(PartyError::AmbiguousParty {
                tin: tin.clone(),
                count,
            }),
        }
    }
}
