//! # Branch Accounting Settings
//!
//! The single settings record this engine consumes: the four-account
//! mapping for the branch posting pattern, the force-rewrite override,
//! and the posting-date cutoff before which none of the engine's
//! validations or rewrites apply. Loadable from YAML.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use ibt_core::AccountId;

/// Settings failed to parse.
#[derive(Error, Debug)]
pub enum SettingsError {
    /// The YAML payload was malformed.
    #[error("failed to parse settings: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// The resolved four-account mapping, present only when every account is
/// configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountMap {
    /// Goods in transit between branches.
    pub transit_account: AccountId,
    /// The inter-branch transfer clearing account.
    pub transfer_account: AccountId,
    /// Inter-branch receivable on the dispatching side.
    pub debtor_account: AccountId,
    /// Inter-branch payable on the receiving side.
    pub creditor_account: AccountId,
}

/// Persisted configuration for the branch-accounting rewrite.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BranchAccountingSettings {
    /// Master switch. Off means every rewrite is skipped and generic
    /// postings stand.
    #[serde(default)]
    pub enabled: bool,
    /// Goods-in-transit account.
    #[serde(default)]
    pub transit_account: Option<AccountId>,
    /// Inter-branch transfer clearing account.
    #[serde(default)]
    pub transfer_account: Option<AccountId>,
    /// Inter-branch debtor account.
    #[serde(default)]
    pub debtor_account: Option<AccountId>,
    /// Inter-branch creditor account.
    #[serde(default)]
    pub creditor_account: Option<AccountId>,
    /// Proceed with the rewrite even when a line's billing amount cannot
    /// be derived (the line contributes zero).
    #[serde(default)]
    pub force_rewrite: bool,
    /// Documents posted before this date are outside the engine
    /// entirely.
    #[serde(default)]
    pub cutoff_date: Option<NaiveDate>,
}

impl BranchAccountingSettings {
    /// Parse settings from a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, SettingsError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Whether the engine applies to a document posted on `date`.
    pub fn applies_on(&self, date: NaiveDate) -> bool {
        if !self.enabled {
            return false;
        }
        match self.cutoff_date {
            Some(cutoff) => date >= cutoff,
            None => true,
        }
    }

    /// The complete account mapping, or `None` while any account is
    /// unconfigured.
    pub fn accounts(&self) -> Option<AccountMap> {
        Some(AccountMap {
            transit_account: self.transit_account.clone()?,
            transfer_account: self.transfer_account.clone()?,
            debtor_account: self.debtor_account.clone()?,
            creditor_account: self.creditor_account.clone()?,
        })
    }
}
