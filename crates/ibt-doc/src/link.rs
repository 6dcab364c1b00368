//! # Audited Manual Linking
//!
//! Operator-facing link and unlink on top of the store's atomic
//! reference writes. Every mutation is recorded to an append-only audit
//! sink with actor, timestamp, and before/after reference state; unlink
//! additionally requires a privileged actor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use ibt_core::DocId;

use crate::document::LinkField;
use crate::store::{DocumentStore, StoreError};

/// The operator performing a manual link mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Operator name as known to the host system.
    pub name: String,
    /// Whether the operator holds the reference-repair privilege.
    pub privileged: bool,
}

impl Actor {
    /// An unprivileged operator.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            privileged: false,
        }
    }

    /// A privileged operator.
    pub fn privileged(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            privileged: true,
        }
    }
}

/// The kind of audited mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkAction {
    /// Both reference slots were written.
    Linked,
    /// Both reference slots were cleared.
    Unlinked,
}

impl LinkAction {
    /// Return the string value for serialization.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Linked => "linked",
            Self::Unlinked => "unlinked",
        }
    }
}

impl std::fmt::Display for LinkAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry in the link audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkAuditEntry {
    /// What happened.
    pub action: LinkAction,
    /// Who did it.
    pub actor: String,
    /// When it happened (UTC).
    pub timestamp: DateTime<Utc>,
    /// The source-side document.
    pub source: DocId,
    /// The counterpart-side document.
    pub counterpart: DocId,
    /// The reference slot touched.
    pub field: LinkField,
    /// The source document's reference before the mutation.
    pub source_ref_before: Option<DocId>,
    /// The source document's reference after the mutation.
    pub source_ref_after: Option<DocId>,
}

/// Append-only sink for link audit entries.
pub trait AuditSink {
    /// Record one entry.
    fn record(&self, entry: LinkAuditEntry);
}

/// In-memory audit sink for tests and embedders.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    entries: parking_lot::Mutex<Vec<LinkAuditEntry>>,
}

impl MemoryAuditSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the recorded entries in order.
    pub fn entries(&self) -> Vec<LinkAuditEntry> {
        self.entries.lock().clone()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, entry: LinkAuditEntry) {
        self.entries.lock().push(entry);
    }
}

/// Errors from the audited link operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    /// Unlink requires a privileged actor.
    #[error("operator {0:?} is not privileged to unlink documents")]
    NotPrivileged(String),

    /// The underlying store refused the mutation.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Audited link/unlink operations over a document store.
pub struct LinkLedger<'a, S: DocumentStore, A: AuditSink> {
    store: &'a S,
    audit: &'a A,
}

impl<'a, S: DocumentStore, A: AuditSink> LinkLedger<'a, S, A> {
    /// Create a link ledger over the given store and audit sink.
    pub fn new(store: &'a S, audit: &'a A) -> Self {
        Self { store, audit }
    }

    /// Link `source` and `counterpart` through the given slot, recording
    /// the mutation.
    pub fn link(
        &self,
        actor: &Actor,
        source: DocId,
        counterpart: DocId,
        field: LinkField,
    ) -> Result<(), LinkError> {
        let before = self
            .store
            .get(&source)
            .ok_or(StoreError::NotFound(source))?
            .reference(field);
        self.store.link(&source, &counterpart, field)?;
        self.audit.record(LinkAuditEntry {
            action: LinkAction::Linked,
            actor: actor.name.clone(),
            timestamp: Utc::now(),
            source,
            counterpart,
            field,
            source_ref_before: before,
            source_ref_after: Some(counterpart),
        });
        Ok(())
    }

    /// Unlink `source` and `counterpart`, recording the mutation.
    ///
    /// # Errors
    ///
    /// [`LinkError::NotPrivileged`] unless the actor holds the
    /// reference-repair privilege.
    pub fn unlink(
        &self,
        actor: &Actor,
        source: DocId,
        counterpart: DocId,
        field: LinkField,
    ) -> Result<(), LinkError> {
        if !actor.privileged {
            return Err(LinkError::NotPrivileged(actor.name.clone()));
        }
        let before = self
            .store
            .get(&source)
            .ok_or(StoreError::NotFound(source))?
            .reference(field);
        self.store.unlink(&source, &counterpart, field)?;
        self.audit.record(LinkAuditEntry {
            action: LinkAction::Unlinked,
            actor: actor.name.clone(),
            timestamp: Utc::now(),
            source,
            counterpart,
            field,
            source_ref_before: before,
            source_ref_after: None,
        });
        Ok(())
    }
}
