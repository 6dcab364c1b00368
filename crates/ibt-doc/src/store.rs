//! # Document Store
//!
//! Storage abstraction for transfer documents, with an in-memory
//! reference implementation used by tests and embedders. The host
//! framework's relational store implements the same trait in production.
//!
//! ## Atomic Linking
//!
//! The counterpart references are cyclic: the source points at the
//! generated document and vice versa. [`DocumentStore::link`] writes both
//! sides under one guard — both writes commit or neither does. The
//! "at most one non-cancelled counterpart" invariant is enforced here, at
//! write time, not left to callers.

use std::collections::HashMap;

use parking_lot::RwLock;
use thiserror::Error;

use ibt_core::DocId;

use crate::document::{DocStatus, LinkField, TransferDocument};

/// Errors from document store operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No document with the given identity.
    #[error("document not found: {0}")]
    NotFound(DocId),

    /// A document with this identity already exists.
    #[error("document already exists: {0}")]
    Duplicate(DocId),

    /// The document already carries a non-cancelled counterpart.
    #[error("document {doc} is already linked to {existing} via {field}")]
    AlreadyLinked {
        /// The document that refused the new link.
        doc: DocId,
        /// The counterpart it currently references.
        existing: DocId,
        /// The reference slot that is occupied.
        field: LinkField,
    },

    /// The legacy reference slot is read-only for this engine.
    #[error("the legacy reference slot is read-only")]
    LegacyLinkReadOnly,

    /// A document cannot reference itself.
    #[error("document {0} cannot link to itself")]
    SelfLink(DocId),

    /// Unlink requested for a pair that is not linked via the slot.
    #[error("documents {a} and {b} are not linked via {field}")]
    NotLinked {
        /// One side of the requested unlink.
        a: DocId,
        /// The other side.
        b: DocId,
        /// The reference slot inspected.
        field: LinkField,
    },
}

/// Storage for transfer documents.
pub trait DocumentStore {
    /// Fetch a document by identity.
    fn get(&self, id: &DocId) -> Option<TransferDocument>;

    /// Insert a new document.
    ///
    /// # Errors
    ///
    /// [`StoreError::Duplicate`] if the identity is taken.
    fn insert(&self, doc: TransferDocument) -> Result<(), StoreError>;

    /// Replace an existing document.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if the document does not exist.
    fn update(&self, doc: TransferDocument) -> Result<(), StoreError>;

    /// Delete a document outright. Used to roll back a candidate insert
    /// when the subsequent reference write fails.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if the document does not exist.
    fn remove(&self, id: &DocId) -> Result<(), StoreError>;

    /// Snapshot of every stored document, unordered.
    fn all(&self) -> Vec<TransferDocument>;

    /// Every document whose canonical or legacy reference points at
    /// `source`.
    fn counterparts_of(&self, source: &DocId) -> Vec<TransferDocument> {
        self.all()
            .into_iter()
            .filter(|doc| {
                doc.counterpart_reference == Some(*source)
                    || doc.legacy_reference == Some(*source)
            })
            .collect()
    }

    /// Atomically write the bidirectional reference between `a` and `b`
    /// into the given slot on both documents.
    ///
    /// # Errors
    ///
    /// - [`StoreError::LegacyLinkReadOnly`] for the legacy slot.
    /// - [`StoreError::SelfLink`] when `a == b`.
    /// - [`StoreError::NotFound`] when either side is missing.
    /// - [`StoreError::AlreadyLinked`] when either side already carries a
    ///   reference to a non-cancelled document in that slot.
    ///
    /// On any error, neither side is modified.
    fn link(&self, a: &DocId, b: &DocId, field: LinkField) -> Result<(), StoreError>;

    /// Atomically clear the bidirectional reference between `a` and `b`
    /// in the given slot. Each side is cleared only if it still points at
    /// the other.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotLinked`] when neither side references the other.
    fn unlink(&self, a: &DocId, b: &DocId, field: LinkField) -> Result<(), StoreError>;
}

/// In-memory document store guarded by a single `RwLock`.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    docs: RwLock<HashMap<DocId, TransferDocument>>,
}

impl MemoryDocumentStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn get(&self, id: &DocId) -> Option<TransferDocument> {
        self.docs.read().get(id).cloned()
    }

    fn insert(&self, doc: TransferDocument) -> Result<(), StoreError> {
        let mut docs = self.docs.write();
        if docs.contains_key(&doc.id) {
            return Err(StoreError::Duplicate(doc.id));
        }
        docs.insert(doc.id, doc);
        Ok(())
    }

    fn update(&self, doc: TransferDocument) -> Result<(), StoreError> {
        let mut docs = self.docs.write();
        if !docs.contains_key(&doc.id) {
            return Err(StoreError::NotFound(doc.id));
        }
        docs.insert(doc.id, doc);
        Ok(())
    }

    fn remove(&self, id: &DocId) -> Result<(), StoreError> {
        match self.docs.write().remove(id) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound(*id)),
        }
    }

    fn all(&self) -> Vec<TransferDocument> {
        self.docs.read().values().cloned().collect()
    }

    fn link(&self, a: &DocId, b: &DocId, field: LinkField) -> Result<(), StoreError> {
        if field == LinkField::Legacy {
            return Err(StoreError::LegacyLinkReadOnly);
        }
        if a == b {
            return Err(StoreError::SelfLink(*a));
        }

        let mut docs = self.docs.write();

        // Validate both sides before touching either.
        for (side, other) in [(a, b), (b, a)] {
            let doc = docs.get(side).ok_or(StoreError::NotFound(*side))?;
            if let Some(existing) = doc.reference(field) {
                if existing != *other {
                    let existing_cancelled = docs
                        .get(&existing)
                        .map(|d| d.status == DocStatus::Cancelled)
                        .unwrap_or(true);
                    if !existing_cancelled {
                        return Err(StoreError::AlreadyLinked {
                            doc: *side,
                            existing,
                            field,
                        });
                    }
                }
            }
        }

        docs.get_mut(a)
            .expect("validated above")
            .set_reference(field, Some(*b));
        docs.get_mut(b)
            .expect("validated above")
            .set_reference(field, Some(*a));
        Ok(())
    }

    fn unlink(&self, a: &DocId, b: &DocId, field: LinkField) -> Result<(), StoreError> {
        let mut docs = self.docs.write();

        let a_points = docs
            .get(a)
            .ok_or(StoreError::NotFound(*a))?
            .reference(field)
            == Some(*b);
        let b_points = docs
            .get(b)
            .ok_or(StoreError::NotFound(*b))?
            .reference(field)
            == Some(*a);

        if !a_points && !b_points {
            return Err(StoreError::NotLinked {
                a: *a,
                b: *b,
                field,
            });
        }

        if a_points {
            docs.get_mut(a).expect("checked above").set_reference(field, None);
        }
        if b_points {
            docs.get_mut(b).expect("checked above").set_reference(field, None);
        }
        Ok(())
    }
}
