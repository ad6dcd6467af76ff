//! # Object Catalog
//!
//! The relational persistence boundary: stored objects keyed by a unique
//! fingerprint, and the many-to-many access relation between principals
//! and objects.
//!
//! ## Uniqueness
//!
//! Implementations MUST reject a second [`insert()`](ObjectCatalog::insert)
//! for a fingerprint that is already cataloged with
//! [`CatalogError::UniqueViolation`]. The ingestion engine relies on this to
//! resolve concurrent uploads of the same content without an in-process
//! lock, so the check has to live in the store itself (a `UNIQUE` column for
//! SQL backends, the write lock for [`MemoryCatalog`]).

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use ccweb_core::{FileId, Fingerprint, NewObject, PrincipalId, StoredObject};
use parking_lot::RwLock;
use thiserror::Error;

/// Errors returned by an [`ObjectCatalog`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// An object with this fingerprint is already cataloged.
    #[error("object with fingerprint {0} already exists")]
    UniqueViolation(Fingerprint),

    /// No object with this fingerprint is cataloged.
    #[error("no object with fingerprint {0}")]
    NotFound(Fingerprint),

    /// The backing store failed.
    #[error("catalog backend failure: {0}")]
    Backend(String),
}

/// Persistence for stored objects and access grants.
pub trait ObjectCatalog: Send + Sync {
    /// Look up an object by its unique fingerprint.
    fn find_by_fingerprint(&self, fingerprint: &Fingerprint) -> Result<Option<StoredObject>, CatalogError>;

    /// Insert a new object, assigning its [`FileId`].
    ///
    /// Returns [`CatalogError::UniqueViolation`] if the fingerprint is
    /// already present.
    fn insert(&self, object: NewObject) -> Result<StoredObject, CatalogError>;

    /// Record that `principal` may retrieve the object. Insert-if-absent.
    ///
    /// Returns `true` if the grant was newly created.
    fn grant(&self, principal: PrincipalId, fingerprint: &Fingerprint) -> Result<bool, CatalogError>;

    /// Whether a grant exists for the pair.
    fn has_grant(&self, principal: PrincipalId, fingerprint: &Fingerprint) -> Result<bool, CatalogError>;

    /// Every object `principal` holds a grant for, newest upload first.
    fn list_for_principal(&self, principal: PrincipalId) -> Result<Vec<StoredObject>, CatalogError>;
}

impl<T: ObjectCatalog + ?Sized> ObjectCatalog for Arc<T> {
    fn find_by_fingerprint(&self, fingerprint: &Fingerprint) -> Result<Option<StoredObject>, CatalogError> {
        (**self).find_by_fingerprint(fingerprint)
    }

    fn insert(&self, object: NewObject) -> Result<StoredObject, CatalogError> {
        (**self).insert(object)
    }

    fn grant(&self, principal: PrincipalId, fingerprint: &Fingerprint) -> Result<bool, CatalogError> {
        (**self).grant(principal, fingerprint)
    }

    fn has_grant(&self, principal: PrincipalId, fingerprint: &Fingerprint) -> Result<bool, CatalogError> {
        (**self).has_grant(principal, fingerprint)
    }

    fn list_for_principal(&self, principal: PrincipalId) -> Result<Vec<StoredObject>, CatalogError> {
        (**self).list_for_principal(principal)
    }
}

// ---------------------------------------------------------------------------
// MemoryCatalog
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Inner {
    next_id: i64,
    objects: HashMap<Fingerprint, StoredObject>,
    grants: BTreeSet<(PrincipalId, FileId)>,
}

/// Thread-safe in-memory catalog.
///
/// Clones share the same underlying maps. Used by tests and by the API
/// server when no database is configured.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cataloged objects.
    pub fn object_count(&self) -> usize {
        self.inner.read().objects.len()
    }

    /// Number of access grants across all principals.
    pub fn grant_count(&self) -> usize {
        self.inner.read().grants.len()
    }
}

impl ObjectCatalog for MemoryCatalog {
    fn find_by_fingerprint(&self, fingerprint: &Fingerprint) -> Result<Option<StoredObject>, CatalogError> {
        Ok(self.inner.read().objects.get(fingerprint).cloned())
    }

    fn insert(&self, object: NewObject) -> Result<StoredObject, CatalogError> {
        let mut inner = self.inner.write();
        if inner.objects.contains_key(&object.fingerprint) {
            return Err(CatalogError::UniqueViolation(object.fingerprint));
        }
        inner.next_id += 1;
        let stored = object.into_stored(FileId::new(inner.next_id));
        inner.objects.insert(stored.fingerprint, stored.clone());
        Ok(stored)
    }

    fn grant(&self, principal: PrincipalId, fingerprint: &Fingerprint) -> Result<bool, CatalogError> {
        let mut inner = self.inner.write();
        let id = inner
            .objects
            .get(fingerprint)
            .map(|o| o.id)
            .ok_or(CatalogError::NotFound(*fingerprint))?;
        Ok(inner.grants.insert((principal, id)))
    }

    fn has_grant(&self, principal: PrincipalId, fingerprint: &Fingerprint) -> Result<bool, CatalogError> {
        let inner = self.inner.read();
        Ok(inner
            .objects
            .get(fingerprint)
            .is_some_and(|o| inner.grants.contains(&(principal, o.id))))
    }

    fn list_for_principal(&self, principal: PrincipalId) -> Result<Vec<StoredObject>, CatalogError> {
        let inner = self.inner.read();
        let mut out: Vec<StoredObject> = inner
            .objects
            .values()
            .filter(|o| inner.grants.contains(&(principal, o.id)))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at).then(b.id.cmp(&a.id)));
        Ok(out)
    }
}
