//! # Access Ledger
//!
//! The many-to-many relation between principals and stored objects, keyed
//! by content fingerprint. Grants are idempotent and never revoked here.

use ccweb_core::{Fingerprint, PrincipalId, StoredObject};

use crate::catalog::ObjectCatalog;
use crate::error::IngestError;

/// Idempotent access grants over an [`ObjectCatalog`].
#[derive(Debug, Clone)]
pub struct AccessLedger<C> {
    catalog: C,
}

impl<C: ObjectCatalog> AccessLedger<C> {
    /// Create a ledger backed by `catalog`.
    pub fn new(catalog: C) -> Self {
        Self { catalog }
    }

    /// Ensure `principal` may retrieve the object. Granting twice is a no-op.
    pub fn grant_access(&self, principal: PrincipalId, fingerprint: &Fingerprint) -> Result<(), IngestError> {
        let created = self.catalog.grant(principal, fingerprint)?;
        if created {
            tracing::debug!(principal = %principal, fingerprint = %fingerprint, "access granted");
        }
        Ok(())
    }

    /// Whether `principal` holds a grant for the object.
    pub fn has_access(&self, principal: PrincipalId, fingerprint: &Fingerprint) -> Result<bool, IngestError> {
        Ok(self.catalog.has_grant(principal, fingerprint)?)
    }

    /// Every object `principal` may retrieve, newest upload first.
    pub fn list_accessible(&self, principal: PrincipalId) -> Result<Vec<StoredObject>, IngestError> {
        Ok(self.catalog.list_for_principal(principal)?)
    }

    /// The object, if it exists and `principal` holds a grant for it.
    ///
    /// Unknown objects and objects without a grant are indistinguishable to
    /// the caller.
    pub fn accessible_object(
        &self,
        principal: PrincipalId,
        fingerprint: &Fingerprint,
    ) -> Result<Option<StoredObject>, IngestError> {
        if !self.catalog.has_grant(principal, fingerprint)? {
            return Ok(None);
        }
        Ok(self.catalog.find_by_fingerprint(fingerprint)?)
    }
}
