//! Owner/admin access control.
//!
//! The authority list is loaded once at startup. Missing or unreadable
//! storage never locks everyone out: the configured default owner is
//! installed instead, and the fallback is logged at error level since
//! it silently changes who holds ownership.
//!
//! Mutations are owner-only. The updated record is written while the
//! write lock is held and only swapped in after the write succeeds, so
//! memory and storage never disagree on an observable operation.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use scriptbot_storage::authority::AuthorityRecord;
use scriptbot_storage::snapshot::SnapshotStore;
use scriptbot_types::{Identity, Result, Role, ScriptbotError};

/// Authority list with snapshot persistence.
pub struct AccessControl {
    record: RwLock<AuthorityRecord>,
    backend: Box<dyn SnapshotStore<AuthorityRecord>>,
}

impl AccessControl {
    /// Loads the authority list from `backend`, falling back to
    /// `default_owner` with no admins.
    pub fn load(backend: Box<dyn SnapshotStore<AuthorityRecord>>, default_owner: Identity) -> Self {
        let record = match backend.load() {
            Ok(Some(record)) => {
                let record = record.normalized();
                tracing::info!(
                    owner = %record.owner,
                    admins = record.admins.len(),
                    "authority loaded"
                );
                record
            }
            Ok(None) => {
                let record = AuthorityRecord::with_owner(default_owner);
                tracing::info!(owner = %default_owner, "provisioning authority with default owner");
                if let Err(e) = backend.save(&record) {
                    tracing::warn!(%e, "could not write provisioned authority");
                }
                record
            }
            Err(e) => {
                tracing::error!(
                    %e,
                    owner = %default_owner,
                    "authority store unreadable, falling back to default owner"
                );
                match backend.quarantine() {
                    Ok(Some(moved)) => tracing::warn!(%moved, "unreadable authority moved aside"),
                    Ok(None) => {}
                    Err(e) => tracing::warn!(%e, "could not quarantine authority store"),
                }
                AuthorityRecord::with_owner(default_owner)
            }
        };

        Self {
            record: RwLock::new(record),
            backend,
        }
    }

    /// Returns the owner identity.
    pub fn owner(&self) -> Result<Identity> {
        Ok(self.read()?.owner)
    }

    /// Returns `true` if `id` is the owner.
    pub fn is_owner(&self, id: &Identity) -> bool {
        self.role(id) == Role::Owner
    }

    /// Returns `true` if `id` is the owner or an admin.
    pub fn is_admin(&self, id: &Identity) -> bool {
        self.role(id).is_admin()
    }

    /// Classifies `id`. A poisoned lock classifies everyone as a guest.
    pub fn role(&self, id: &Identity) -> Role {
        match self.read() {
            Ok(record) if record.owner == *id => Role::Owner,
            Ok(record) if record.lists_admin(id) => Role::Admin,
            Ok(_) => Role::Guest,
            Err(e) => {
                tracing::error!(%e, "authority unavailable");
                Role::Guest
            }
        }
    }

    /// Returns admins in the order they were granted (owner excluded).
    pub fn admins(&self) -> Result<Vec<Identity>> {
        Ok(self.read()?.admins.clone())
    }

    /// Grants admin rights to `candidate`.
    ///
    /// Returns `Ok(false)` if `candidate` already holds them (including
    /// the owner).
    ///
    /// # Errors
    ///
    /// - [`ScriptbotError::Forbidden`] unless `requester` is the owner.
    /// - [`ScriptbotError::PersistenceFailure`] if the write failed; the
    ///   grant is then not in effect.
    pub fn add_admin(&self, requester: &Identity, candidate: Identity) -> Result<bool> {
        let mut record = self.write()?;
        ensure_owner(&record, requester)?;

        if record.owner == candidate || record.lists_admin(&candidate) {
            return Ok(false);
        }

        let mut next = record.clone();
        next.admins.push(candidate);
        self.backend.save(&next)?;
        *record = next;

        tracing::info!(admin = %candidate, "admin added");
        Ok(true)
    }

    /// Revokes admin rights from `candidate`.
    ///
    /// Returns `Ok(false)` if `candidate` was not an admin.
    ///
    /// # Errors
    ///
    /// - [`ScriptbotError::Forbidden`] unless `requester` is the owner,
    ///   or if `candidate` is the owner.
    /// - [`ScriptbotError::PersistenceFailure`] if the write failed; the
    ///   admin then keeps their rights.
    pub fn remove_admin(&self, requester: &Identity, candidate: Identity) -> Result<bool> {
        let mut record = self.write()?;
        ensure_owner(&record, requester)?;

        if record.owner == candidate {
            return Err(ScriptbotError::Forbidden {
                reason: "the owner cannot be removed".into(),
            });
        }
        if !record.lists_admin(&candidate) {
            return Ok(false);
        }

        let mut next = record.clone();
        next.admins.retain(|id| *id != candidate);
        self.backend.save(&next)?;
        *record = next;

        tracing::info!(admin = %candidate, "admin removed");
        Ok(true)
    }

    // -- Internal ---------------------------------------------------------

    fn read(&self) -> Result<RwLockReadGuard<'_, AuthorityRecord>> {
        self.record.read().map_err(|_| ScriptbotError::InternalError {
            reason: "authority lock poisoned".into(),
        })
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, AuthorityRecord>> {
        self.record.write().map_err(|_| ScriptbotError::InternalError {
            reason: "authority lock poisoned".into(),
        })
    }
}

fn ensure_owner(record: &AuthorityRecord, requester: &Identity) -> Result<()> {
    if record.owner != *requester {
        return Err(ScriptbotError::Forbidden {
            reason: "only the owner manages admins".into(),
        });
    }
    Ok(())
}
