//! On-disk authority record.
//!
//! Layout of `admins.json`: `{"owner": <id>, "admins": [<id>, ...]}`.
//! The record itself carries no policy; access control lives in the
//! core crate and only uses [`AuthorityRecord::normalized`] to restore
//! the owner/admin invariant after loading.

use scriptbot_types::Identity;
use serde::{Deserialize, Serialize};

/// Persisted authority list.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct AuthorityRecord {
    /// The single owner identity.
    pub owner: Identity,
    /// Admins in the order they were granted.
    #[serde(default)]
    pub admins: Vec<Identity>,
}

impl AuthorityRecord {
    /// A record with `owner` and no admins.
    pub fn with_owner(owner: Identity) -> Self {
        Self {
            owner,
            admins: Vec::new(),
        }
    }

    /// Drops the owner and duplicates from `admins`, keeping first
    /// occurrences in order.
    pub fn normalized(mut self) -> Self {
        let owner = self.owner;
        let mut seen = std::collections::HashSet::new();
        self.admins.retain(|id| *id != owner && seen.insert(*id));
        self
    }

    /// Returns `true` if `id` is listed as an admin.
    pub fn lists_admin(&self, id: &Identity) -> bool {
        self.admins.contains(id)
    }
}
