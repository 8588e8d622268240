//! Persistence layer for scriptbot.
//!
//! Durable state is kept as whole-file JSON snapshots behind the
//! [`snapshot::SnapshotStore`] trait. On top of it sit the
//! [`scripts::ScriptStore`] (the keyed script collection) and the
//! on-disk [`authority::AuthorityRecord`] consumed by access control.

pub mod authority;
pub mod codes;
pub mod scripts;
pub mod snapshot;
