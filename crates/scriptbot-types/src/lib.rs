//! Core shared types for the scriptbot service.
//!
//! This crate defines the types used across the workspace: caller
//! identities, script codes and records, authority roles, the central
//! error enum and the application configuration.

pub mod config;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Opaque, stable identifier of a caller.
///
/// Supplied by the transport with every inbound event. The core only
/// compares and hashes it; it never interprets the number.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(u64);

impl Identity {
    /// Creates a new `Identity` from its raw value.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw value.
    pub const fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for Identity {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Identity {
    type Err = ScriptbotError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|e| ScriptbotError::InvalidInput {
                reason: format!("invalid identity '{s}': {e}"),
            })
    }
}

// ---------------------------------------------------------------------------
// ScriptCode
// ---------------------------------------------------------------------------

/// Short code addressing a script, used as the deep-link payload.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScriptCode(String);

impl ScriptCode {
    /// Creates a code from any string.
    ///
    /// No validation happens here: codes arriving from deep links are
    /// simply looked up and resolve to `NotFound` when unknown.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ScriptCode {
    fn from(code: &str) -> Self {
        Self(code.to_string())
    }
}

impl From<String> for ScriptCode {
    fn from(code: String) -> Self {
        Self(code)
    }
}

impl fmt::Display for ScriptCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// PhotoRef
// ---------------------------------------------------------------------------

/// Transport-side reference to an uploaded image (e.g. a file id).
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhotoRef(String);

impl PhotoRef {
    /// Wraps a transport file reference.
    pub fn new(file_ref: impl Into<String>) -> Self {
        Self(file_ref.into())
    }

    /// Returns the reference as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhotoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// ScriptContent
// ---------------------------------------------------------------------------

/// The mutable payload of a script: text and an optional photo.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ScriptContent {
    /// Message text (HTML-formatted). Used as the caption when a photo is set.
    pub text: String,
    /// Optional image reference.
    pub photo: Option<PhotoRef>,
}

impl ScriptContent {
    /// Text-only content.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            photo: None,
        }
    }

    /// Photo content with a caption (may be empty).
    pub fn photo(photo: PhotoRef, caption: impl Into<String>) -> Self {
        Self {
            text: caption.into(),
            photo: Some(photo),
        }
    }

    /// Returns `true` if there is neither text nor a photo.
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && self.photo.is_none()
    }
}

// ---------------------------------------------------------------------------
// Script
// ---------------------------------------------------------------------------

/// A distributable content item.
///
/// Field names on disk follow the established `scripts.json` layout
/// (`id`, `creator_id`).
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Script {
    /// Unique, immutable code.
    #[serde(rename = "id")]
    pub code: ScriptCode,
    /// Message text (HTML).
    #[serde(default)]
    pub text: String,
    /// Optional image reference.
    #[serde(default)]
    pub photo: Option<PhotoRef>,
    /// Identity of the admin who created the script. Immutable.
    #[serde(rename = "creator_id")]
    pub creator: Identity,
}

impl Script {
    /// Returns the current content of the script.
    pub fn content(&self) -> ScriptContent {
        ScriptContent {
            text: self.text.clone(),
            photo: self.photo.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// Authority level of an identity.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Role {
    /// The single distinguished identity with full authority.
    Owner,
    /// Identity granted elevated rights by the owner.
    Admin,
    /// Anyone else. Can only open scripts through links.
    Guest,
}

impl Role {
    /// Returns `true` for the owner.
    pub fn is_owner(self) -> bool {
        matches!(self, Self::Owner)
    }

    /// Returns `true` for the owner and admins.
    pub fn is_admin(self) -> bool {
        matches!(self, Self::Owner | Self::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Owner => write!(f, "owner"),
            Self::Admin => write!(f, "admin"),
            Self::Guest => write!(f, "guest"),
        }
    }
}

// ---------------------------------------------------------------------------
// ScriptbotError
// ---------------------------------------------------------------------------

/// Central error type for the scriptbot workspace.
///
/// None of these is fatal to the process. The dispatcher turns each
/// one into a user-facing reply (or silence).
#[derive(Debug, Error)]
pub enum ScriptbotError {
    /// No script exists under the given code.
    #[error("script not found: {code}")]
    NotFound {
        /// The code that was looked up.
        code: ScriptCode,
    },

    /// The caller lacks the authority for the operation.
    #[error("forbidden: {reason}")]
    Forbidden {
        /// Human-readable description of the missing authority.
        reason: String,
    },

    /// The caller exceeded the request rate.
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited {
        /// Whole seconds (rounded up) until the next request is admitted.
        retry_after_secs: u64,
    },

    /// A durable-store write failed. The mutation was not applied.
    #[error("persistence failure: {reason}")]
    PersistenceFailure {
        /// Human-readable description of the write failure.
        reason: String,
    },

    /// A durable store could not be read or decoded.
    #[error("corrupt state: {reason}")]
    CorruptState {
        /// Human-readable description of the read failure.
        reason: String,
    },

    /// Malformed input: empty content, unknown button payload, bad id.
    #[error("invalid input: {reason}")]
    InvalidInput {
        /// Human-readable description of what was wrong.
        reason: String,
    },

    /// A configuration value is invalid or missing.
    #[error("config error: {reason}")]
    ConfigError {
        /// Human-readable description of the configuration problem.
        reason: String,
    },

    /// Internal invariant failure, e.g. a poisoned lock.
    #[error("internal error: {reason}")]
    InternalError {
        /// Human-readable description of the failure.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// Result alias
// ---------------------------------------------------------------------------

/// Convenience result type using [`ScriptbotError`].
pub type Result<T> = std::result::Result<T, ScriptbotError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
