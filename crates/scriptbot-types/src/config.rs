//! Application configuration with sensible defaults.
//!
//! Operational parameters of the core services live here. The daemon
//! fills them from its CLI flags and config file.

use serde::{Deserialize, Serialize};

use crate::{Identity, Result, ScriptbotError};

/// Owner provisioned when no authority file exists or it is unreadable.
pub const DEFAULT_OWNER_ID: u64 = 2_080_989_762;

/// Core service configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Maximum admitted requests per identity within the window.
    pub rate_limit: u32,

    /// Length of the trailing rate window, in seconds.
    pub rate_window_secs: u64,

    /// Owner used when the authority store is missing or corrupt.
    pub default_owner: Identity,

    /// Number of characters in generated script codes.
    pub code_length: usize,

    /// Maximum generation attempts before giving up on a unique code.
    pub code_attempts: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            rate_limit: 5,
            rate_window_secs: 10,
            default_owner: Identity::new(DEFAULT_OWNER_ID),
            code_length: 8,
            code_attempts: 32,
        }
    }
}

impl AppConfig {
    /// Validates all configuration values.
    ///
    /// Returns an error if any value is outside its acceptable range.
    pub fn validate(&self) -> Result<()> {
        if self.rate_limit == 0 {
            return Err(ScriptbotError::ConfigError {
                reason: "rate_limit must be greater than 0".into(),
            });
        }

        if self.rate_window_secs == 0 {
            return Err(ScriptbotError::ConfigError {
                reason: "rate_window_secs must be greater than 0".into(),
            });
        }

        // Deep-link payloads are capped at 64 characters.
        if self.code_length < 4 || self.code_length > 64 {
            return Err(ScriptbotError::ConfigError {
                reason: "code_length must be 4..=64".into(),
            });
        }

        if self.code_attempts == 0 {
            return Err(ScriptbotError::ConfigError {
                reason: "code_attempts must be greater than 0".into(),
            });
        }

        Ok(())
    }
}
