//! CLI argument parsing and config file support.
//!
//! The daemon can be configured via CLI flags, a JSON config file,
//! or a combination of both (CLI overrides config file).

use std::path::{Path, PathBuf};

use clap::Parser;
use scriptbot_types::config::AppConfig;
use scriptbot_types::{Identity, Result, ScriptbotError};
use serde::{Deserialize, Serialize};

pub const AUTHORITY_FILE: &str = "admins.json";
pub const SCRIPTS_FILE: &str = "scripts.json";

const DEFAULT_BOT_HANDLE: &str = "scriptbot";

// ---------------------------------------------------------------------------
// CLI arguments
// ---------------------------------------------------------------------------

/// Scriptbot daemon: private script distribution bot.
///
/// Reads events from stdin as `<user_id>[:<name>] <input>` where input
/// is a `/command`, `tap <payload>`, `photo <file_id> [caption]` or
/// plain text.
#[derive(Parser, Debug, Default)]
#[command(name = "scriptbot-daemon", version, about)]
pub struct CliArgs {
    /// Data directory holding admins.json and scripts.json.
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Bot handle used in deep links (without '@').
    #[arg(long)]
    pub bot_handle: Option<String>,

    /// Owner installed when no authority file exists.
    #[arg(long)]
    pub default_owner: Option<u64>,

    /// Requests admitted per rate window.
    #[arg(long)]
    pub rate_limit: Option<u32>,

    /// Rate window length in seconds.
    #[arg(long)]
    pub rate_window: Option<u64>,

    /// Length of generated script codes.
    #[arg(long)]
    pub code_length: Option<usize>,

    /// Load settings from a JSON config file.
    #[arg(long = "config")]
    pub config_path: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Config file (JSON)
// ---------------------------------------------------------------------------

/// JSON config file format.
///
/// Example `scriptbot.json`:
/// ```json
/// {
///   "data_dir": "/var/lib/scriptbot",
///   "bot_handle": "my_scripts_bot",
///   "default_owner": 2080989762,
///   "rate_limit": 5,
///   "rate_window_secs": 10
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DaemonConfigFile {
    pub data_dir: Option<String>,
    pub bot_handle: Option<String>,
    pub default_owner: Option<u64>,
    pub rate_limit: Option<u32>,
    pub rate_window_secs: Option<u64>,
    pub code_length: Option<usize>,
    pub code_attempts: Option<u32>,
}

// ---------------------------------------------------------------------------
// Resolved config (all defaults applied)
// ---------------------------------------------------------------------------

/// Fully resolved daemon configuration with all defaults applied.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub data_dir: PathBuf,
    pub bot_handle: String,
    pub app: AppConfig,
}

impl DaemonConfig {
    /// Build config purely from CLI args with defaults.
    pub fn from_cli(cli: &CliArgs) -> Self {
        Self::from_file(DaemonConfigFile::default()).merge_cli(cli)
    }

    /// Load config from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| ScriptbotError::ConfigError {
            reason: format!("failed to read config file {}: {e}", path.display()),
        })?;

        let file: DaemonConfigFile =
            serde_json::from_str(&text).map_err(|e| ScriptbotError::ConfigError {
                reason: format!("invalid config JSON: {e}"),
            })?;

        Ok(Self::from_file(file))
    }

    fn from_file(file: DaemonConfigFile) -> Self {
        let defaults = AppConfig::default();
        Self {
            data_dir: file
                .data_dir
                .map(PathBuf::from)
                .unwrap_or_else(default_data_dir),
            bot_handle: file
                .bot_handle
                .unwrap_or_else(|| DEFAULT_BOT_HANDLE.into()),
            app: AppConfig {
                rate_limit: file.rate_limit.unwrap_or(defaults.rate_limit),
                rate_window_secs: file.rate_window_secs.unwrap_or(defaults.rate_window_secs),
                default_owner: file
                    .default_owner
                    .map(Identity::new)
                    .unwrap_or(defaults.default_owner),
                code_length: file.code_length.unwrap_or(defaults.code_length),
                code_attempts: file.code_attempts.unwrap_or(defaults.code_attempts),
            },
        }
    }

    /// Merge CLI overrides onto a config-file base.
    pub fn merge_cli(mut self, cli: &CliArgs) -> Self {
        if let Some(ref dir) = cli.data_dir {
            self.data_dir = dir.clone();
        }
        if let Some(ref handle) = cli.bot_handle {
            self.bot_handle = handle.clone();
        }
        if let Some(owner) = cli.default_owner {
            self.app.default_owner = Identity::new(owner);
        }
        if let Some(limit) = cli.rate_limit {
            self.app.rate_limit = limit;
        }
        if let Some(window) = cli.rate_window {
            self.app.rate_window_secs = window;
        }
        if let Some(len) = cli.code_length {
            self.app.code_length = len;
        }
        self
    }

    /// Validates the resolved configuration.
    pub fn validate(&self) -> Result<()> {
        let handle = self.bot_handle.trim_start_matches('@');
        if handle.is_empty() || handle.contains(char::is_whitespace) {
            return Err(ScriptbotError::ConfigError {
                reason: format!("invalid bot handle '{}'", self.bot_handle),
            });
        }
        self.app.validate()
    }

    pub fn authority_path(&self) -> PathBuf {
        self.data_dir.join(AUTHORITY_FILE)
    }

    pub fn scripts_path(&self) -> PathBuf {
        self.data_dir.join(SCRIPTS_FILE)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Platform-specific default data directory.
fn default_data_dir() -> PathBuf {
    if cfg!(target_os = "linux") {
        if let Some(home) = dirs::home_dir() {
            return home.join(".scriptbot");
        }
    }
    if let Some(data) = dirs::data_dir() {
        return data.join("Scriptbot");
    }
    PathBuf::from("scriptbot-data")
}
