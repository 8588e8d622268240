//! Typed commands and button payloads.
//!
//! Raw command text and callback payloads are decoded once here; the
//! dispatcher only ever matches on [`Command`] and [`CallbackAction`].
//! Payload strings keep the established wire format so buttons sent
//! before a restart keep working.

use std::fmt;
use std::str::FromStr;

use scriptbot_types::{ScriptCode, ScriptbotError};

// ---------------------------------------------------------------------------
// CallbackAction
// ---------------------------------------------------------------------------

const SCRIPT_PANEL: &str = "script_panel";
const BACK_ADMIN: &str = "back_admin";
const ADD_SCRIPT: &str = "add_script";
const REMOVE_SCRIPT: &str = "remove_script";
const ADD_ADMIN: &str = "add_admin";
const REMOVE_ADMIN: &str = "remove_admin";
const LIST_ADMINS: &str = "list_admins";

const OPEN_PREFIX: &str = "script_";
const LINK_PREFIX: &str = "link_";
const EDIT_PREFIX: &str = "edit_";
const DELETE_PREFIX: &str = "delete_";

/// A decoded button press.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CallbackAction {
    /// Show the script menu.
    ScriptPanel,
    /// Show the admin menu.
    BackToAdmin,
    /// Show the action menu of a script.
    OpenScript(ScriptCode),
    /// Show the deep link of a script.
    Link(ScriptCode),
    /// Start editing a script.
    Edit(ScriptCode),
    /// Delete a script.
    Delete(ScriptCode),
    /// Start the add-script flow.
    AddScript,
    /// List scripts as delete buttons.
    RemoveScriptMenu,
    /// Explain how to grant admin rights.
    AddAdminHelp,
    /// Explain how to revoke admin rights.
    RemoveAdminHelp,
    /// Show the admin list.
    ListAdmins,
}

impl CallbackAction {
    /// Encodes the action as a button payload.
    pub fn encode(&self) -> String {
        match self {
            Self::ScriptPanel => SCRIPT_PANEL.to_string(),
            Self::BackToAdmin => BACK_ADMIN.to_string(),
            Self::OpenScript(code) => format!("{OPEN_PREFIX}{code}"),
            Self::Link(code) => format!("{LINK_PREFIX}{code}"),
            Self::Edit(code) => format!("{EDIT_PREFIX}{code}"),
            Self::Delete(code) => format!("{DELETE_PREFIX}{code}"),
            Self::AddScript => ADD_SCRIPT.to_string(),
            Self::RemoveScriptMenu => REMOVE_SCRIPT.to_string(),
            Self::AddAdminHelp => ADD_ADMIN.to_string(),
            Self::RemoveAdminHelp => REMOVE_ADMIN.to_string(),
            Self::ListAdmins => LIST_ADMINS.to_string(),
        }
    }
}

impl fmt::Display for CallbackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for CallbackAction {
    type Err = ScriptbotError;

    fn from_str(payload: &str) -> std::result::Result<Self, Self::Err> {
        // Exact payloads first: "script_panel" also carries the open prefix.
        let exact = match payload {
            SCRIPT_PANEL => Some(Self::ScriptPanel),
            BACK_ADMIN => Some(Self::BackToAdmin),
            ADD_SCRIPT => Some(Self::AddScript),
            REMOVE_SCRIPT => Some(Self::RemoveScriptMenu),
            ADD_ADMIN => Some(Self::AddAdminHelp),
            REMOVE_ADMIN => Some(Self::RemoveAdminHelp),
            LIST_ADMINS => Some(Self::ListAdmins),
            _ => None,
        };
        if let Some(action) = exact {
            return Ok(action);
        }

        let prefixed: [(&str, fn(ScriptCode) -> Self); 4] = [
            (OPEN_PREFIX, Self::OpenScript),
            (LINK_PREFIX, Self::Link),
            (EDIT_PREFIX, Self::Edit),
            (DELETE_PREFIX, Self::Delete),
        ];
        for (prefix, build) in prefixed {
            if let Some(code) = payload.strip_prefix(prefix) {
                if !code.is_empty() {
                    return Ok(build(ScriptCode::from(code)));
                }
            }
        }

        Err(ScriptbotError::InvalidInput {
            reason: format!("unknown button payload '{payload}'"),
        })
    }
}

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// A decoded slash command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Command {
    /// `/start [code]`.
    Start {
        /// Deep-link payload, if any.
        payload: Option<ScriptCode>,
    },
    /// `/admin`.
    Admin,
    /// `/script`.
    Scripts,
    /// `/addadmin <id>`. The argument is kept raw and parsed by the handler.
    AddAdmin(String),
    /// `/deladmin <id>`.
    RemoveAdmin(String),
    /// Any other command, by name.
    Unknown(String),
}

impl Command {
    /// Parses `text` as a command.
    ///
    /// Returns `None` if `text` does not start with `/`. A `@botname`
    /// suffix on the command name is ignored.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let rest = text.strip_prefix('/')?;

        let mut parts = rest.split_whitespace();
        let head = parts.next().unwrap_or_default();
        let name = head.split('@').next().unwrap_or_default().to_ascii_lowercase();
        let arg = parts.next().map(str::to_string);

        let cmd = match name.as_str() {
            "start" => Self::Start {
                payload: arg.map(ScriptCode::from),
            },
            "admin" => Self::Admin,
            "script" | "scripts" => Self::Scripts,
            "addadmin" => Self::AddAdmin(arg.unwrap_or_default()),
            "deladmin" => Self::RemoveAdmin(arg.unwrap_or_default()),
            _ => Self::Unknown(name),
        };
        Some(cmd)
    }
}
