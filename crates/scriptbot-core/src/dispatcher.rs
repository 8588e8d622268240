//! Routes inbound events to the services and renders replies.
//!
//! [`Dispatcher::handle`] never fails: every error becomes a reply or,
//! for guests poking at admin surfaces without a command, silence.
//! Commands and navigation buttons reset the caller's session, so a
//! half-finished add or edit flow never captures a later message.

use std::sync::Arc;
use std::time::Instant;

use scriptbot_storage::scripts::ScriptStore;
use scriptbot_types::{Identity, Role, ScriptCode, ScriptContent, ScriptbotError};

use crate::access::AccessControl;
use crate::action::{CallbackAction, Command};
use crate::rate_limiter::RateLimiter;
use crate::session::{Sessions, Transition};
use crate::ui::{self, Delivery, Reply};

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Who sent an event.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Caller {
    pub id: Identity,
    /// Name used in greetings.
    pub display_name: Option<String>,
}

impl Caller {
    pub fn new(id: Identity) -> Self {
        Self {
            id,
            display_name: None,
        }
    }

    pub fn named(id: Identity, name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: Some(name.into()),
        }
    }
}

/// Decoded payload of an inbound event.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum EventKind {
    Command(Command),
    Callback(CallbackAction),
    /// Free-form text and/or photo.
    Content(ScriptContent),
}

/// One inbound event from the transport.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InboundEvent {
    pub caller: Caller,
    pub kind: EventKind,
}

impl InboundEvent {
    pub fn new(caller: Caller, kind: EventKind) -> Self {
        Self { caller, kind }
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Event router over the injected services.
pub struct Dispatcher {
    access: Arc<AccessControl>,
    scripts: Arc<ScriptStore>,
    limiter: RateLimiter,
    sessions: Sessions,
    bot_handle: String,
}

impl Dispatcher {
    pub fn new(
        access: Arc<AccessControl>,
        scripts: Arc<ScriptStore>,
        limiter: RateLimiter,
        bot_handle: impl Into<String>,
    ) -> Self {
        Self {
            access,
            scripts,
            limiter,
            sessions: Sessions::new(),
            bot_handle: bot_handle.into(),
        }
    }

    /// Session table, exposed for inspection.
    pub fn sessions(&self) -> &Sessions {
        &self.sessions
    }

    /// Handles one event received at `now`.
    pub fn handle(&self, event: InboundEvent, now: Instant) -> Vec<Reply> {
        let InboundEvent { caller, kind } = event;
        let role = self.access.role(&caller.id);
        tracing::debug!(caller = %caller.id, %role, ?kind, "inbound event");

        match kind {
            EventKind::Command(cmd) => self.on_command(&caller, role, cmd, now),
            EventKind::Callback(action) => self.on_callback(&caller, role, action),
            EventKind::Content(content) => self.on_content(&caller, role, content),
        }
    }

    // -- Commands ---------------------------------------------------------

    fn on_command(&self, caller: &Caller, role: Role, cmd: Command, now: Instant) -> Vec<Reply> {
        self.reset_session(&caller.id);

        if let Command::Unknown(name) = &cmd {
            if !role.is_admin() {
                return Vec::new();
            }
            tracing::debug!(command = %name, "unknown command");
            return vec![Reply::text(HELP)];
        }

        let admitted = self
            .limiter
            .check_at(&caller.id, now)
            .and_then(|decision| decision.into_result());
        if let Err(e) = admitted {
            return vec![error_reply(&e, Delivery::NewMessage)];
        }

        let reply = match cmd {
            Command::Start { payload: Some(code) } => self.deliver(&code),
            Command::Start { payload: None } => greeting(caller, role),
            Command::Admin if role.is_admin() => {
                Reply::text(ADMIN_TITLE).with_keyboard(ui::admin_menu(role))
            }
            Command::Scripts if role.is_admin() => match self.scripts.list() {
                Ok(scripts) => Reply::text(SCRIPTS_TITLE).with_keyboard(ui::scripts_menu(role, &scripts)),
                Err(e) => error_reply(&e, Delivery::NewMessage),
            },
            Command::Admin | Command::Scripts => Reply::text("⛔️ You are not an admin."),
            Command::AddAdmin(arg) => self.manage_admin(caller, role, &arg, true),
            Command::RemoveAdmin(arg) => self.manage_admin(caller, role, &arg, false),
            Command::Unknown(_) => return Vec::new(),
        };
        vec![reply]
    }

    fn deliver(&self, code: &ScriptCode) -> Reply {
        match self.scripts.get(code) {
            Ok(script) => Reply::script(&script),
            Err(e) => error_reply(&e, Delivery::NewMessage),
        }
    }

    fn manage_admin(&self, caller: &Caller, role: Role, arg: &str, grant: bool) -> Reply {
        if !role.is_admin() {
            return Reply::text("⛔️ You are not an admin.");
        }
        let usage = if grant {
            "Usage: /addadmin <user id>"
        } else {
            "Usage: /deladmin <user id>"
        };
        let Ok(candidate) = arg.parse::<Identity>() else {
            return Reply::text(usage);
        };

        let outcome = if grant {
            self.access.add_admin(&caller.id, candidate)
        } else {
            self.access.remove_admin(&caller.id, candidate)
        };

        match (grant, outcome) {
            (true, Ok(true)) => Reply::text(format!("✅ {candidate} is now an admin.")),
            (true, Ok(false)) => Reply::text(format!("ℹ️ {candidate} is already an admin.")),
            (false, Ok(true)) => Reply::text(format!("✅ {candidate} is no longer an admin.")),
            (false, Ok(false)) => Reply::text(format!("ℹ️ {candidate} is not an admin.")),
            (_, Err(e)) => error_reply(&e, Delivery::NewMessage),
        }
    }

    // -- Buttons ----------------------------------------------------------

    fn on_callback(&self, caller: &Caller, role: Role, action: CallbackAction) -> Vec<Reply> {
        if !role.is_admin() {
            return vec![Reply::edit("⛔️ Admins only.")];
        }

        if matches!(
            action,
            CallbackAction::ScriptPanel | CallbackAction::BackToAdmin | CallbackAction::OpenScript(_)
        ) {
            self.reset_session(&caller.id);
        }

        let reply = match self.on_admin_callback(caller, role, action) {
            Ok(reply) => reply,
            Err(e) => error_reply(&e, Delivery::EditMessage),
        };
        vec![reply]
    }

    fn on_admin_callback(
        &self,
        caller: &Caller,
        role: Role,
        action: CallbackAction,
    ) -> scriptbot_types::Result<Reply> {
        let reply = match action {
            CallbackAction::ScriptPanel => {
                let scripts = self.scripts.list()?;
                Reply::edit(SCRIPTS_TITLE).with_keyboard(ui::scripts_menu(role, &scripts))
            }
            CallbackAction::BackToAdmin => {
                Reply::edit(ADMIN_TITLE).with_keyboard(ui::admin_menu(role))
            }
            CallbackAction::OpenScript(code) => {
                let script = self.scripts.get(&code)?;
                Reply::edit(format!("📄 Script {code}"))
                    .with_keyboard(ui::script_actions(&caller.id, role, &script))
            }
            CallbackAction::Link(code) => {
                let script = self.scripts.get(&code)?;
                let link = ui::deep_link(&self.bot_handle, &script.code);
                Reply::edit(format!("🔗 Link for readers:\n{link}"))
                    .with_keyboard(ui::back_to(CallbackAction::OpenScript(code)))
            }
            CallbackAction::Edit(code) => {
                self.sessions
                    .begin_edit(caller.id, role, code.clone(), &self.scripts)?;
                Reply::edit(format!(
                    "✍️ Send the new text and/or photo for script {code}:"
                ))
                .with_keyboard(ui::back_to(CallbackAction::OpenScript(code)))
            }
            CallbackAction::Delete(code) => {
                self.scripts.delete(&code, role)?;
                Reply::edit(format!("🗑 Script {code} deleted"))
                    .with_keyboard(ui::back_to(CallbackAction::ScriptPanel))
            }
            CallbackAction::AddScript => {
                self.sessions.begin_new_script(caller.id, role)?;
                Reply::edit("✍️ Send the text and/or photo for the new script:")
                    .with_keyboard(ui::back_to(CallbackAction::ScriptPanel))
            }
            CallbackAction::RemoveScriptMenu => {
                ensure_owner(role)?;
                let scripts = self.scripts.list()?;
                let text = if scripts.is_empty() {
                    "No scripts yet."
                } else {
                    "Pick a script to delete:"
                };
                Reply::edit(text).with_keyboard(ui::remove_menu(&scripts))
            }
            CallbackAction::AddAdminHelp => {
                ensure_owner(role)?;
                Reply::edit("Send /addadmin <user id> to grant admin rights.")
                    .with_keyboard(ui::back_to(CallbackAction::BackToAdmin))
            }
            CallbackAction::RemoveAdminHelp => {
                ensure_owner(role)?;
                Reply::edit("Send /deladmin <user id> to revoke admin rights.")
                    .with_keyboard(ui::back_to(CallbackAction::BackToAdmin))
            }
            CallbackAction::ListAdmins => {
                let mut text = format!("📋 Admins:\n👑 {}", self.access.owner()?);
                for admin in self.access.admins()? {
                    text.push_str(&format!("\n🛠️ {admin}"));
                }
                Reply::edit(text).with_keyboard(ui::back_to(CallbackAction::BackToAdmin))
            }
        };
        Ok(reply)
    }

    // -- Content ----------------------------------------------------------

    fn on_content(&self, caller: &Caller, role: Role, content: ScriptContent) -> Vec<Reply> {
        if !role.is_admin() {
            // Guests may have lost rights mid-flow; drop whatever was pending.
            self.reset_session(&caller.id);
            return Vec::new();
        }

        match self
            .sessions
            .submit_content(caller.id, role, content, &self.scripts)
        {
            Ok(Transition::Created(script)) => {
                let link = ui::deep_link(&self.bot_handle, &script.code);
                vec![Reply::text(format!(
                    "✅ Script created!\nLink for readers:\n{link}"
                ))]
            }
            Ok(Transition::Updated(script)) => {
                vec![Reply::text(format!("✏️ Script {} updated", script.code))]
            }
            Ok(Transition::Ignored) => Vec::new(),
            Err(e) => vec![error_reply(&e, Delivery::NewMessage)],
        }
    }

    fn reset_session(&self, id: &Identity) {
        if let Err(e) = self.sessions.reset(id) {
            tracing::error!(%e, caller = %id, "could not reset session");
        }
    }
}

const ADMIN_TITLE: &str = "🔧 Admin panel";
const SCRIPTS_TITLE: &str = "📜 Scripts:\nPick a script or an action:";
const HELP: &str = "Commands:\n/admin - admin panel\n/script - scripts\n/addadmin <id> - grant admin (owner)\n/deladmin <id> - revoke admin (owner)";

fn greeting(caller: &Caller, role: Role) -> Reply {
    if !role.is_admin() {
        return Reply::text("⛔️ Access closed. Links only.");
    }
    let rank = if role.is_owner() { "👑 Owner" } else { "🛠️ Admin" };
    let name = caller.display_name.as_deref().unwrap_or("friend");
    Reply::text(format!("❤️ Hello, {name}! ({rank})\nThis bot is private 💚"))
}

fn ensure_owner(role: Role) -> scriptbot_types::Result<()> {
    if !role.is_owner() {
        return Err(ScriptbotError::Forbidden {
            reason: "owner only".into(),
        });
    }
    Ok(())
}

/// Renders an error for the caller.
fn error_reply(err: &ScriptbotError, delivery: Delivery) -> Reply {
    let text = match err {
        ScriptbotError::NotFound { .. } => "⚠️ Script not found".to_string(),
        ScriptbotError::Forbidden { .. } => "⛔️ You are not allowed to do that.".to_string(),
        ScriptbotError::RateLimited { retry_after_secs } => {
            format!("⚠️ Too many requests. Try again in {retry_after_secs}s.")
        }
        ScriptbotError::InvalidInput { reason } => format!("⚠️ {reason}"),
        ScriptbotError::PersistenceFailure { .. } => {
            tracing::warn!(%err, "mutation not saved");
            "⚠️ Could not save the change. Please try again.".to_string()
        }
        ScriptbotError::CorruptState { .. }
        | ScriptbotError::ConfigError { .. }
        | ScriptbotError::InternalError { .. } => {
            tracing::error!(%err, "request failed");
            "⚠️ Something went wrong.".to_string()
        }
    };
    Reply {
        text,
        delivery,
        ..Reply::default()
    }
}
