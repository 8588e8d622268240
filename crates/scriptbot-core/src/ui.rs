//! Transport-neutral replies and menus.

use scriptbot_types::{Identity, PhotoRef, Role, Script, ScriptCode};

use crate::action::CallbackAction;

/// How a reply reaches the caller.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Delivery {
    /// Sent as a new message.
    #[default]
    NewMessage,
    /// Replaces the message carrying the pressed button.
    EditMessage,
}

/// An inline button.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Button {
    pub label: String,
    pub action: CallbackAction,
}

impl Button {
    pub fn new(label: impl Into<String>, action: CallbackAction) -> Self {
        Self {
            label: label.into(),
            action,
        }
    }
}

/// Buttons laid out in rows.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    /// Appends a row holding a single button.
    pub fn push(&mut self, label: impl Into<String>, action: CallbackAction) {
        self.rows.push(vec![Button::new(label, action)]);
    }

    /// Iterates over all buttons, row by row.
    pub fn buttons(&self) -> impl Iterator<Item = &Button> {
        self.rows.iter().flatten()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// An outbound message.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Reply {
    /// Message text, or the caption when `photo` is set.
    pub text: String,
    pub photo: Option<PhotoRef>,
    pub keyboard: Option<Keyboard>,
    pub delivery: Delivery,
    /// `text` is HTML-formatted.
    pub html: bool,
}

impl Reply {
    /// Plain text sent as a new message.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Plain text replacing the pressed menu.
    pub fn edit(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            delivery: Delivery::EditMessage,
            ..Self::default()
        }
    }

    /// Attaches a keyboard.
    pub fn with_keyboard(mut self, keyboard: Keyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }

    /// Delivers a script to its reader.
    ///
    /// Text is sent as HTML. A script with a photo uses its text as the
    /// caption. Empty text is replaced by a single space since the
    /// transport refuses empty messages.
    pub fn script(script: &Script) -> Self {
        let text = if script.text.is_empty() {
            " ".to_string()
        } else {
            script.text.clone()
        };
        Self {
            text,
            photo: script.photo.clone(),
            html: true,
            ..Self::default()
        }
    }
}

/// Deep link that opens `code` in the bot with handle `handle`.
pub fn deep_link(handle: &str, code: &ScriptCode) -> String {
    format!("https://t.me/{}?start={}", handle.trim_start_matches('@'), code)
}

// ---------------------------------------------------------------------------
// Menus
// ---------------------------------------------------------------------------

/// Admin menu. Admin management buttons are shown to the owner only.
pub fn admin_menu(role: Role) -> Keyboard {
    let mut kb = Keyboard::default();
    if role.is_owner() {
        kb.push("➕ Add admin", CallbackAction::AddAdminHelp);
        kb.push("➖ Remove admin", CallbackAction::RemoveAdminHelp);
    }
    kb.push("📋 Admin list", CallbackAction::ListAdmins);
    kb.push("📜 Scripts", CallbackAction::ScriptPanel);
    kb
}

/// Script menu: one button per script, then the actions.
pub fn scripts_menu(role: Role, scripts: &[Script]) -> Keyboard {
    let mut kb = Keyboard::default();
    for script in scripts {
        kb.push(
            script.code.to_string(),
            CallbackAction::OpenScript(script.code.clone()),
        );
    }
    kb.push("➕ Add script", CallbackAction::AddScript);
    if role.is_owner() {
        kb.push("➖ Remove script", CallbackAction::RemoveScriptMenu);
    }
    kb.push("🔙 Back", CallbackAction::BackToAdmin);
    kb
}

/// Actions on one script, filtered by what `viewer` may do.
pub fn script_actions(viewer: &Identity, role: Role, script: &Script) -> Keyboard {
    let mut kb = Keyboard::default();
    kb.push("🔗 Link", CallbackAction::Link(script.code.clone()));
    if scriptbot_storage::scripts::may_edit(script, viewer, role) {
        kb.push("✏️ Edit", CallbackAction::Edit(script.code.clone()));
    }
    if role.is_owner() {
        kb.push("🗑 Delete", CallbackAction::Delete(script.code.clone()));
    }
    kb.push("🔙 Back", CallbackAction::ScriptPanel);
    kb
}

/// Every script as a delete button.
pub fn remove_menu(scripts: &[Script]) -> Keyboard {
    let mut kb = Keyboard::default();
    for script in scripts {
        kb.push(
            format!("🗑 {}", script.code),
            CallbackAction::Delete(script.code.clone()),
        );
    }
    kb.push("🔙 Back", CallbackAction::ScriptPanel);
    kb
}

/// A lone back button.
pub fn back_to(action: CallbackAction) -> Keyboard {
    let mut kb = Keyboard::default();
    kb.push("🔙 Back", action);
    kb
}
