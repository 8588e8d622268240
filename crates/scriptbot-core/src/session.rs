//! Per-identity interaction state machine.
//!
//! ```text
//!   Idle --add script (admin)--------------> AwaitingNewScript
//!   Idle --edit X (owner or creator)-------> AwaitingEditScript(X)
//!   AwaitingNewScript --content (create)---> Idle
//!   AwaitingEditScript(X) --content (update X)--> Idle
//! ```
//!
//! Authorization is checked again when content is consumed, since roles
//! and scripts can change while a session waits. Empty content and
//! persistence failures keep the awaiting mode so the operator can
//! resend; losing authority or the target script resets to `Idle`.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use scriptbot_storage::scripts::{may_edit, ScriptStore};
use scriptbot_types::{Identity, Result, Role, Script, ScriptCode, ScriptContent, ScriptbotError};

/// What a session is waiting for.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum SessionMode {
    /// Not waiting for content.
    #[default]
    Idle,
    /// The next content becomes a new script.
    AwaitingNewScript,
    /// The next content replaces the given script.
    AwaitingEditScript(ScriptCode),
}

/// Result of feeding content to a session.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Transition {
    /// A script was created.
    Created(Script),
    /// A script was updated.
    Updated(Script),
    /// The session was idle; nothing happened.
    Ignored,
}

/// Session table keyed by identity. Idle sessions are not stored.
#[derive(Default)]
pub struct Sessions {
    modes: Mutex<HashMap<Identity, SessionMode>>,
}

impl Sessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current mode of `id`.
    pub fn mode(&self, id: &Identity) -> Result<SessionMode> {
        Ok(self.lock()?.get(id).cloned().unwrap_or_default())
    }

    /// Returns `id` to `Idle`.
    pub fn reset(&self, id: &Identity) -> Result<()> {
        self.lock()?.remove(id);
        Ok(())
    }

    /// Starts the add-script flow.
    pub fn begin_new_script(&self, id: Identity, role: Role) -> Result<()> {
        if !role.is_admin() {
            return Err(ScriptbotError::Forbidden {
                reason: "only admins may add scripts".into(),
            });
        }
        self.set(id, SessionMode::AwaitingNewScript)
    }

    /// Starts the edit flow for `code`. The mode is unchanged on error.
    pub fn begin_edit(
        &self,
        id: Identity,
        role: Role,
        code: ScriptCode,
        store: &ScriptStore,
    ) -> Result<Script> {
        let script = store.get(&code)?;
        if !role.is_admin() || !may_edit(&script, &id, role) {
            return Err(ScriptbotError::Forbidden {
                reason: format!("{id} may not edit script {code}"),
            });
        }
        self.set(id, SessionMode::AwaitingEditScript(code))?;
        Ok(script)
    }

    /// Consumes `content` according to the current mode of `id`.
    ///
    /// `role` is the caller's role at the time of consumption.
    pub fn submit_content(
        &self,
        id: Identity,
        role: Role,
        content: ScriptContent,
        store: &ScriptStore,
    ) -> Result<Transition> {
        match self.mode(&id)? {
            SessionMode::Idle => Ok(Transition::Ignored),
            SessionMode::AwaitingNewScript => {
                if !role.is_admin() {
                    self.reset(&id)?;
                    return Err(ScriptbotError::Forbidden {
                        reason: "admin rights were revoked".into(),
                    });
                }
                let script = store.create(id, content)?;
                self.reset(&id)?;
                Ok(Transition::Created(script))
            }
            SessionMode::AwaitingEditScript(code) => {
                if !role.is_admin() {
                    self.reset(&id)?;
                    return Err(ScriptbotError::Forbidden {
                        reason: "admin rights were revoked".into(),
                    });
                }
                match store.update(&code, &id, role, content) {
                    Ok(script) => {
                        self.reset(&id)?;
                        Ok(Transition::Updated(script))
                    }
                    Err(e @ (ScriptbotError::Forbidden { .. } | ScriptbotError::NotFound { .. })) => {
                        self.reset(&id)?;
                        Err(e)
                    }
                    Err(e) => Err(e),
                }
            }
        }
    }

    /// Number of sessions currently waiting for content.
    pub fn active(&self) -> usize {
        self.modes.lock().map(|m| m.len()).unwrap_or(0)
    }

    // -- Internal ---------------------------------------------------------

    fn set(&self, id: Identity, mode: SessionMode) -> Result<()> {
        let mut modes = self.lock()?;
        if mode == SessionMode::Idle {
            modes.remove(&id);
        } else {
            modes.insert(id, mode);
        }
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<Identity, SessionMode>>> {
        self.modes.lock().map_err(|_| ScriptbotError::InternalError {
            reason: "session table lock poisoned".into(),
        })
    }
}
