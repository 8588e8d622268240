//! Keyed, insertion-ordered script collection.
//!
//! All mutating operations acquire the internal lock, build the next
//! state, persist it, and only then swap it in. A failed write is
//! returned as [`ScriptbotError::PersistenceFailure`] and leaves the
//! in-memory collection untouched, so a reader never sees a script
//! that is not on disk.
//!
//! Codes are unique for the lifetime of the store: codes of deleted
//! scripts are retired and never handed out again, so old deep links
//! cannot start pointing at new content.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use scriptbot_types::{
    Identity, Result, Role, Script, ScriptCode, ScriptContent, ScriptbotError,
};
use serde::{Deserialize, Serialize};

use crate::codes::CodeGenerator;
use crate::snapshot::SnapshotStore;

// ---------------------------------------------------------------------------
// ScriptBook
// ---------------------------------------------------------------------------

/// Persisted form of the collection (`scripts.json`).
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ScriptBook {
    /// Live scripts in insertion order.
    #[serde(default)]
    pub scripts: Vec<Script>,
    /// Codes of deleted scripts.
    #[serde(default)]
    pub retired: Vec<ScriptCode>,
}

impl ScriptBook {
    fn position(&self, code: &ScriptCode) -> Option<usize> {
        self.scripts.iter().position(|s| &s.code == code)
    }

    fn is_taken(&self, code: &ScriptCode) -> bool {
        self.position(code).is_some() || self.retired.contains(code)
    }

    /// Keeps the first script for each code. Returns how many were dropped.
    fn dedupe(&mut self) -> usize {
        let before = self.scripts.len();
        let mut seen = HashSet::new();
        self.scripts.retain(|s| seen.insert(s.code.clone()));
        before - self.scripts.len()
    }
}

// ---------------------------------------------------------------------------
// ScriptStore
// ---------------------------------------------------------------------------

/// Thread-safe script collection with snapshot persistence.
pub struct ScriptStore {
    inner: Mutex<ScriptBook>,
    backend: Box<dyn SnapshotStore<ScriptBook>>,
    codes: Box<dyn CodeGenerator>,
    code_attempts: u32,
}

impl ScriptStore {
    /// Loads the collection from `backend`.
    ///
    /// A missing snapshot yields an empty collection, which is written
    /// back best-effort. An unreadable snapshot is quarantined and also
    /// replaced by an empty collection. Neither case is an error.
    pub fn open(
        backend: Box<dyn SnapshotStore<ScriptBook>>,
        codes: Box<dyn CodeGenerator>,
        code_attempts: u32,
    ) -> Self {
        let book = match backend.load() {
            Ok(Some(mut book)) => {
                let dropped = book.dedupe();
                if dropped > 0 {
                    tracing::warn!(dropped, "script store contained duplicate codes");
                }
                tracing::info!(scripts = book.scripts.len(), "script store loaded");
                book
            }
            Ok(None) => {
                let book = ScriptBook::default();
                if let Err(e) = backend.save(&book) {
                    tracing::warn!(%e, "could not provision empty script store");
                }
                book
            }
            Err(e) => {
                tracing::error!(%e, "script store unreadable, starting empty");
                match backend.quarantine() {
                    Ok(Some(moved)) => tracing::warn!(%moved, "unreadable script store moved aside"),
                    Ok(None) => {}
                    Err(e) => tracing::warn!(%e, "could not quarantine script store"),
                }
                ScriptBook::default()
            }
        };

        Self {
            inner: Mutex::new(book),
            backend,
            codes,
            code_attempts,
        }
    }

    /// Creates a script owned by `creator` under a fresh unique code.
    ///
    /// # Errors
    ///
    /// - [`ScriptbotError::InvalidInput`] if `content` is empty.
    /// - [`ScriptbotError::InternalError`] if no unused code was found
    ///   within the configured number of attempts.
    /// - [`ScriptbotError::PersistenceFailure`] if the write failed.
    pub fn create(&self, creator: Identity, content: ScriptContent) -> Result<Script> {
        ensure_content(&content)?;

        let mut book = self.lock_book()?;
        let code = self.fresh_code(&book)?;

        let script = Script {
            code,
            text: content.text,
            photo: content.photo,
            creator,
        };

        let mut next = book.clone();
        next.scripts.push(script.clone());
        self.commit(&mut book, next)?;

        tracing::info!(code = %script.code, %creator, "script created");
        Ok(script)
    }

    /// Looks up a script by code.
    pub fn get(&self, code: &ScriptCode) -> Result<Script> {
        let book = self.lock_book()?;
        book.position(code)
            .map(|idx| book.scripts[idx].clone())
            .ok_or_else(|| not_found(code))
    }

    /// Replaces the text and photo of a script.
    ///
    /// Allowed for the owner and for the script's creator.
    pub fn update(
        &self,
        code: &ScriptCode,
        requester: &Identity,
        role: Role,
        content: ScriptContent,
    ) -> Result<Script> {
        let mut book = self.lock_book()?;
        let idx = book.position(code).ok_or_else(|| not_found(code))?;

        if !may_edit(&book.scripts[idx], requester, role) {
            return Err(ScriptbotError::Forbidden {
                reason: format!("{requester} may not edit script {code}"),
            });
        }
        ensure_content(&content)?;

        let mut next = book.clone();
        let script = &mut next.scripts[idx];
        script.text = content.text;
        script.photo = content.photo;
        let updated = script.clone();

        self.commit(&mut book, next)?;

        tracing::info!(%code, %requester, "script updated");
        Ok(updated)
    }

    /// Removes a script and retires its code. Owner only.
    pub fn delete(&self, code: &ScriptCode, role: Role) -> Result<Script> {
        let mut book = self.lock_book()?;
        let idx = book.position(code).ok_or_else(|| not_found(code))?;

        if !role.is_owner() {
            return Err(ScriptbotError::Forbidden {
                reason: format!("only the owner may delete script {code}"),
            });
        }

        let mut next = book.clone();
        let removed = next.scripts.remove(idx);
        next.retired.push(removed.code.clone());

        self.commit(&mut book, next)?;

        tracing::info!(%code, "script deleted");
        Ok(removed)
    }

    /// Returns all scripts in insertion order.
    pub fn list(&self) -> Result<Vec<Script>> {
        Ok(self.lock_book()?.scripts.clone())
    }

    /// Returns the number of live scripts.
    pub fn len(&self) -> Result<usize> {
        Ok(self.lock_book()?.scripts.len())
    }

    /// Returns `true` if there are no live scripts.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    // -- Internal ---------------------------------------------------------

    fn lock_book(&self) -> Result<MutexGuard<'_, ScriptBook>> {
        self.inner.lock().map_err(|e| ScriptbotError::InternalError {
            reason: format!("script store lock poisoned: {e}"),
        })
    }

    /// Persists `next` and, only if that succeeds, makes it current.
    fn commit(&self, book: &mut MutexGuard<'_, ScriptBook>, next: ScriptBook) -> Result<()> {
        self.backend.save(&next)?;
        **book = next;
        Ok(())
    }

    fn fresh_code(&self, book: &ScriptBook) -> Result<ScriptCode> {
        for attempt in 1..=self.code_attempts {
            let candidate = self.codes.generate();
            if !book.is_taken(&candidate) {
                return Ok(candidate);
            }
            tracing::debug!(attempt, code = %candidate, "generated code already taken");
        }

        Err(ScriptbotError::InternalError {
            reason: format!(
                "no unused script code after {} attempts",
                self.code_attempts
            ),
        })
    }
}

/// Returns `true` if `requester` may change `script`.
pub fn may_edit(script: &Script, requester: &Identity, role: Role) -> bool {
    role.is_owner() || script.creator == *requester
}

fn ensure_content(content: &ScriptContent) -> Result<()> {
    if content.is_empty() {
        return Err(ScriptbotError::InvalidInput {
            reason: "script needs text or a photo".into(),
        });
    }
    Ok(())
}

fn not_found(code: &ScriptCode) -> ScriptbotError {
    ScriptbotError::NotFound { code: code.clone() }
}
