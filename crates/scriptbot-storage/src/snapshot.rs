//! Whole-value snapshot persistence.
//!
//! A [`SnapshotStore`] holds exactly one serialized value. [`JsonFile`]
//! is the production backend: a single pretty-printed JSON file written
//! atomically (serialize → write tmp → fsync → rename), so a crash
//! mid-write leaves the previous snapshot intact.

use std::fs;
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use scriptbot_types::{Result, ScriptbotError};
use serde::de::DeserializeOwned;
use serde::Serialize;

// ---------------------------------------------------------------------------
// SnapshotStore
// ---------------------------------------------------------------------------

/// Durable home for a single value of type `T`.
pub trait SnapshotStore<T>: Send + Sync {
    /// Reads the stored value.
    ///
    /// Returns `Ok(None)` if nothing has been stored yet and
    /// [`ScriptbotError::CorruptState`] if the stored bytes cannot be
    /// read or decoded.
    fn load(&self) -> Result<Option<T>>;

    /// Replaces the stored value.
    ///
    /// Returns [`ScriptbotError::PersistenceFailure`] if the write did
    /// not complete; the previous value is then still in place.
    fn save(&self, value: &T) -> Result<()>;

    /// Moves an unreadable snapshot aside so the next `save` does not
    /// destroy it. Returns a description of where it went, if anywhere.
    fn quarantine(&self) -> Result<Option<String>> {
        Ok(None)
    }
}

// ---------------------------------------------------------------------------
// JsonFile
// ---------------------------------------------------------------------------

/// JSON file snapshot backend.
pub struct JsonFile<T> {
    path: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonFile<T> {
    /// Creates a backend for the file at `path`. The file need not exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _marker: PhantomData,
        }
    }

    /// Returns the file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Temporary file in the same directory as the target.
    fn tmp_path(&self) -> Result<PathBuf> {
        let parent = self.parent_dir();

        if !parent.exists() {
            fs::create_dir_all(&parent).map_err(|e| ScriptbotError::PersistenceFailure {
                reason: format!("failed to create directory {}: {e}", parent.display()),
            })?;
        }

        let file_name = self
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("snapshot.json");

        Ok(parent.join(format!(".{file_name}.tmp")))
    }

    fn parent_dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }
}

impl<T> SnapshotStore<T> for JsonFile<T>
where
    T: Serialize + DeserializeOwned,
{
    fn load(&self) -> Result<Option<T>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let raw = fs::read(&self.path).map_err(|e| ScriptbotError::CorruptState {
            reason: format!("failed to read {}: {e}", self.path.display()),
        })?;

        // Empty file is treated as never written.
        if raw.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(None);
        }

        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|e| ScriptbotError::CorruptState {
                reason: format!("failed to decode {}: {e}", self.path.display()),
            })
    }

    fn save(&self, value: &T) -> Result<()> {
        let mut bytes =
            serde_json::to_vec_pretty(value).map_err(|e| ScriptbotError::PersistenceFailure {
                reason: format!("failed to serialize snapshot: {e}"),
            })?;
        bytes.push(b'\n');

        let tmp_path = self.tmp_path()?;

        {
            let mut file =
                fs::File::create(&tmp_path).map_err(|e| ScriptbotError::PersistenceFailure {
                    reason: format!("failed to create {}: {e}", tmp_path.display()),
                })?;

            file.write_all(&bytes)
                .map_err(|e| ScriptbotError::PersistenceFailure {
                    reason: format!("failed to write {}: {e}", tmp_path.display()),
                })?;

            file.sync_all()
                .map_err(|e| ScriptbotError::PersistenceFailure {
                    reason: format!("failed to fsync {}: {e}", tmp_path.display()),
                })?;
        }

        fs::rename(&tmp_path, &self.path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            ScriptbotError::PersistenceFailure {
                reason: format!("failed to replace {}: {e}", self.path.display()),
            }
        })
    }

    fn quarantine(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let file_name = self
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("snapshot.json");
        let target = self.parent_dir().join(format!("{file_name}.corrupt-{stamp}"));

        fs::rename(&self.path, &target).map_err(|e| ScriptbotError::PersistenceFailure {
            reason: format!("failed to quarantine {}: {e}", self.path.display()),
        })?;

        Ok(Some(target.display().to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicU32, Ordering};

    static COUNTER: AtomicU32 = AtomicU32::new(0);

    fn temp_dir() -> PathBuf {
        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let dir = std::env::temp_dir().join(format!(
            "scriptbot-snapshot-test-{}-{}",
            std::process::id(),
            id,
        ));
        let _ = fs::remove_dir_all(&dir);
        let _ = fs::create_dir_all(&dir);
        dir
    }

    type Map = BTreeMap<String, u32>;

    #[test]
    fn missing_file_loads_none() -> Result<()> {
        let dir = temp_dir();
        let store: JsonFile<Map> = JsonFile::new(dir.join("absent.json"));
        assert!(store.load()?.is_none());
        Ok(())
    }

    #[test]
    fn save_then_load() -> Result<()> {
        let dir = temp_dir();
        let store: JsonFile<Map> = JsonFile::new(dir.join("data.json"));

        let mut value = Map::new();
        value.insert("a".into(), 1);
        store.save(&value)?;

        assert_eq!(store.load()?, Some(value));
        assert!(!dir.join(".data.json.tmp").exists(), "tmp file must be renamed away");
        Ok(())
    }

    #[test]
    fn save_creates_missing_parent() -> Result<()> {
        let dir = temp_dir();
        let store: JsonFile<Map> = JsonFile::new(dir.join("nested").join("data.json"));
        store.save(&Map::new())?;
        assert!(store.path().exists());
        Ok(())
    }

    #[test]
    fn garbage_is_corrupt_state() {
        let dir = temp_dir();
        let path = dir.join("bad.json");
        let _ = fs::write(&path, b"{not json");

        let store: JsonFile<Map> = JsonFile::new(&path);
        assert!(matches!(store.load(), Err(ScriptbotError::CorruptState { .. })));
    }

    #[test]
    fn blank_file_loads_none() -> Result<()> {
        let dir = temp_dir();
        let path = dir.join("blank.json");
        let _ = fs::write(&path, b"  \n");

        let store: JsonFile<Map> = JsonFile::new(&path);
        assert!(store.load()?.is_none());
        Ok(())
    }

    #[test]
    fn quarantine_moves_file_aside() -> Result<()> {
        let dir = temp_dir();
        let path = dir.join("bad.json");
        let _ = fs::write(&path, b"{not json");

        let store: JsonFile<Map> = JsonFile::new(&path);
        let moved = store.quarantine()?;

        assert!(moved.is_some());
        assert!(!path.exists());
        assert!(store.load()?.is_none());
        Ok(())
    }

    #[test]
    fn save_onto_directory_fails() {
        let dir = temp_dir();
        let target = dir.join("occupied");
        let _ = fs::create_dir_all(target.join("child"));

        let store: JsonFile<Map> = JsonFile::new(&target);
        assert!(matches!(
            store.save(&Map::new()),
            Err(ScriptbotError::PersistenceFailure { .. })
        ));
    }
}
