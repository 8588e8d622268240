//! Integration tests for the script store.
//!
//! Deterministic: codes come from a scripted generator and persistence
//! goes through either a real temp-dir JSON file or an in-memory
//! backend that can be told to fail.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use scriptbot_storage::codes::{CodeGenerator, RandomCodes};
use scriptbot_storage::scripts::{ScriptBook, ScriptStore};
use scriptbot_storage::snapshot::{JsonFile, SnapshotStore};
use scriptbot_types::{
    Identity, PhotoRef, Result, Role, ScriptCode, ScriptContent, ScriptbotError,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

static COUNTER: AtomicU32 = AtomicU32::new(0);

/// Returns a unique temporary directory for each test.
fn temp_dir() -> PathBuf {
    let id = COUNTER.fetch_add(1, Ordering::SeqCst);
    let dir = std::env::temp_dir().join(format!(
        "scriptbot-store-test-{}-{}",
        std::process::id(),
        id,
    ));
    let _ = std::fs::remove_dir_all(&dir);
    let _ = std::fs::create_dir_all(&dir);
    dir
}

const OWNER: Identity = Identity::new(1);
const ADMIN_A: Identity = Identity::new(2);
const ADMIN_B: Identity = Identity::new(3);

/// Hands out the queued codes in order, then falls back to `ZZZZ<n>`.
struct ScriptedCodes {
    queue: Mutex<VecDeque<&'static str>>,
    fallback: AtomicU32,
}

impl ScriptedCodes {
    fn new(codes: &[&'static str]) -> Self {
        Self {
            queue: Mutex::new(codes.iter().copied().collect()),
            fallback: AtomicU32::new(0),
        }
    }
}

impl CodeGenerator for ScriptedCodes {
    fn generate(&self) -> ScriptCode {
        let next = self.queue.lock().ok().and_then(|mut q| q.pop_front());
        match next {
            Some(code) => ScriptCode::from(code),
            None => {
                let n = self.fallback.fetch_add(1, Ordering::SeqCst);
                ScriptCode::new(format!("ZZZZ{n}"))
            }
        }
    }
}

/// In-memory backend whose writes can be switched off.
#[derive(Clone, Default)]
struct MemoryBackend {
    saved: Arc<Mutex<Option<ScriptBook>>>,
    fail_writes: Arc<AtomicBool>,
}

impl SnapshotStore<ScriptBook> for MemoryBackend {
    fn load(&self) -> Result<Option<ScriptBook>> {
        Ok(self.saved.lock().ok().and_then(|s| s.clone()))
    }

    fn save(&self, value: &ScriptBook) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ScriptbotError::PersistenceFailure {
                reason: "disk full".into(),
            });
        }
        if let Ok(mut saved) = self.saved.lock() {
            *saved = Some(value.clone());
        }
        Ok(())
    }
}

fn memory_store(codes: &[&'static str]) -> (ScriptStore, MemoryBackend) {
    let backend = MemoryBackend::default();
    let store = ScriptStore::open(
        Box::new(backend.clone()),
        Box::new(ScriptedCodes::new(codes)),
        8,
    );
    (store, backend)
}

// ===========================================================================
// create / get
// ===========================================================================

#[test]
fn create_then_get_returns_content() -> Result<()> {
    let (store, _) = memory_store(&["AAAA1111"]);

    let created = store.create(ADMIN_A, ScriptContent::text("<b>hello</b>"))?;
    assert_eq!(created.code.as_str(), "AAAA1111");
    assert_eq!(created.creator, ADMIN_A);

    let fetched = store.get(&created.code)?;
    assert_eq!(fetched, created);
    assert_eq!(fetched.text, "<b>hello</b>");
    Ok(())
}

#[test]
fn create_with_photo_keeps_caption() -> Result<()> {
    let (store, _) = memory_store(&[]);
    let created = store.create(
        ADMIN_A,
        ScriptContent::photo(PhotoRef::new("file-42"), "caption"),
    )?;
    let fetched = store.get(&created.code)?;
    assert_eq!(fetched.photo, Some(PhotoRef::new("file-42")));
    assert_eq!(fetched.text, "caption");
    Ok(())
}

#[test]
fn get_unknown_is_not_found() {
    let (store, _) = memory_store(&[]);
    let result = store.get(&ScriptCode::from("nope"));
    assert!(matches!(result, Err(ScriptbotError::NotFound { .. })));
}

#[test]
fn empty_content_rejected() -> Result<()> {
    let (store, _) = memory_store(&[]);
    let result = store.create(ADMIN_A, ScriptContent::text("  "));
    assert!(matches!(result, Err(ScriptbotError::InvalidInput { .. })));
    assert_eq!(store.len()?, 0);
    Ok(())
}

#[test]
fn colliding_codes_are_regenerated() -> Result<()> {
    let (store, _) = memory_store(&["DUPDUP01", "DUPDUP01", "DUPDUP01", "FRESH002"]);

    let first = store.create(ADMIN_A, ScriptContent::text("one"))?;
    let second = store.create(ADMIN_A, ScriptContent::text("two"))?;

    assert_eq!(first.code.as_str(), "DUPDUP01");
    assert_eq!(second.code.as_str(), "FRESH002");
    assert_eq!(store.get(&first.code)?.text, "one");
    assert_eq!(store.get(&second.code)?.text, "two");
    Ok(())
}

#[test]
fn exhausted_code_attempts_is_an_error() -> Result<()> {
    let backend = MemoryBackend::default();
    let store = ScriptStore::open(
        Box::new(backend),
        Box::new(ScriptedCodes::new(&["SAME0001", "SAME0001", "SAME0001"])),
        2,
    );

    store.create(ADMIN_A, ScriptContent::text("one"))?;
    let result = store.create(ADMIN_A, ScriptContent::text("two"));
    assert!(matches!(result, Err(ScriptbotError::InternalError { .. })));
    assert_eq!(store.len()?, 1);
    Ok(())
}

#[test]
fn deleted_codes_are_never_reissued() -> Result<()> {
    let (store, _) = memory_store(&["GONE0001", "GONE0001", "NEW00002"]);

    let doomed = store.create(ADMIN_A, ScriptContent::text("old"))?;
    store.delete(&doomed.code, Role::Owner)?;

    let next = store.create(ADMIN_A, ScriptContent::text("new"))?;
    assert_eq!(next.code.as_str(), "NEW00002");
    assert!(store.get(&doomed.code).is_err());
    Ok(())
}

#[test]
fn random_codes_stay_unique() -> Result<()> {
    let backend = MemoryBackend::default();
    let store = ScriptStore::open(Box::new(backend), Box::new(RandomCodes::new(8)), 32);

    for i in 0..200 {
        store.create(ADMIN_A, ScriptContent::text(format!("script {i}")))?;
    }

    let scripts = store.list()?;
    let codes: std::collections::HashSet<_> = scripts.iter().map(|s| s.code.clone()).collect();
    assert_eq!(codes.len(), scripts.len());
    Ok(())
}

// ===========================================================================
// update / delete authorization
// ===========================================================================

#[test]
fn creator_can_update_own_script() -> Result<()> {
    let (store, _) = memory_store(&[]);
    let script = store.create(ADMIN_A, ScriptContent::text("v1"))?;

    let updated = store.update(&script.code, &ADMIN_A, Role::Admin, ScriptContent::text("v2"))?;
    assert_eq!(updated.text, "v2");
    assert_eq!(updated.creator, ADMIN_A);
    assert_eq!(store.get(&script.code)?.text, "v2");
    Ok(())
}

#[test]
fn owner_can_update_any_script() -> Result<()> {
    let (store, _) = memory_store(&[]);
    let script = store.create(ADMIN_A, ScriptContent::text("v1"))?;

    store.update(
        &script.code,
        &OWNER,
        Role::Owner,
        ScriptContent::photo(PhotoRef::new("p"), ""),
    )?;
    let fetched = store.get(&script.code)?;
    assert_eq!(fetched.photo, Some(PhotoRef::new("p")));
    assert_eq!(fetched.creator, ADMIN_A, "creator is immutable");
    Ok(())
}

#[test]
fn other_admin_cannot_update() -> Result<()> {
    let (store, _) = memory_store(&[]);
    let script = store.create(ADMIN_A, ScriptContent::text("v1"))?;

    let result = store.update(&script.code, &ADMIN_B, Role::Admin, ScriptContent::text("hijack"));
    assert!(matches!(result, Err(ScriptbotError::Forbidden { .. })));
    assert_eq!(store.get(&script.code)?.text, "v1");
    Ok(())
}

#[test]
fn update_unknown_is_not_found() {
    let (store, _) = memory_store(&[]);
    let result = store.update(
        &ScriptCode::from("missing"),
        &OWNER,
        Role::Owner,
        ScriptContent::text("x"),
    );
    assert!(matches!(result, Err(ScriptbotError::NotFound { .. })));
}

#[test]
fn only_owner_deletes() -> Result<()> {
    let (store, _) = memory_store(&[]);
    let mine = store.create(ADMIN_A, ScriptContent::text("a"))?;

    let result = store.delete(&mine.code, Role::Admin);
    assert!(matches!(result, Err(ScriptbotError::Forbidden { .. })));
    assert!(store.get(&mine.code).is_ok());

    store.delete(&mine.code, Role::Owner)?;
    assert!(matches!(
        store.get(&mine.code),
        Err(ScriptbotError::NotFound { .. })
    ));
    Ok(())
}

#[test]
fn list_keeps_insertion_order() -> Result<()> {
    let (store, _) = memory_store(&["C0000001", "A0000002", "B0000003"]);
    store.create(ADMIN_A, ScriptContent::text("1"))?;
    store.create(ADMIN_B, ScriptContent::text("2"))?;
    store.create(ADMIN_A, ScriptContent::text("3"))?;

    let codes: Vec<String> = store
        .list()?
        .into_iter()
        .map(|s| s.code.as_str().to_string())
        .collect();
    assert_eq!(codes, vec!["C0000001", "A0000002", "B0000003"]);
    Ok(())
}

// ===========================================================================
// Persistence
// ===========================================================================

#[test]
fn failed_write_leaves_store_unchanged() -> Result<()> {
    let (store, backend) = memory_store(&["KEEP0001", "LOST0002"]);
    let kept = store.create(ADMIN_A, ScriptContent::text("kept"))?;

    backend.fail_writes.store(true, Ordering::SeqCst);

    let created = store.create(ADMIN_A, ScriptContent::text("lost"));
    assert!(matches!(created, Err(ScriptbotError::PersistenceFailure { .. })));
    assert!(store.get(&ScriptCode::from("LOST0002")).is_err());

    let updated = store.update(&kept.code, &ADMIN_A, Role::Admin, ScriptContent::text("new"));
    assert!(updated.is_err());
    assert_eq!(store.get(&kept.code)?.text, "kept");

    let deleted = store.delete(&kept.code, Role::Owner);
    assert!(deleted.is_err());
    assert!(store.get(&kept.code).is_ok());
    Ok(())
}

#[test]
fn json_file_survives_reopen() -> Result<()> {
    let dir = temp_dir();
    let path = dir.join("scripts.json");

    let code = {
        let store = ScriptStore::open(
            Box::new(JsonFile::<ScriptBook>::new(&path)),
            Box::new(RandomCodes::new(8)),
            32,
        );
        store.create(ADMIN_A, ScriptContent::text("persisted"))?.code
    };

    let reopened = ScriptStore::open(
        Box::new(JsonFile::<ScriptBook>::new(&path)),
        Box::new(RandomCodes::new(8)),
        32,
    );
    assert_eq!(reopened.get(&code)?.text, "persisted");
    Ok(())
}

#[test]
fn missing_file_is_provisioned_empty() -> Result<()> {
    let dir = temp_dir();
    let path = dir.join("scripts.json");

    let store = ScriptStore::open(
        Box::new(JsonFile::<ScriptBook>::new(&path)),
        Box::new(RandomCodes::new(8)),
        32,
    );
    assert!(store.is_empty()?);
    assert!(path.exists());
    Ok(())
}

#[test]
fn corrupt_file_starts_empty_and_is_kept_aside() -> Result<()> {
    let dir = temp_dir();
    let path = dir.join("scripts.json");
    let _ = std::fs::write(&path, b"[[[ not json");

    let store = ScriptStore::open(
        Box::new(JsonFile::<ScriptBook>::new(&path)),
        Box::new(RandomCodes::new(8)),
        32,
    );
    assert!(store.is_empty()?);

    let quarantined = std::fs::read_dir(&dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .any(|e| e.file_name().to_string_lossy().contains(".corrupt-"))
        })
        .unwrap_or(false);
    assert!(quarantined, "corrupt snapshot should be preserved");
    Ok(())
}

#[test]
fn legacy_file_without_retired_loads() -> Result<()> {
    let dir = temp_dir();
    let path = dir.join("scripts.json");
    let _ = std::fs::write(
        &path,
        br#"{"scripts":[{"id":"Legacy01","text":"hi","photo":null,"creator_id":5}]}"#,
    );

    let store = ScriptStore::open(
        Box::new(JsonFile::<ScriptBook>::new(&path)),
        Box::new(RandomCodes::new(8)),
        32,
    );
    let script = store.get(&ScriptCode::from("Legacy01"))?;
    assert_eq!(script.creator, Identity::new(5));
    Ok(())
}
