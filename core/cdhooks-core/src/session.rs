//! Per-shell session state and the reentrancy guard.
//!
//! A shell session is identified by the shell's PID. Its state survives across
//! `cdhooks` invocations in `~/.cdhooks/sessions/<id>.json`:
//!
//! ```json
//! {
//!   "version": 1,
//!   "last_location": "/home/u/src",
//!   "guard": { "state": "running", "owner_pid": 4242, "started_at": "..." },
//!   "dir_stack": [],
//!   "exited": false,
//!   "updated_at": "..."
//! }
//! ```
//!
//! # Reentrancy Guard
//!
//! ```text
//! Idle ──begin──▶ Running ──end──▶ Idle
//!                    │
//!                    └─begin─▶ (duplicate trigger, ignored)
//! ```
//!
//! A `Running` marker whose owner process is gone is stale (the owner crashed
//! mid-transition) and is taken over instead of blocking the session forever.
//!
//! # Defensive Loading
//!
//! Empty, corrupt, or version-mismatched files load as a fresh idle session.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::warn;

use crate::error::{CdhooksError, Result};
use crate::hooks::HookQueue;
use crate::path_stack::AbsolutePath;
use crate::storage::StorageConfig;

const SESSION_FILE_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum GuardState {
    Idle,
    Running {
        owner_pid: u32,
        started_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub version: u32,
    #[serde(default)]
    pub last_location: Option<AbsolutePath>,
    pub guard: GuardState,
    /// Directories saved by `pushd`, most recent last.
    #[serde(default)]
    pub dir_stack: Vec<AbsolutePath>,
    #[serde(default)]
    pub exited: bool,
    pub updated_at: DateTime<Utc>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            version: SESSION_FILE_VERSION,
            last_location: None,
            guard: GuardState::Idle,
            dir_stack: Vec::new(),
            exited: false,
            updated_at: Utc::now(),
        }
    }
}

impl SessionState {
    pub fn is_running(&self) -> bool {
        matches!(self.guard, GuardState::Running { .. })
    }

    /// Moves to `Running` unless a live transition already holds the session.
    ///
    /// Returns `false` for a duplicate trigger; nothing is modified then.
    pub fn begin_transition(&mut self, owner_pid: u32) -> bool {
        if let GuardState::Running {
            owner_pid: holder, ..
        } = self.guard
        {
            if holder == owner_pid || is_pid_alive(holder) {
                return false;
            }
            warn!(holder, "Taking over stale running marker");
        }
        self.guard = GuardState::Running {
            owner_pid,
            started_at: Utc::now(),
        };
        self.updated_at = Utc::now();
        true
    }

    pub fn end_transition(&mut self) {
        self.guard = GuardState::Idle;
        self.updated_at = Utc::now();
    }
}

/// Session-variable snapshot/restore. Required by the engine.
pub trait SessionStore {
    fn load(&self, session_id: &str) -> Result<SessionState>;
    fn save(&self, session_id: &str, state: &SessionState) -> Result<()>;
    fn remove(&self, session_id: &str) -> Result<()>;
}

/// JSON file per session under `sessions/`.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    storage: StorageConfig,
}

impl FileSessionStore {
    pub fn new(storage: StorageConfig) -> Self {
        Self { storage }
    }

    fn path(&self, session_id: &str) -> PathBuf {
        self.storage.session_file(session_id)
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self, session_id: &str) -> Result<SessionState> {
        let path = self.path(session_id);
        if !path.exists() {
            return Ok(SessionState::default());
        }

        let content = fs_err::read_to_string(&path)
            .map_err(|e| CdhooksError::io("reading session file", e))?;

        if content.trim().is_empty() {
            warn!(path = %path.display(), "Empty session file, starting fresh");
            return Ok(SessionState::default());
        }

        match serde_json::from_str::<SessionState>(&content) {
            Ok(state) if state.version == SESSION_FILE_VERSION => Ok(state),
            Ok(state) => {
                warn!(
                    version = state.version,
                    expected = SESSION_FILE_VERSION,
                    "Unsupported session file version, starting fresh"
                );
                Ok(SessionState::default())
            }
            Err(e) => {
                warn!(error = %e, path = %path.display(), "Corrupt session file, starting fresh");
                Ok(SessionState::default())
            }
        }
    }

    fn save(&self, session_id: &str, state: &SessionState) -> Result<()> {
        let path = self.path(session_id);
        let parent = self.storage.sessions_dir();
        fs_err::create_dir_all(&parent)
            .map_err(|e| CdhooksError::io("creating sessions dir", e))?;

        let content = serde_json::to_string_pretty(state).map_err(|e| CdhooksError::Json {
            context: "serializing session".to_string(),
            source: e,
        })?;

        let mut temp_file =
            NamedTempFile::new_in(&parent).map_err(|e| CdhooksError::io("session temp file", e))?;
        temp_file
            .write_all(content.as_bytes())
            .map_err(|e| CdhooksError::io("writing session file", e))?;
        temp_file
            .persist(&path)
            .map_err(|e| CdhooksError::io("persisting session file", e.error))?;
        Ok(())
    }

    fn remove(&self, session_id: &str) -> Result<()> {
        match fs_err::remove_file(self.path(session_id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CdhooksError::io("removing session file", e)),
        }
    }
}

/// Process-local store for embedding and tests.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RefCell<HashMap<String, SessionState>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for InMemorySessionStore {
    fn load(&self, session_id: &str) -> Result<SessionState> {
        Ok(self
            .sessions
            .borrow()
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }

    fn save(&self, session_id: &str, state: &SessionState) -> Result<()> {
        self.sessions
            .borrow_mut()
            .insert(session_id.to_string(), state.clone());
        Ok(())
    }

    fn remove(&self, session_id: &str) -> Result<()> {
        self.sessions.borrow_mut().remove(session_id);
        Ok(())
    }
}

/// Everything a transition mutates, threaded explicitly through each call.
#[derive(Debug)]
pub struct SessionContext {
    pub id: String,
    pub state: SessionState,
    pub hooks: HookQueue,
}

impl SessionContext {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: SessionState::default(),
            hooks: HookQueue::new(),
        }
    }

    pub fn load(store: &dyn SessionStore, id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        let state = store.load(&id)?;
        Ok(Self {
            id,
            state,
            hooks: HookQueue::new(),
        })
    }
}

pub fn is_pid_alive(pid: u32) -> bool {
    #[cfg(unix)]
    {
        // SAFETY: kill with signal 0 performs only a permission/existence check.
        unsafe { libc::kill(pid as i32, 0) == 0 }
    }
    #[cfg(not(unix))]
    {
        let _ = pid;
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn begin_then_duplicate_begin_is_refused() {
        let mut state = SessionState::default();
        let pid = std::process::id();
        assert!(state.begin_transition(pid));
        assert!(!state.begin_transition(pid));
        state.end_transition();
        assert!(state.begin_transition(pid));
    }

    #[test]
    fn live_foreign_owner_blocks() {
        let mut state = SessionState::default();
        // The parent of the test process is alive for the duration of the test.
        let parent = unsafe { libc::getppid() } as u32;
        assert!(state.begin_transition(parent));
        assert!(!state.begin_transition(std::process::id()));
    }

    #[test]
    fn dead_owner_is_taken_over() {
        let mut state = SessionState {
            guard: GuardState::Running {
                owner_pid: i32::MAX as u32,
                started_at: Utc::now(),
            },
            ..SessionState::default()
        };
        assert!(state.begin_transition(std::process::id()));
        assert!(matches!(
            state.guard,
            GuardState::Running { owner_pid, .. } if owner_pid == std::process::id()
        ));
    }

    #[test]
    fn file_store_round_trip() {
        let temp = tempdir().unwrap();
        let store = FileSessionStore::new(StorageConfig::with_root(temp.path().to_path_buf()));

        let mut state = SessionState::default();
        state.last_location = Some(AbsolutePath::parse("/a/b").unwrap());
        store.save("42", &state).unwrap();

        let loaded = store.load("42").unwrap();
        assert_eq!(loaded.last_location, state.last_location);
        assert_eq!(loaded.guard, GuardState::Idle);

        store.remove("42").unwrap();
        assert_eq!(store.load("42").unwrap().last_location, None);
        store.remove("42").unwrap();
    }

    #[test]
    fn corrupt_file_loads_fresh() {
        let temp = tempdir().unwrap();
        let storage = StorageConfig::with_root(temp.path().to_path_buf());
        std::fs::create_dir_all(storage.sessions_dir()).unwrap();
        std::fs::write(storage.session_file("7"), "{not json").unwrap();

        let store = FileSessionStore::new(storage);
        assert_eq!(store.load("7").unwrap().guard, GuardState::Idle);
    }

    #[test]
    fn empty_file_loads_fresh() {
        let temp = tempdir().unwrap();
        let storage = StorageConfig::with_root(temp.path().to_path_buf());
        std::fs::create_dir_all(storage.sessions_dir()).unwrap();
        std::fs::write(storage.session_file("8"), "  \n").unwrap();

        let store = FileSessionStore::new(storage);
        assert!(store.load("8").unwrap().last_location.is_none());
    }

    #[test]
    fn version_mismatch_loads_fresh() {
        let temp = tempdir().unwrap();
        let storage = StorageConfig::with_root(temp.path().to_path_buf());
        let store = FileSessionStore::new(storage.clone());

        let mut state = SessionState::default();
        state.version = 99;
        state.last_location = Some(AbsolutePath::parse("/x").unwrap());
        store.save("9", &state).unwrap();

        assert!(store.load("9").unwrap().last_location.is_none());
    }

    #[test]
    fn in_memory_store_defaults_to_idle() {
        let store = InMemorySessionStore::new();
        let ctx = SessionContext::load(&store, "1").unwrap();
        assert!(!ctx.state.is_running());
        assert!(ctx.hooks.is_empty());
    }
}
