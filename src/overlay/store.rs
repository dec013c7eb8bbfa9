use crate::overlay::codec;
use crate::overlay::model::PanelState;
use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

pub const STATE_FILE_NAME: &str = "overlay_state.txt";

/// Durable home of the single [`PanelState`] record.
///
/// `load` never fails: missing or corrupt data yields the default state.
/// `save` is only ever called from the repository's writer thread.
pub trait StateStore: Send + Sync {
    fn load(&self) -> PanelState;
    fn save(&self, state: &PanelState) -> Result<()>;
}

pub fn state_path_from_exe_path(exe_path: &Path) -> Result<PathBuf> {
    let parent = exe_path
        .parent()
        .ok_or_else(|| anyhow!("executable path has no parent: {}", exe_path.display()))?;
    Ok(parent.join(STATE_FILE_NAME))
}

pub fn resolve_state_path() -> Result<PathBuf> {
    let exe_path = std::env::current_exe().context("resolve current executable")?;
    state_path_from_exe_path(&exe_path)
}

/// Stores the encoded record in a plain text file.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn next_to_executable() -> Result<Self> {
        Ok(Self::new(resolve_state_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load_raw(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("read overlay state file {}", self.path.display()))?;
        Ok(Some(content))
    }

    /// Forgets everything persisted; the next load returns the default state.
    pub fn reset(&self) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }
        std::fs::remove_file(&self.path)
            .with_context(|| format!("remove overlay state file {}", self.path.display()))
    }
}

impl StateStore for FileStateStore {
    fn load(&self) -> PanelState {
        match self.load_raw() {
            Ok(raw) => codec::decode_or_default(raw.as_deref()),
            Err(err) => {
                tracing::warn!(?err, "overlay state unreadable, using defaults");
                PanelState::default()
            }
        }
    }

    fn save(&self, state: &PanelState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("create overlay state parent folder {}", parent.display())
            })?;
        }
        std::fs::write(&self.path, codec::encode(state))
            .with_context(|| format!("write overlay state file {}", self.path.display()))
    }
}

/// Keeps the encoded record in memory. Used by headless sessions and tests.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    raw: Mutex<Option<String>>,
    saves: AtomicUsize,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            raw: Mutex::new(Some(raw.into())),
            saves: AtomicUsize::new(0),
        }
    }

    pub fn with_state(state: &PanelState) -> Self {
        Self::with_raw(codec::encode(state))
    }

    pub fn raw(&self) -> Option<String> {
        self.raw
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> PanelState {
        codec::decode_or_default(self.raw().as_deref())
    }

    fn save(&self, state: &PanelState) -> Result<()> {
        *self.raw.lock().unwrap_or_else(PoisonError::into_inner) = Some(codec::encode(state));
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::model::{OpponentId, Position};

    #[test]
    fn state_path_is_resolved_next_to_executable() {
        let exe = Path::new("/tmp/overlay/bin/uno_overlay");
        let path = state_path_from_exe_path(exe).expect("path");
        assert_eq!(path, Path::new("/tmp/overlay/bin").join(STATE_FILE_NAME));
    }

    #[test]
    fn missing_file_loads_default_state() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = FileStateStore::new(dir.path().join(STATE_FILE_NAME));
        assert_eq!(store.load_raw().expect("load raw"), None);
        assert_eq!(store.load(), PanelState::default());
    }

    #[test]
    fn file_store_roundtrip() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = FileStateStore::new(dir.path().join("nested").join(STATE_FILE_NAME));

        let state = PanelState::default()
            .with_control_position(Position::new(40, 90))
            .with_added_opponent(OpponentId::from("a"), "Opponent")
            .with_toggled_lock();
        store.save(&state).expect("save state");

        assert_eq!(store.load(), state);
    }

    #[test]
    fn corrupt_file_loads_default_state() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join(STATE_FILE_NAME);
        std::fs::write(&path, "not a record").expect("write corrupt file");
        assert_eq!(FileStateStore::new(path).load(), PanelState::default());
    }

    #[test]
    fn reset_removes_persisted_state() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = FileStateStore::new(dir.path().join(STATE_FILE_NAME));
        store
            .save(&PanelState::default().with_max_opponents(9))
            .expect("save state");
        store.reset().expect("reset");
        assert!(!store.path().exists());
        assert_eq!(store.load().max_opponents, 3);
        store.reset().expect("reset is idempotent");
    }

    #[test]
    fn memory_store_counts_saves() {
        let store = MemoryStateStore::new();
        assert_eq!(store.load(), PanelState::default());
        store
            .save(&PanelState::default().with_alpha(0.5))
            .expect("save state");
        assert_eq!(store.save_count(), 1);
        assert_eq!(store.load().alpha, 0.5);
    }
}
