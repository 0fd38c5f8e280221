//! File-backed JSON store for the tracked streamers and notification channel.
//!
//! Loading never fails: a missing, unreadable or corrupt file yields the empty
//! state. Saving writes a sibling temp file and renames it over the target so
//! a crash mid-write cannot leave a truncated document behind.

use crate::error::StoreError;
use crate::models::PersistedState;
use log::{debug, info, warn};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Default location, relative to the working directory.
pub const DEFAULT_DATA_FILE: &str = "data.json";

#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> PersistedState {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(
                    "No saved state at {}, starting empty",
                    self.path.display()
                );
                return PersistedState::default();
            }
            Err(e) => {
                warn!(
                    "Failed to read {}: {} (starting empty)",
                    self.path.display(),
                    e
                );
                return PersistedState::default();
            }
        };

        match serde_json::from_str::<PersistedState>(&raw) {
            Ok(state) => {
                let state = state.normalized();
                info!(
                    "Loaded saved state from {}: {} tracked streamers, channel={}",
                    self.path.display(),
                    state.tracked_streamers.len(),
                    state.notification_channel_id.as_deref().unwrap_or("unset")
                );
                state
            }
            Err(e) => {
                warn!(
                    "Saved state at {} is not valid JSON: {} (starting empty)",
                    self.path.display(),
                    e
                );
                PersistedState::default()
            }
        }
    }

    pub fn save(&self, state: &PersistedState) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(state)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_error(parent, e))?;
        }

        let tmp_path = self.tmp_path();
        let written = File::create(&tmp_path).and_then(|mut file| {
            file.write_all(json.as_bytes())?;
            file.sync_all()
        });
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp_path);
            return Err(self.io_error(&tmp_path, e));
        }
        if let Err(e) = fs::rename(&tmp_path, &self.path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(self.io_error(&self.path, e));
        }

        debug!(
            "Saved state to {} ({} tracked streamers)",
            self.path.display(),
            state.tracked_streamers.len()
        );
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| DEFAULT_DATA_FILE.into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, path: &Path, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("streamwatch-store-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = temp_dir();
        let store = StateStore::new(dir.join("data.json"));
        assert_eq!(store.load(), PersistedState::default());
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_corrupt_file_loads_empty() {
        let dir = temp_dir();
        let path = dir.join("data.json");
        fs::write(&path, "{ this is not json").unwrap();

        let store = StateStore::new(&path);
        assert_eq!(store.load(), PersistedState::default());
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_wrong_shape_loads_empty() {
        let dir = temp_dir();
        let path = dir.join("data.json");
        fs::write(&path, r#"{"trackedStreamers": "alice"}"#).unwrap();

        let store = StateStore::new(&path);
        assert_eq!(store.load(), PersistedState::default());
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = temp_dir();
        let store = StateStore::new(dir.join("data.json"));

        let mut state = PersistedState::default();
        state.track("alice");
        state.track("bob");
        state.notification_channel_id = Some("1234567890".to_string());

        store.save(&state).unwrap();
        let loaded = store.load();
        assert_eq!(loaded, state);

        // save(load()) is stable
        store.save(&loaded).unwrap();
        assert_eq!(store.load(), state);
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_save_creates_parent_dirs_and_leaves_no_temp_file() {
        let dir = temp_dir();
        let path = dir.join("nested").join("state").join("data.json");
        let store = StateStore::new(&path);

        store.save(&PersistedState::default()).unwrap();
        assert!(path.exists());
        assert!(!path.with_file_name("data.json.tmp").exists());
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_save_replaces_stale_temp_file() {
        // Left behind by an interrupted write
        let dir = temp_dir();
        let path = dir.join("data.json");
        let tmp = dir.join("data.json.tmp");
        fs::write(&tmp, "{ \"trackedStreamers\": [\"old\", \"and longer than the new docu").unwrap();

        let store = StateStore::new(&path);
        let mut state = PersistedState::default();
        state.track("alice");
        store.save(&state).unwrap();

        assert!(!tmp.exists());
        let raw = fs::read_to_string(&path).unwrap();
        let on_disk: PersistedState = serde_json::from_str(&raw).unwrap();
        assert_eq!(on_disk, state);
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_save_overwrites_previous_contents() {
        let dir = temp_dir();
        let store = StateStore::new(dir.join("data.json"));

        let mut state = PersistedState::default();
        state.track("alice");
        store.save(&state).unwrap();

        state.untrack("alice");
        state.track("zed");
        store.save(&state).unwrap();

        let loaded = store.load();
        assert!(!loaded.is_tracked("alice"));
        assert!(loaded.is_tracked("zed"));
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_load_accepts_legacy_file() {
        let dir = temp_dir();
        let path = dir.join("data.json");
        fs::write(
            &path,
            r#"{ "trackedStreamers": ["Alice"], "notificationChannel": "42" }"#,
        )
        .unwrap();

        let loaded = StateStore::new(&path).load();
        assert!(loaded.is_tracked("alice"));
        assert_eq!(loaded.notification_channel_id.as_deref(), Some("42"));
        fs::remove_dir_all(dir).ok();
    }
}
