//! JSON file store.
//!
//! Saves go to a sibling `*.tmp` file which is then renamed over the
//! target, so a crash mid-write leaves the previous state intact.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::{decode_or_default, encode, StateStore, StoreError, StoreResult};
use crate::config::{VaultDefaults, DEFAULT_STATE_FILE};
use crate::vault::VaultState;

/// A [`StateStore`] backed by a single pretty-printed JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    defaults: VaultDefaults,
}

impl JsonFileStore {
    /// Store at `path` with the standard defaults.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_defaults(path, VaultDefaults::default())
    }

    /// Store at `path` that falls back to `defaults`.
    pub fn with_defaults(path: impl Into<PathBuf>, defaults: VaultDefaults) -> Self {
        Self {
            path: path.into(),
            defaults,
        }
    }

    /// Location of the state file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "state.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
        move |source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl Default for JsonFileStore {
    fn default() -> Self {
        Self::new(DEFAULT_STATE_FILE)
    }
}

impl StateStore for JsonFileStore {
    fn load(&self) -> StoreResult<VaultState> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(decode_or_default(
                &bytes,
                &self.defaults,
                &self.path.display().to_string(),
            )),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no state file yet, using defaults");
                Ok(VaultState::new(&self.defaults))
            }
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "state file unreadable, starting from defaults"
                );
                Ok(VaultState::new(&self.defaults))
            }
        }
    }

    fn save(&self, state: &VaultState) -> StoreResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(Self::io_err(parent))?;
        }

        let bytes = encode(state)?;
        let tmp = self.tmp_path();
        fs::write(&tmp, &bytes).map_err(Self::io_err(&tmp))?;
        fs::rename(&tmp, &self.path).map_err(Self::io_err(&self.path))?;

        tracing::debug!(path = %self.path.display(), bytes = bytes.len(), "state saved");
        Ok(())
    }

    fn exists(&self) -> StoreResult<bool> {
        Ok(self.path.is_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("state.json"));
        assert!(!store.exists().unwrap());
        assert_eq!(store.load().unwrap(), VaultState::default());
    }

    #[test]
    fn save_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("simulator").join("state.json"));
        let mut state = VaultState::default();
        state.deposit("USDC", 250).unwrap();
        store.save(&state).unwrap();

        assert!(store.exists().unwrap());
        assert!(!store.tmp_path().exists());
        assert_eq!(store.load().unwrap(), state);
    }

    #[test]
    fn corrupt_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, b"{\"vault\": ").unwrap();
        let store = JsonFileStore::new(&path);
        assert_eq!(store.load().unwrap(), VaultState::default());
    }

    #[test]
    fn save_into_unwritable_location_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"file, not a directory").unwrap();
        let store = JsonFileStore::new(blocker.join("state.json"));
        let err = store.save(&VaultState::default()).unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
    }
}
