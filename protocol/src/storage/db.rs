//! # SledStore — Embedded Database Store
//!
//! Keeps the vault record inside sled's embedded key-value store. The
//! record lives under a single well-known key:
//!
//! | Tree    | Key     | Value              |
//! |---------|---------|--------------------|
//! | `vault` | `state` | JSON state record  |
//!
//! The value is the same JSON record the file store writes, so a state
//! can be exported with `serde_json` and imported anywhere else.
//!
//! ## Atomicity
//!
//! A save is one `insert` on one key followed by a flush. sled applies
//! single-key writes atomically, so readers see either the old record or
//! the new one.

use std::path::Path;

use sled::{Db, Tree};

use super::{decode_or_default, encode, StateStore, StoreResult};
use crate::config::{VaultDefaults, STATE_KEY, STATE_TREE};
use crate::vault::VaultState;

/// A [`StateStore`] backed by a sled database.
///
/// sled handles are cheap to clone and thread-safe; clones share the same
/// underlying database.
#[derive(Debug, Clone)]
pub struct SledStore {
    db: Db,
    tree: Tree,
    defaults: VaultDefaults,
}

impl SledStore {
    /// Open or create a database at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db, VaultDefaults::default())
    }

    /// Create a temporary database that is removed when dropped.
    ///
    /// Ideal for unit tests: no filesystem side effects, no cleanup needed.
    pub fn open_temporary() -> StoreResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db, VaultDefaults::default())
    }

    /// Replace the defaults used when nothing usable is stored.
    pub fn with_defaults(mut self, defaults: VaultDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    fn from_db(db: Db, defaults: VaultDefaults) -> StoreResult<Self> {
        let tree = db.open_tree(STATE_TREE)?;
        Ok(Self { db, tree, defaults })
    }
}

impl StateStore for SledStore {
    fn load(&self) -> StoreResult<VaultState> {
        Ok(match self.tree.get(STATE_KEY)? {
            Some(bytes) => decode_or_default(&bytes, &self.defaults, "sled"),
            None => VaultState::new(&self.defaults),
        })
    }

    fn save(&self, state: &VaultState) -> StoreResult<()> {
        let bytes = encode(state)?;
        self.tree.insert(STATE_KEY, bytes)?;
        self.db.flush()?;
        Ok(())
    }

    fn exists(&self) -> StoreResult<bool> {
        Ok(self.tree.contains_key(STATE_KEY)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_temporary_database() {
        let store = SledStore::open_temporary().expect("should create temp db");
        assert!(!store.exists().unwrap());
        assert_eq!(store.load().unwrap(), VaultState::default());
    }

    #[test]
    fn save_and_reload() {
        let store = SledStore::open_temporary().unwrap();
        let mut state = VaultState::default();
        state.deposit("ETH", 100).unwrap();
        store.save(&state).unwrap();

        assert!(store.exists().unwrap());
        assert_eq!(store.load().unwrap(), state);
    }

    #[test]
    fn corrupt_record_loads_defaults() {
        let store = SledStore::open_temporary().unwrap();
        store.tree.insert(STATE_KEY, &b"\x00\x01binary"[..]).unwrap();
        assert_eq!(store.load().unwrap(), VaultState::default());
    }

    #[test]
    fn reopen_persists_across_handles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vault.db");
        let mut state = VaultState::default();
        state.deposit("USDC", 42).unwrap();
        {
            let store = SledStore::open(&path).unwrap();
            store.save(&state).unwrap();
        }
        let store = SledStore::open(&path).unwrap();
        assert_eq!(store.load().unwrap(), state);
    }
}
