//! In-memory store. Holds the encoded record rather than a live
//! `VaultState` so loads go through the same decode path as on-disk stores.

use parking_lot::Mutex;

use super::{decode_or_default, encode, StateStore, StoreResult};
use crate::config::VaultDefaults;
use crate::vault::VaultState;

#[derive(Debug, Default)]
pub struct MemoryStore {
    record: Mutex<Option<Vec<u8>>>,
    defaults: VaultDefaults,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults(defaults: VaultDefaults) -> Self {
        Self {
            record: Mutex::new(None),
            defaults,
        }
    }

    /// Store pre-loaded with `state`.
    pub fn with_state(state: &VaultState) -> StoreResult<Self> {
        let store = Self::new();
        store.save(state)?;
        Ok(store)
    }

    /// Store pre-loaded with arbitrary bytes, e.g. a corrupt record.
    pub fn with_raw(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            record: Mutex::new(Some(bytes.into())),
            defaults: VaultDefaults::default(),
        }
    }

    /// The stored record, if any.
    pub fn raw(&self) -> Option<Vec<u8>> {
        self.record.lock().clone()
    }
}

impl StateStore for MemoryStore {
    fn load(&self) -> StoreResult<VaultState> {
        Ok(match self.record.lock().as_deref() {
            Some(bytes) => decode_or_default(bytes, &self.defaults, "memory"),
            None => VaultState::new(&self.defaults),
        })
    }

    fn save(&self, state: &VaultState) -> StoreResult<()> {
        let bytes = encode(state)?;
        *self.record.lock() = Some(bytes);
        Ok(())
    }

    fn exists(&self) -> StoreResult<bool> {
        Ok(self.record.lock().is_some())
    }
}
