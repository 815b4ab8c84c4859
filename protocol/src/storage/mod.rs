//! # Storage Module
//!
//! Durable homes for a [`VaultState`]. The state machine itself never
//! touches disk; a [`StateStore`] is handed to whoever drives it (see
//! [`crate::treasury::Treasury`]).
//!
//! ## Architecture
//!
//! ```text
//! file.rs   — JSON file, atomically replaced on every save
//! db.rs     — sled embedded database, one record in the `vault` tree
//! memory.rs — in-process bytes, for tests and simulations
//! ```
//!
//! ## Load Semantics
//!
//! Every store shares the same recovery rule: when nothing has been saved
//! yet, or the stored bytes do not decode into a valid state, `load`
//! returns the default state built from the store's [`VaultDefaults`].
//! Corruption is logged at `warn`; it is never silently papered over in
//! the other direction (`save` always reports failure).
//!
//! All stores use the same JSON record so a file written by one can be
//! imported into another.

pub mod db;
pub mod file;
pub mod memory;

pub use db::SledStore;
pub use file::JsonFileStore;
pub use memory::MemoryStore;

use std::path::PathBuf;

use crate::config::VaultDefaults;
use crate::vault::VaultState;

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors that can occur while persisting or retrieving state.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

// ---------------------------------------------------------------------------
// StateStore
// ---------------------------------------------------------------------------

/// Load/save access to one persisted vault state.
pub trait StateStore: Send + Sync {
    /// Returns the stored state, or the default state when nothing usable
    /// is stored.
    fn load(&self) -> StoreResult<VaultState>;

    /// Durably replaces the stored state.
    fn save(&self, state: &VaultState) -> StoreResult<()>;

    /// Whether a state record has been saved at all.
    fn exists(&self) -> StoreResult<bool>;
}

impl<S: StateStore + ?Sized> StateStore for &S {
    fn load(&self) -> StoreResult<VaultState> {
        (**self).load()
    }

    fn save(&self, state: &VaultState) -> StoreResult<()> {
        (**self).save(state)
    }

    fn exists(&self) -> StoreResult<bool> {
        (**self).exists()
    }
}

impl<S: StateStore + ?Sized> StateStore for Box<S> {
    fn load(&self) -> StoreResult<VaultState> {
        (**self).load()
    }

    fn save(&self, state: &VaultState) -> StoreResult<()> {
        (**self).save(state)
    }

    fn exists(&self) -> StoreResult<bool> {
        (**self).exists()
    }
}

// ---------------------------------------------------------------------------
// Shared encoding
// ---------------------------------------------------------------------------

pub(crate) fn encode(state: &VaultState) -> StoreResult<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(state)?)
}

/// Decodes a stored record, falling back to the defaults on corruption.
pub(crate) fn decode_or_default(bytes: &[u8], defaults: &VaultDefaults, origin: &str) -> VaultState {
    match serde_json::from_slice::<VaultState>(bytes) {
        Ok(state) => state,
        Err(e) => {
            tracing::warn!(
                origin = %origin,
                error = %e,
                "stored vault state is unreadable, starting from defaults"
            );
            VaultState::new(defaults)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corrupt_bytes_decode_to_defaults() {
        let defaults = VaultDefaults::default();
        let state = decode_or_default(b"{ not json", &defaults, "test");
        assert_eq!(state, VaultState::default());
    }

    #[test]
    fn structurally_invalid_record_decodes_to_defaults() {
        let defaults = VaultDefaults {
            assets: vec!["BTC".into()],
            keys: vec!["A".into(), "B".into()],
        };
        let raw = br#"{"vault": {"ETH": -5}, "spokes": {}, "pending": [], "keys": ["K1"]}"#;
        let state = decode_or_default(raw, &defaults, "test");
        assert_eq!(state, VaultState::new(&defaults));
    }

    #[test]
    fn encode_then_decode_is_lossless() {
        let mut state = VaultState::default();
        state.deposit("ETH", 12.5).unwrap();
        let bytes = encode(&state).unwrap();
        let decoded = decode_or_default(&bytes, &VaultDefaults::default(), "test");
        assert_eq!(decoded, state);
    }
}
