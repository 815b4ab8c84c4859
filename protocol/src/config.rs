//! # Treasury Configuration & Constants
//!
//! Every magic number in Spokevault lives here. If you're hardcoding a
//! quorum size or an asset symbol somewhere else, move it here first.
//!
//! The defaults describe the reference deployment: two assets, three
//! key-holders, a 2-of-3 quorum.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Versioning
// ---------------------------------------------------------------------------

/// Crate-level protocol version reported by the CLI.
pub const PROTOCOL_VERSION: &str = "0.1.0";

/// Version of the persisted state record. Bump when a field changes meaning;
/// additive fields (`id`, `next_id`, `created_at`) do not require a bump.
pub const FORMAT_VERSION: u16 = 1;

// ---------------------------------------------------------------------------
// Quorum & Timelock
// ---------------------------------------------------------------------------

/// Number of distinct signatures every new proposal requires.
pub const DEFAULT_REQUIRED_SIGS: usize = 2;

/// Seconds in one hour. Timelocks are expressed in hours at the API surface.
pub const SECONDS_PER_HOUR: f64 = 3_600.0;

// ---------------------------------------------------------------------------
// Default State
// ---------------------------------------------------------------------------

/// Assets the vault is seeded with (at a zero balance).
pub const DEFAULT_ASSETS: [&str; 2] = ["ETH", "USDC"];

/// Authorized key identifiers in a fresh state.
pub const DEFAULT_KEYS: [&str; 3] = ["K1", "K2", "K3"];

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// Default location of the JSON state file, relative to the working directory.
pub const DEFAULT_STATE_FILE: &str = "simulator/state.json";

/// Name of the sled tree holding the state record.
pub const STATE_TREE: &str = "vault";

/// Key of the state record inside [`STATE_TREE`].
pub const STATE_KEY: &[u8] = b"state";

// ---------------------------------------------------------------------------
// VaultDefaults
// ---------------------------------------------------------------------------

/// Shape of the state produced when a store has nothing (usable) to load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultDefaults {
    /// Asset symbols created with a zero vault balance.
    pub assets: Vec<String>,
    /// Authorized key identifiers.
    pub keys: Vec<String>,
}

impl Default for VaultDefaults {
    fn default() -> Self {
        Self {
            assets: DEFAULT_ASSETS.iter().map(|a| a.to_string()).collect(),
            keys: DEFAULT_KEYS.iter().map(|k| k.to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quorum_fits_within_default_keyset() {
        assert!(DEFAULT_REQUIRED_SIGS <= DEFAULT_KEYS.len());
    }

    #[test]
    fn defaults_mirror_constants() {
        let defaults = VaultDefaults::default();
        assert_eq!(defaults.assets, vec!["ETH", "USDC"]);
        assert_eq!(defaults.keys, vec!["K1", "K2", "K3"]);
    }
}
