//! # Vault State
//!
//! The root aggregate: vault balances, spoke balances, authorized keys and
//! the pending proposals. Fields are private so the only way to change a
//! state is through the lifecycle operations in [`super::lifecycle`].
//!
//! ## Persisted Form
//!
//! ```text
//! {
//!   "vault":   { "ETH": 100, "USDC": 0 },
//!   "spokes":  { "alpha": { "ETH": 10, "USDC": 0 } },
//!   "pending": [ { "id": 0, "type": "pay_tax", ..., "not_before": 1700000000 } ],
//!   "keys":    [ "K1", "K2", "K3" ],
//!   "next_id": 1
//! }
//! ```
//!
//! `pending` stays an array so older list-shaped records keep loading.
//! Entries without an `id` are numbered in array order after every
//! explicit id; `next_id` is reconstructed when absent.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::proposal::{Proposal, ProposalId};
use crate::config::VaultDefaults;

/// Per-asset balances.
pub type Balances = BTreeMap<String, f64>;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Reasons a persisted record cannot become a [`VaultState`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordError {
    /// Two pending entries claim the same id.
    #[error("duplicate proposal id {0}")]
    DuplicateProposalId(ProposalId),

    /// A balance is negative or not finite.
    #[error("invalid balance {balance} for {asset} in {account}")]
    InvalidBalance {
        account: String,
        asset: String,
        balance: f64,
    },

    /// A proposal carries a signature from a key outside the key set.
    #[error("proposal {id} signed by unknown key `{key}`")]
    UnknownSigner { id: ProposalId, key: String },

    /// No id is left to number a proposal with.
    #[error("proposal id space exhausted")]
    IdSpaceExhausted,
}

// ---------------------------------------------------------------------------
// VaultState
// ---------------------------------------------------------------------------

/// In-memory treasury state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StateRecord", into = "StateRecord")]
pub struct VaultState {
    pub(super) vault: Balances,
    pub(super) spokes: BTreeMap<String, Balances>,
    /// Ids grow monotonically, so key order is insertion order.
    pub(super) pending: BTreeMap<ProposalId, Proposal>,
    pub(super) keys: BTreeSet<String>,
    pub(super) next_id: u64,
}

impl Default for VaultState {
    fn default() -> Self {
        Self::new(&VaultDefaults::default())
    }
}

impl VaultState {
    /// Fresh state: every configured asset at zero, no spokes, nothing pending.
    pub fn new(defaults: &VaultDefaults) -> Self {
        Self {
            vault: defaults.assets.iter().map(|a| (a.clone(), 0.0)).collect(),
            spokes: BTreeMap::new(),
            pending: BTreeMap::new(),
            keys: defaults.keys.iter().cloned().collect(),
            next_id: 0,
        }
    }

    /// Vault balances by asset.
    pub fn vault(&self) -> &Balances {
        &self.vault
    }

    /// Vault balance of `asset`; zero when the asset is unknown.
    pub fn vault_balance(&self, asset: &str) -> f64 {
        self.vault.get(asset).copied().unwrap_or(0.0)
    }

    /// All spokes and their balances.
    pub fn spokes(&self) -> &BTreeMap<String, Balances> {
        &self.spokes
    }

    /// Balances of one spoke, if it exists.
    pub fn spoke(&self, name: &str) -> Option<&Balances> {
        self.spokes.get(name)
    }

    /// Balance of `asset` held by `spoke`; zero when either is unknown.
    pub fn spoke_balance(&self, spoke: &str, asset: &str) -> f64 {
        self.spokes
            .get(spoke)
            .and_then(|b| b.get(asset))
            .copied()
            .unwrap_or(0.0)
    }

    /// Vault plus every spoke's holding of `asset`.
    ///
    /// Unchanged by `fund_spoke`, reduced by `pay_tax`.
    pub fn total_supply(&self, asset: &str) -> f64 {
        self.vault_balance(asset)
            + self
                .spokes
                .values()
                .filter_map(|b| b.get(asset))
                .sum::<f64>()
    }

    /// Authorized key identifiers.
    pub fn keys(&self) -> &BTreeSet<String> {
        &self.keys
    }

    /// Whether `key` may sign proposals.
    pub fn is_authorized(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    /// Pending proposals in the order they were proposed.
    pub fn pending(&self) -> impl Iterator<Item = (ProposalId, &Proposal)> + '_ {
        self.pending.iter().map(|(id, p)| (*id, p))
    }

    /// Number of pending proposals.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Looks up a pending proposal.
    pub fn proposal(&self, id: ProposalId) -> Option<&Proposal> {
        self.pending.get(&id)
    }

    /// The id the next proposal will receive.
    pub fn next_id(&self) -> ProposalId {
        ProposalId(self.next_id)
    }
}

// ---------------------------------------------------------------------------
// Record conversion
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize)]
struct PendingRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<ProposalId>,
    #[serde(flatten)]
    proposal: Proposal,
}

#[derive(Serialize, Deserialize)]
struct StateRecord {
    vault: Balances,
    #[serde(default)]
    spokes: BTreeMap<String, Balances>,
    pending: Vec<PendingRecord>,
    keys: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    next_id: Option<u64>,
}

fn check_balances(account: &str, balances: &Balances) -> Result<(), RecordError> {
    for (asset, balance) in balances {
        if !balance.is_finite() || *balance < 0.0 {
            return Err(RecordError::InvalidBalance {
                account: account.to_string(),
                asset: asset.clone(),
                balance: *balance,
            });
        }
    }
    Ok(())
}

impl TryFrom<StateRecord> for VaultState {
    type Error = RecordError;

    fn try_from(record: StateRecord) -> Result<Self, Self::Error> {
        check_balances("vault", &record.vault)?;
        for (name, balances) in &record.spokes {
            check_balances(name, balances)?;
        }

        let keys: BTreeSet<String> = record.keys.into_iter().collect();

        let mut next_id = record.next_id.unwrap_or(0);
        for id in record.pending.iter().filter_map(|entry| entry.id) {
            let after = id.0.checked_add(1).ok_or(RecordError::IdSpaceExhausted)?;
            next_id = next_id.max(after);
        }

        let mut pending = BTreeMap::new();
        for entry in record.pending {
            let id = match entry.id {
                Some(id) => id,
                None => {
                    let id = ProposalId(next_id);
                    next_id = next_id
                        .checked_add(1)
                        .ok_or(RecordError::IdSpaceExhausted)?;
                    id
                }
            };
            if let Some(key) = entry
                .proposal
                .signatures
                .iter()
                .find(|key| !keys.contains(*key))
            {
                return Err(RecordError::UnknownSigner {
                    id,
                    key: key.clone(),
                });
            }
            if pending.insert(id, entry.proposal).is_some() {
                return Err(RecordError::DuplicateProposalId(id));
            }
        }

        Ok(Self {
            vault: record.vault,
            spokes: record.spokes,
            pending,
            keys,
            next_id,
        })
    }
}

impl From<VaultState> for StateRecord {
    fn from(state: VaultState) -> Self {
        Self {
            vault: state.vault,
            spokes: state.spokes,
            pending: state
                .pending
                .into_iter()
                .map(|(id, proposal)| PendingRecord {
                    id: Some(id),
                    proposal,
                })
                .collect(),
            keys: state.keys.into_iter().collect(),
            next_id: Some(state.next_id),
        }
    }
}
