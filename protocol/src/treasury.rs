//! # Treasury Service
//!
//! Wires a [`StateStore`] and a [`Clock`] around the pure state machine.
//! Each call is one load → operate → save cycle, held under a mutex so
//! that callers sharing a `Treasury` are serialized. A failed operation
//! saves nothing.
//!
//! The service is also where transitions get logged; the vault module
//! itself stays silent.

use parking_lot::Mutex;
use thiserror::Error;

use crate::clock::{Clock, SystemClock};
use crate::storage::{StateStore, StoreError};
use crate::vault::{
    Amount, ExecutionReceipt, ProposalDraft, ProposalId, VaultError, VaultResult, VaultState,
};

/// Errors surfaced by the treasury service.
#[derive(Debug, Error)]
pub enum TreasuryError {
    /// The state machine rejected the operation.
    #[error(transparent)]
    Vault(#[from] VaultError),

    /// Loading or saving the state failed.
    #[error("storage failure: {0}")]
    Store(#[from] StoreError),

    /// `init` refused to overwrite an existing state.
    #[error("a vault state already exists; pass force to overwrite it")]
    AlreadyInitialized,
}

pub type TreasuryResult<T> = Result<T, TreasuryError>;

impl TreasuryError {
    /// Taxonomy name for vault errors, a fixed label otherwise.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Vault(e) => e.kind(),
            Self::Store(_) => "StoreError",
            Self::AlreadyInitialized => "AlreadyInitialized",
        }
    }
}

/// A vault bound to its store and clock.
pub struct Treasury<S, C = SystemClock> {
    store: S,
    clock: C,
    lock: Mutex<()>,
}

impl<S: StateStore> Treasury<S, SystemClock> {
    /// Treasury reading the system clock.
    pub fn with_system_clock(store: S) -> Self {
        Self::new(store, SystemClock)
    }
}

impl<S: StateStore, C: Clock> Treasury<S, C> {
    pub fn new(store: S, clock: C) -> Self {
        Self {
            store,
            clock,
            lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Current persisted state.
    pub fn state(&self) -> TreasuryResult<VaultState> {
        let _guard = self.lock.lock();
        Ok(self.store.load()?)
    }

    /// Writes `initial` as the stored state.
    ///
    /// Fails with [`TreasuryError::AlreadyInitialized`] if a state exists
    /// and `force` is false.
    pub fn init(&self, initial: &VaultState, force: bool) -> TreasuryResult<()> {
        let _guard = self.lock.lock();
        if self.store.exists()? && !force {
            return Err(TreasuryError::AlreadyInitialized);
        }
        self.store.save(initial)?;
        tracing::info!(force, "vault state initialized");
        Ok(())
    }

    /// External inflow into the vault.
    pub fn deposit(&self, asset: &str, amount: impl Into<Amount>) -> TreasuryResult<f64> {
        let amount = amount.into();
        let balance = self.transact("deposit", |state, _| state.deposit(asset, amount))?;
        tracing::info!(asset, balance, "deposit recorded");
        Ok(balance)
    }

    pub fn propose(&self, draft: ProposalDraft, timelock_hours: f64) -> TreasuryResult<ProposalId> {
        let id = self.transact("propose", |state, clock| {
            state.propose(draft, timelock_hours, clock)
        })?;
        tracing::info!(proposal_id = id.0, timelock_hours, "proposal queued");
        Ok(id)
    }

    /// Returns whether the signature was new.
    pub fn sign(&self, id: ProposalId, key: &str) -> TreasuryResult<bool> {
        let added = self.transact("sign", |state, _| state.sign(id, key))?;
        if added {
            tracing::info!(proposal_id = id.0, key, "signature added");
        } else {
            tracing::debug!(proposal_id = id.0, key, "duplicate signature ignored");
        }
        Ok(added)
    }

    pub fn execute(&self, id: ProposalId) -> TreasuryResult<ExecutionReceipt> {
        let receipt = self.transact("execute", |state, clock| state.execute(id, clock))?;
        tracing::info!(
            proposal_id = id.0,
            kind = %receipt.kind,
            asset = %receipt.asset,
            amount = receipt.amount,
            spoke = receipt.spoke.as_deref().unwrap_or("-"),
            "proposal executed"
        );
        Ok(receipt)
    }

    fn transact<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&mut VaultState, &dyn Clock) -> VaultResult<T>,
    ) -> TreasuryResult<T> {
        let _guard = self.lock.lock();
        let mut state = self.store.load()?;
        match f(&mut state, &self.clock) {
            Ok(value) => {
                self.store.save(&state)?;
                Ok(value)
            }
            Err(e) => {
                tracing::warn!(operation, kind = e.kind(), error = %e, "operation rejected");
                Err(e.into())
            }
        }
    }
}
