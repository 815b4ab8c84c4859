//! Error taxonomy for vault operations.
//!
//! Every variant is recoverable by the caller. None of them is ever
//! swallowed inside the state machine, and none of them leaves the state
//! partially modified.

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::proposal::ProposalId;

/// Errors returned by propose, sign, execute and deposit.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VaultError {
    /// A proposal draft or propose argument is malformed.
    #[error("validation failed: missing or invalid field `{field}`")]
    Validation {
        /// Name of the offending field.
        field: &'static str,
    },

    /// No pending proposal carries this id.
    #[error("proposal {id} not found")]
    NotFound {
        /// The id that failed to resolve.
        id: ProposalId,
    },

    /// The key is not part of the authorized key set.
    #[error("unauthorized: key `{key}` is not an authorized signer")]
    Unauthorized {
        /// The rejected key identifier.
        key: String,
    },

    /// Quorum not reached yet.
    #[error("insufficient signatures on proposal {id}: have {have}, need {need}")]
    InsufficientSignatures {
        /// The proposal being executed.
        id: ProposalId,
        /// Distinct signatures collected so far.
        have: usize,
        /// Signatures required for execution.
        need: usize,
    },

    /// Execution attempted before the proposal's `not_before` instant.
    #[error("timelock active on proposal {id}: executable at {not_before}, now {now}")]
    TimelockActive {
        /// The proposal being executed.
        id: ProposalId,
        /// Earliest permitted execution instant.
        not_before: DateTime<Utc>,
        /// Clock reading at the failed attempt.
        now: DateTime<Utc>,
    },

    /// The proposal type is absent or not one the vault knows how to apply.
    #[error("unsupported transaction type: {kind}")]
    UnsupportedType {
        /// The type as recorded on the proposal (`"<none>"` when absent).
        kind: String,
    },

    /// A field required to apply the proposal is absent.
    #[error("missing field `{field}` on proposal {id}")]
    MissingField {
        /// The proposal being executed.
        id: ProposalId,
        /// Name of the absent field.
        field: &'static str,
    },

    /// The amount is not a positive finite number.
    #[error("invalid amount: {value} (must be a positive number)")]
    InvalidAmount {
        /// Rendering of the rejected value.
        value: String,
    },

    /// The vault does not hold enough of the asset.
    #[error("insufficient funds in vault: {asset} available {available}, required {required}")]
    InsufficientFunds {
        /// Asset being moved.
        asset: String,
        /// Vault balance at the time of the check.
        available: f64,
        /// Amount the proposal tried to move.
        required: f64,
    },

    /// Crediting the amount would push a balance past the largest
    /// representable value.
    #[error("balance overflow: crediting {amount} {asset} to {account}")]
    BalanceOverflow {
        /// `vault` or the spoke name.
        account: String,
        /// Asset being credited.
        asset: String,
        /// Amount that did not fit.
        amount: f64,
    },
}

/// Result type alias for vault operations.
pub type VaultResult<T> = Result<T, VaultError>;

impl VaultError {
    /// Stable taxonomy name for presentation layers.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "ValidationError",
            Self::NotFound { .. } => "NotFoundError",
            Self::Unauthorized { .. } => "UnauthorizedError",
            Self::InsufficientSignatures { .. } => "InsufficientSignaturesError",
            Self::TimelockActive { .. } => "TimelockActiveError",
            Self::UnsupportedType { .. } => "UnsupportedTypeError",
            Self::MissingField { .. } => "MissingFieldError",
            Self::InvalidAmount { .. } => "InvalidAmountError",
            Self::InsufficientFunds { .. } => "InsufficientFundsError",
            Self::BalanceOverflow { .. } => "BalanceOverflowError",
        }
    }

    /// True for failures that may clear up on their own: more signatures
    /// arriving, the timelock elapsing, or the vault being topped up.
    pub fn may_succeed_later(&self) -> bool {
        matches!(
            self,
            Self::InsufficientSignatures { .. }
                | Self::TimelockActive { .. }
                | Self::InsufficientFunds { .. }
        )
    }
}
