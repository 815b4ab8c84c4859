//! # Vault Module — Multi-Signature Treasury State Machine
//!
//! The vault holds pooled balances, disburses them to named sub-accounts
//! (spokes) and pays fees out of them, but only after a quorum of
//! authorized keys has approved a proposal and its timelock has run out.
//!
//! ## Architecture
//!
//! ```text
//! proposal.rs   — ProposalId, ProposalKind, Amount, drafts, receipts
//! state.rs      — VaultState aggregate and its persisted record form
//! lifecycle.rs  — propose / sign / execute / deposit
//! error.rs      — VaultError taxonomy
//! ```
//!
//! ## Design Principles
//!
//! 1. **All-or-nothing transitions.** Each operation validates before it
//!    mutates. Nothing is ever half-applied, so there is no rollback path.
//!
//! 2. **No I/O, no logging, no wall clock.** Time comes from an injected
//!    [`Clock`](crate::clock::Clock); persistence lives in [`crate::storage`].
//!
//! 3. **Asset-agnostic quorum logic.** Signing and quorum checks never look
//!    at asset symbols. The configured assets only seed the default state
//!    and the zero balances of a newly created spoke.

pub mod error;
pub mod lifecycle;
pub mod proposal;
pub mod state;

pub use error::{VaultError, VaultResult};
pub use proposal::{Amount, ExecutionReceipt, Proposal, ProposalDraft, ProposalId, ProposalKind};
pub use state::{Balances, RecordError, VaultState};
