// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Spokevault — Core Library
//!
//! A multi-signature treasury: a vault of pooled assets that can only be
//! moved by proposals a quorum of key-holders has signed and whose
//! timelock has elapsed. Approved proposals either fund a spoke (a named
//! sub-account) or pay a fee out of the vault.
//!
//! ## Architecture
//!
//! - **vault** — The state machine: proposals, signatures, execution, and
//!   the balance invariants. Pure, synchronous, no I/O.
//! - **clock** — Injectable time source for timelocks.
//! - **storage** — Where states live between calls (JSON file, sled, memory).
//! - **treasury** — A store + clock + lock around the state machine.
//! - **config** — Quorum size, default assets and keys, storage paths.
//!
//! ## Quick Start
//!
//! ```
//! use spokevault_protocol::clock::FixedClock;
//! use spokevault_protocol::vault::{ProposalDraft, VaultState};
//!
//! let clock = FixedClock::at_timestamp(1_700_000_000);
//! let mut state = VaultState::default();
//! state.deposit("ETH", 100).unwrap();
//!
//! let id = state
//!     .propose(ProposalDraft::fund_spoke("ETH", 10, "alpha"), 0.0, &clock)
//!     .unwrap();
//! state.sign(id, "K1").unwrap();
//! state.sign(id, "K2").unwrap();
//! state.execute(id, &clock).unwrap();
//!
//! assert_eq!(state.vault_balance("ETH"), 90.0);
//! assert_eq!(state.spoke_balance("alpha", "ETH"), 10.0);
//! ```

pub mod clock;
pub mod config;
pub mod storage;
pub mod treasury;
pub mod vault;

pub use clock::{Clock, FixedClock, SystemClock};
pub use storage::{JsonFileStore, MemoryStore, SledStore, StateStore, StoreError};
pub use treasury::{Treasury, TreasuryError};
pub use vault::{ProposalDraft, ProposalId, VaultError, VaultState};
