//! # CLI Interface
//!
//! Defines the command-line argument structure for `spokevault` using
//! `clap` derive. Global flags select the state location, storage backend
//! and log format; subcommands map one-to-one onto treasury operations.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use spokevault_protocol::config::DEFAULT_STATE_FILE;
use spokevault_protocol::vault::ProposalId;

use crate::logging::LogFormat;

/// Spokevault multi-signature treasury.
///
/// Every mutating command loads the stored state, applies one operation,
/// and saves the result. Rejected operations leave the stored state as is.
#[derive(Parser, Debug)]
#[command(
    name = "spokevault",
    about = "Multi-signature hub-and-spoke treasury",
    version,
    propagate_version = true
)]
pub struct SpokevaultCli {
    /// Location of the state: a JSON file, or a directory for the sled backend.
    #[arg(
        long,
        short = 's',
        global = true,
        env = "SPOKEVAULT_STATE",
        default_value = DEFAULT_STATE_FILE
    )]
    pub state: PathBuf,

    /// Storage backend.
    #[arg(
        long,
        global = true,
        env = "SPOKEVAULT_BACKEND",
        value_enum,
        default_value_t = Backend::Json
    )]
    pub backend: Backend,

    /// Log output format. Logs go to stderr; filter with `RUST_LOG`.
    #[arg(
        long,
        global = true,
        env = "SPOKEVAULT_LOG_FORMAT",
        value_enum,
        default_value_t = LogFormat::Pretty
    )]
    pub log_format: LogFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Where the state is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// Pretty-printed JSON file.
    Json,
    /// Embedded sled database.
    Sled,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a fresh default state (ETH/USDC at zero, keys K1–K3).
    Init(InitArgs),
    /// Record funds arriving in the vault from outside.
    Deposit(DepositArgs),
    /// Queue a new proposal.
    #[command(subcommand)]
    Propose(ProposeCommand),
    /// Approve a pending proposal with a key.
    Sign(SignArgs),
    /// Execute a pending proposal once quorum and timelock allow.
    Execute(ExecuteArgs),
    /// Show balances, keys and pending proposals.
    Status(StatusArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `init` subcommand.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing state.
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the `deposit` subcommand.
#[derive(Args, Debug)]
pub struct DepositArgs {
    /// Asset symbol, e.g. ETH.
    pub asset: String,
    /// Amount to credit.
    pub amount: f64,
}

/// Proposal kinds.
#[derive(Subcommand, Debug)]
pub enum ProposeCommand {
    /// Move funds from the vault into a spoke.
    FundSpoke {
        #[command(flatten)]
        draft: DraftArgs,
        /// Receiving spoke. Created on first funding.
        #[arg(long)]
        spoke: String,
    },
    /// Pay a fee out of the vault.
    PayTax {
        #[command(flatten)]
        draft: DraftArgs,
    },
}

/// Fields shared by every proposal kind.
#[derive(Args, Debug)]
pub struct DraftArgs {
    /// Asset symbol. Not checked until execution.
    #[arg(long)]
    pub asset: String,
    /// Amount to move. Not checked until execution.
    #[arg(long, allow_negative_numbers = true)]
    pub amount: f64,
    /// Hours that must pass before the proposal can execute.
    #[arg(long, default_value_t = 0.0)]
    pub timelock_hours: f64,
}

/// Arguments for the `sign` subcommand.
#[derive(Args, Debug)]
pub struct SignArgs {
    /// Proposal id, as printed by `propose` (`#3` or `3`).
    pub id: ProposalId,
    /// Authorized key identifier.
    pub key: String,
}

/// Arguments for the `execute` subcommand.
#[derive(Args, Debug)]
pub struct ExecuteArgs {
    /// Proposal id.
    pub id: ProposalId,
}

/// Arguments for the `status` subcommand.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Print the raw persisted record instead of a summary.
    #[arg(long)]
    pub json: bool,
}
