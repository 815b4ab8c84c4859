// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Spokevault CLI
//!
//! Entry point for the `spokevault` binary. Parses CLI arguments,
//! initializes logging, opens the configured state store and runs one
//! treasury operation against it.
//!
//! - `init`     — write a fresh default state
//! - `deposit`  — credit funds arriving from outside
//! - `propose`  — queue a `fund-spoke` or `pay-tax` proposal
//! - `sign`     — approve a proposal with a key
//! - `execute`  — apply a proposal that has quorum and an elapsed timelock
//! - `status`   — print balances, keys and pending proposals
//! - `version`  — print build version information

mod cli;
mod logging;

use anyhow::{anyhow, Context, Result};
use clap::Parser;

use spokevault_protocol::clock::{Clock, SystemClock};
use spokevault_protocol::storage::{JsonFileStore, SledStore, StateStore};
use spokevault_protocol::treasury::{Treasury, TreasuryError};
use spokevault_protocol::vault::{ProposalDraft, VaultState};

use cli::{Backend, Commands, ProposeCommand, SpokevaultCli};

type CliTreasury = Treasury<Box<dyn StateStore>, SystemClock>;

fn main() -> Result<()> {
    run(SpokevaultCli::parse())
}

/// Runs one parsed command. `version` returns before logging or the store
/// are touched.
fn run(cli: SpokevaultCli) -> Result<()> {
    let command = match cli.command {
        Commands::Version => {
            print_version();
            return Ok(());
        }
        command => command,
    };

    logging::init_logging("spokevault=info,spokevault_protocol=info", cli.log_format);

    let store = open_store(cli.backend, &cli.state)?;
    tracing::debug!(backend = ?cli.backend, state = %cli.state.display(), "store opened");
    let treasury: CliTreasury = Treasury::with_system_clock(store);

    match command {
        Commands::Init(args) => {
            treasury
                .init(&VaultState::default(), args.force)
                .map_err(surface)?;
            println!("Vault initialized at {}", cli.state.display());
        }
        Commands::Deposit(args) => {
            let balance = treasury
                .deposit(&args.asset, args.amount)
                .map_err(surface)?;
            println!("Deposited {} {} (vault balance {})", args.amount, args.asset, balance);
        }
        Commands::Propose(command) => {
            let (draft, timelock_hours) = match command {
                ProposeCommand::FundSpoke { draft, spoke } => (
                    ProposalDraft::fund_spoke(draft.asset, draft.amount, spoke),
                    draft.timelock_hours,
                ),
                ProposeCommand::PayTax { draft } => (
                    ProposalDraft::pay_tax(draft.asset, draft.amount),
                    draft.timelock_hours,
                ),
            };
            let id = treasury.propose(draft, timelock_hours).map_err(surface)?;
            println!("Proposal {} queued", id);
        }
        Commands::Sign(args) => {
            let added = treasury.sign(args.id, &args.key).map_err(surface)?;
            if added {
                println!("{} signed proposal {}", args.key, args.id);
            } else {
                println!("{} had already signed proposal {}", args.key, args.id);
            }
        }
        Commands::Execute(args) => {
            let receipt = treasury.execute(args.id).map_err(surface)?;
            match &receipt.spoke {
                Some(spoke) => println!(
                    "Proposal {} executed: {} {} moved to spoke {}",
                    receipt.id, receipt.amount, receipt.asset, spoke
                ),
                None => println!(
                    "Proposal {} executed: {} {} paid out as tax",
                    receipt.id, receipt.amount, receipt.asset
                ),
            }
        }
        Commands::Status(args) => {
            let state = treasury.state().map_err(surface)?;
            if args.json {
                let record =
                    serde_json::to_string_pretty(&state).context("failed to encode state")?;
                println!("{}", record);
            } else {
                print_status(&state, treasury.clock());
            }
        }
        Commands::Version => print_version(),
    }

    Ok(())
}

/// Opens the store selected on the command line.
fn open_store(backend: Backend, path: &std::path::Path) -> Result<Box<dyn StateStore>> {
    Ok(match backend {
        Backend::Json => Box::new(JsonFileStore::new(path)),
        Backend::Sled => Box::new(
            SledStore::open(path)
                .with_context(|| format!("failed to open sled database at {}", path.display()))?,
        ),
    })
}

/// Turns a treasury error into a user-facing error carrying its kind.
fn surface(err: TreasuryError) -> anyhow::Error {
    match &err {
        TreasuryError::Vault(e) if e.may_succeed_later() => {
            anyhow!("{}: {} (the proposal stays pending)", err.kind(), err)
        }
        _ => anyhow!("{}: {}", err.kind(), err),
    }
}

/// Prints a human-readable summary of the state.
fn print_status(state: &VaultState, clock: &dyn Clock) {
    let now = clock.now();

    println!("Vault");
    for (asset, balance) in state.vault() {
        println!("  {:<8} {}", asset, balance);
    }

    println!("Spokes");
    if state.spokes().is_empty() {
        println!("  (none)");
    }
    for (name, balances) in state.spokes() {
        let line: Vec<String> = balances
            .iter()
            .map(|(asset, balance)| format!("{}={}", asset, balance))
            .collect();
        println!("  {:<12} {}", name, line.join(" "));
    }

    let keys: Vec<&str> = state.keys().iter().map(String::as_str).collect();
    println!("Keys     {}", keys.join(", "));

    println!("Pending  ({})", state.pending_len());
    for (id, proposal) in state.pending() {
        let kind = proposal
            .kind
            .as_ref()
            .map(|k| k.to_string())
            .unwrap_or_else(|| "-".to_string());
        let amount = proposal
            .amount
            .as_ref()
            .map(|a| a.to_string())
            .unwrap_or_else(|| "-".to_string());
        let timelock = if proposal.timelock_elapsed(now) {
            "unlocked".to_string()
        } else {
            format!("locked until {}", proposal.not_before.format("%Y-%m-%d %H:%M:%S UTC"))
        };
        println!(
            "  {:<5} {:<10} {} {}{}  sigs {}/{}  {}",
            id.to_string(),
            kind,
            amount,
            proposal.asset.as_deref().unwrap_or("-"),
            proposal
                .spoke
                .as_deref()
                .map(|s| format!(" -> {}", s))
                .unwrap_or_default(),
            proposal.signature_count(),
            proposal.required_sigs,
            timelock,
        );
    }
}

/// Prints version information to stdout.
fn print_version() {
    println!("spokevault {}", env!("CARGO_PKG_VERSION"));
    println!("protocol   {}", spokevault_protocol::config::PROTOCOL_VERSION);
    println!("format     v{}", spokevault_protocol::config::FORMAT_VERSION);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_leaves_the_state_location_alone() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("vault.db");
        let cli = SpokevaultCli::try_parse_from([
            "spokevault",
            "--backend",
            "sled",
            "--state",
            state.to_str().unwrap(),
            "version",
        ])
        .unwrap();

        run(cli).unwrap();
        assert!(!state.exists());
    }
}
