// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Holdfast Node
//!
//! Entry point for the `holdfast-node` binary. Parses CLI arguments,
//! initializes logging, and hosts the escrow engine over an in-memory
//! ledger and a manually driven height.
//!
//! The binary supports five subcommands:
//!
//! - `replay` : run a JSON operation script, printing one result per line
//! - `inspect`: print containers from a persisted data directory
//! - `keygen` : generate an Ed25519 identity
//! - `sign`   : sign a command for the attestation layer
//! - `version`: print build version information

mod cli;
mod logging;
mod script;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;

use holdfast_contracts::attestation::SignedCommand;
use holdfast_contracts::{Command, ContainerRef, ContainerStore, MemoryContainerStore, SledContainerStore};
use holdfast_protocol::crypto::Keypair;
use holdfast_protocol::{EngineConfig, Identity};

use cli::{Commands, HoldfastNodeCli};
use script::Script;

fn main() -> Result<()> {
    let cli = HoldfastNodeCli::parse();
    logging::init_logging(&cli.log_level, cli.log_format);

    match cli.command {
        Commands::Replay(args) => replay(args),
        Commands::Inspect(args) => inspect(args),
        Commands::Keygen(args) => keygen(args),
        Commands::Sign(args) => sign(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Runs a script and prints each step outcome, then the final balances.
fn replay(args: cli::ReplayArgs) -> Result<()> {
    let raw = std::fs::read_to_string(&args.script)
        .with_context(|| format!("failed to read script {}", args.script.display()))?;
    let script = Script::from_json(&raw)
        .with_context(|| format!("invalid script {}", args.script.display()))?;

    let config = match (&args.config, &script.config) {
        (Some(path), _) => EngineConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        (None, Some(inline)) => inline.clone(),
        (None, None) => EngineConfig::default(),
    };

    tracing::info!(
        script = %args.script.display(),
        operator = %config.operator,
        custodian = %config.custodian,
        persistent = args.data_dir.is_some(),
        "replaying script"
    );

    let report = match &args.data_dir {
        Some(dir) => {
            let store = open_store(dir)?;
            let report = script::replay(&script, config, store.clone())?;
            store.flush()?;
            report
        }
        None => script::replay(&script, config, MemoryContainerStore::new())?,
    };

    for outcome in &report.outcomes {
        println!("{}", serde_json::to_string(outcome)?);
    }
    println!(
        "{}",
        serde_json::json!({
            "balances": report.balances,
            "total_custodied": report.total_custodied,
        })
    );
    Ok(())
}

/// Prints one container or all of them from a persisted store.
fn inspect(args: cli::InspectArgs) -> Result<()> {
    let store = open_store(&args.data_dir)?;
    match args.reference {
        Some(r) => {
            let container = store
                .get(ContainerRef(r))?
                .with_context(|| format!("no container {r} in {}", args.data_dir.display()))?;
            println!("{}", serde_json::to_string_pretty(&container)?);
        }
        None => {
            let containers = store.scan()?;
            tracing::info!(count = containers.len(), latest = %store.latest_reference()?, "containers loaded");
            for container in containers {
                println!("{}", serde_json::to_string(&container)?);
            }
        }
    }
    Ok(())
}

/// Generates an Ed25519 keypair and prints the identity it maps to.
fn keygen(args: cli::KeygenArgs) -> Result<()> {
    let keypair = match args.seed {
        Some(seed) => Keypair::from_hex(&seed).context("invalid seed")?,
        None => Keypair::generate(),
    };
    let identity = Identity::from_public_key(&keypair.public_key());

    tracing::info!(%identity, "keypair generated");
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "identity": identity,
            "public_key": keypair.public_key().to_hex(),
            "secret_key": keypair.secret_key_hex(),
        }))?
    );
    Ok(())
}

/// Signs a JSON command and prints the `SignedCommand`.
fn sign(args: cli::SignArgs) -> Result<()> {
    let keypair = Keypair::from_hex(&args.secret_key).context("invalid secret key")?;
    let command: Command = serde_json::from_str(&args.command).context("invalid command JSON")?;
    let signed = SignedCommand::sign(&keypair, command, args.nonce)?;
    println!("{}", serde_json::to_string(&signed)?);
    Ok(())
}

fn open_store(dir: &Path) -> Result<SledContainerStore> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create data directory: {}", dir.display()))?;
    SledContainerStore::open(dir).with_context(|| format!("failed to open store at {}", dir.display()))
}

/// Prints version information to stdout.
fn print_version() {
    println!("holdfast-node {}", env!("CARGO_PKG_VERSION"));
    println!("engine        {}", holdfast_protocol::config::ENGINE_VERSION);
    println!("rustc         {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}
