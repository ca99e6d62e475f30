//! # Replay Scripts
//!
//! A script seeds ledger balances, sets the starting height, and lists the
//! operations to run. Each step may advance the height first.
//!
//! ```json
//! {
//!   "start_height": 100,
//!   "balances": { "alice": 5000 },
//!   "steps": [
//!     { "caller": "alice", "command": { "op": "create", "beneficiary": "bob", "quantity": 1000 } },
//!     { "advance": 1441, "caller": "alice", "command": { "op": "retrieve_expired", "reference": 1 } },
//!     { "signed": { "command": { "op": "distribute", "reference": 2 }, "nonce": 1,
//!                   "public_key": "…", "signature": "…" } }
//!   ]
//! }
//! ```
//!
//! The ledger starts fresh from `balances` on every run. A failing step is
//! reported and the script carries on; failures never change state.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{bail, Result};
use holdfast_contracts::attestation::{AttestedExecutor, SignedCommand};
use holdfast_contracts::lifecycle::EscrowEngine;
use holdfast_contracts::{Command, Container, ContainerStore};
use holdfast_protocol::events::TracingSink;
use holdfast_protocol::height::ManualHeight;
use holdfast_protocol::ledger::InMemoryLedger;
use holdfast_protocol::{EngineConfig, Identity};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// A replay script as read from disk.
#[derive(Debug, Clone, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub start_height: u64,
    #[serde(default)]
    pub balances: BTreeMap<Identity, u64>,
    /// Engine configuration, unless one is given on the command line.
    #[serde(default)]
    pub config: Option<EngineConfig>,
    pub steps: Vec<Step>,
}

/// One line of a script: an optional height advance, then at most one
/// command, either plain (with an explicit caller) or signed.
#[derive(Debug, Clone, Deserialize)]
pub struct Step {
    #[serde(default)]
    pub advance: u64,
    #[serde(default)]
    pub caller: Option<Identity>,
    #[serde(default)]
    pub command: Option<Command>,
    #[serde(default)]
    pub signed: Option<SignedCommand>,
}

/// What happened at one step. Printed as a JSON line.
#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub step: usize,
    pub height: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container: Option<Container>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The full result of a replay.
#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub outcomes: Vec<StepOutcome>,
    pub balances: BTreeMap<Identity, u64>,
    pub total_custodied: u64,
}

impl Script {
    pub fn from_json(json: &str) -> Result<Self> {
        let script: Self = serde_json::from_str(json)?;
        for (i, step) in script.steps.iter().enumerate() {
            match (&step.caller, &step.command, &step.signed) {
                (Some(_), Some(_), None) | (None, None, Some(_)) | (None, None, None) => {}
                _ => bail!(
                    "step {i}: expected `caller` + `command`, or `signed`, or only `advance`"
                ),
            }
        }
        Ok(script)
    }
}

/// Run `script` against a fresh engine backed by `store`.
pub fn replay<S: ContainerStore>(script: &Script, config: EngineConfig, store: S) -> Result<ReplayReport> {
    config.validate()?;

    let ledger = Arc::new(InMemoryLedger::new());
    for (who, amount) in &script.balances {
        ledger.deposit(who, *amount)?;
    }
    let height = Arc::new(ManualHeight::new(script.start_height));
    let engine = EscrowEngine::new(config, store, ledger.clone(), height.clone()).with_sink(Arc::new(TracingSink));
    let executor = AttestedExecutor::new(Arc::new(engine));

    info!(steps = script.steps.len(), start_height = script.start_height, "replay started");

    let mut outcomes = Vec::with_capacity(script.steps.len());
    for (i, step) in script.steps.iter().enumerate() {
        let now = height.advance(step.advance);

        let (operation, result) = match (&step.caller, &step.command, &step.signed) {
            (Some(caller), Some(command), _) => (
                Some(command.kind()),
                executor.engine().execute(caller, command).map_err(|e| e.to_string()),
            ),
            (_, _, Some(signed)) => (
                Some(signed.command.kind()),
                executor.submit(signed).map_err(|e| e.to_string()),
            ),
            _ => {
                debug!(step = i, height = now, "height advanced");
                outcomes.push(StepOutcome {
                    step: i,
                    height: now,
                    operation: None,
                    container: None,
                    error: None,
                });
                continue;
            }
        };

        let (container, error) = match result {
            Ok(container) => (Some(container), None),
            Err(error) => (None, Some(error)),
        };
        outcomes.push(StepOutcome {
            step: i,
            height: now,
            operation: operation.map(|op| op.to_string()),
            container,
            error,
        });
    }

    let total_custodied = executor.engine().total_custodied()?;
    info!(steps = outcomes.len(), total_custodied, "replay finished");

    Ok(ReplayReport {
        outcomes,
        balances: ledger.balances().into_iter().collect(),
        total_custodied,
    })
}
