//! # Engine Configuration & Constants
//!
//! Every magic number in Holdfast lives here. All durations are in ledger
//! heights (blocks), never wall-clock seconds: the engine has no clock
//! other than the [`HeightOracle`](crate::height::HeightOracle).
//!
//! [`EngineConfig`] bundles the constants with the two distinguished
//! identities (protocol operator and custodian). It is injected at engine
//! construction. Nothing reads a deployer address from ambient context.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identity::Identity;

// ---------------------------------------------------------------------------
// Version
// ---------------------------------------------------------------------------

/// Engine version string, reported by the node binary.
pub const ENGINE_VERSION: &str = "0.1.0";

// ---------------------------------------------------------------------------
// Time-window defaults (blocks)
// ---------------------------------------------------------------------------

/// Standard lifetime of a container: about ten days at one block per
/// ten minutes.
pub const STANDARD_DURATION_BLOCKS: u64 = 1_440;

/// Largest single extension. Half the standard window.
pub const MAX_EXTENSION_BLOCKS: u64 = 720;

/// Cap on the sum of all extensions applied to one container. Extensions
/// only ever add to the window; this is what stops indefinite deferral.
pub const MAX_TOTAL_EXTENSION_BLOCKS: u64 = 4_320;

/// Minimum number of blocks a lockdown must last before the operator may
/// release it.
pub const LOCKDOWN_COOLDOWN_BLOCKS: u64 = 144;

/// Minimum delay between entering `withdrawal-pending` and completing the
/// withdrawal.
pub const WITHDRAWAL_DELAY_BLOCKS: u64 = 288;

// ---------------------------------------------------------------------------
// Dispute limits
// ---------------------------------------------------------------------------

/// Evidence entries accepted per dispute before further submissions are
/// refused.
pub const MAX_EVIDENCE_PER_DISPUTE: usize = 32;

/// Longest accepted dispute reason or evidence description, in bytes.
pub const MAX_DISPUTE_TEXT_BYTES: usize = 1_024;

// ---------------------------------------------------------------------------
// Well-known identities
// ---------------------------------------------------------------------------

/// Default operator identity for local/devnet setups. Real deployments
/// must override this in their config file.
pub const DEFAULT_OPERATOR: &str = "holdfast:operator";

/// Default custodial identity that holds escrowed value on the ledger.
pub const DEFAULT_CUSTODIAN: &str = "holdfast:custodian";

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Runtime parameters for the escrow engine.
///
/// Every field has a default, so a config file only needs to name what it
/// overrides:
///
/// ```json
/// { "operator": "ops-team", "standard_duration_blocks": 100 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// The protocol operator: elevated authority over every container.
    pub operator: Identity,
    /// The engine's own custodial identity on the value ledger.
    pub custodian: Identity,
    pub standard_duration_blocks: u64,
    pub max_extension_blocks: u64,
    pub max_total_extension_blocks: u64,
    pub lockdown_cooldown_blocks: u64,
    pub withdrawal_delay_blocks: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            operator: Identity::new(DEFAULT_OPERATOR),
            custodian: Identity::new(DEFAULT_CUSTODIAN),
            standard_duration_blocks: STANDARD_DURATION_BLOCKS,
            max_extension_blocks: MAX_EXTENSION_BLOCKS,
            max_total_extension_blocks: MAX_TOTAL_EXTENSION_BLOCKS,
            lockdown_cooldown_blocks: LOCKDOWN_COOLDOWN_BLOCKS,
            withdrawal_delay_blocks: WITHDRAWAL_DELAY_BLOCKS,
        }
    }
}

impl EngineConfig {
    /// Default config with explicit operator and custodian identities.
    pub fn with_identities(operator: impl Into<Identity>, custodian: impl Into<Identity>) -> Self {
        Self {
            operator: operator.into(),
            custodian: custodian.into(),
            ..Self::default()
        }
    }

    /// Parse and validate a JSON config string.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// Reject configurations the engine cannot operate under.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.operator.is_empty() || self.custodian.is_empty() {
            return Err(ConfigError::Invalid(
                "operator and custodian identities must be non-empty".into(),
            ));
        }
        if self.operator == self.custodian {
            return Err(ConfigError::Invalid(
                "operator and custodian must be distinct identities".into(),
            ));
        }
        if self.standard_duration_blocks == 0 {
            return Err(ConfigError::Invalid("standard_duration_blocks must be > 0".into()));
        }
        if self.max_extension_blocks > self.max_total_extension_blocks {
            return Err(ConfigError::Invalid(
                "max_extension_blocks cannot exceed max_total_extension_blocks".into(),
            ));
        }
        Ok(())
    }
}
