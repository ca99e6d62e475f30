//! # Container Record
//!
//! The container is the only persistent entity in the engine: one escrowed
//! quantity, two parties, a status, and a height window. Containers are
//! never deleted. Terminal containers stay in the store as audit records
//! with `quantity == 0`.

use std::fmt;

use holdfast_protocol::Identity;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ContainerRef
// ---------------------------------------------------------------------------

/// Dense, monotonically assigned container reference. The first container
/// is `1`; `0` is never issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContainerRef(pub u64);

impl ContainerRef {
    pub fn get(self) -> u64 {
        self.0
    }

    /// The reference issued after this one.
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Big-endian bytes, so lexicographic key order is numeric order.
    pub fn to_key(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for ContainerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ContainerRef {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

// ---------------------------------------------------------------------------
// ContainerStatus
// ---------------------------------------------------------------------------

/// Lifecycle status. The transition table lives in
/// [`lifecycle`](crate::lifecycle); this type only knows which states are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContainerStatus {
    Pending,
    AwaitingAcceptance,
    Accepted,
    VerificationPending,
    Disputed,
    Halted,
    Frozen,
    Locked,
    Secured,
    WithdrawalPending,
    Completed,
    Returned,
    Cancelled,
    Expired,
    Withdrawn,
    Resolved,
}

impl ContainerStatus {
    /// Terminal statuses have no outgoing edges.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ContainerStatus::Completed
                | ContainerStatus::Returned
                | ContainerStatus::Cancelled
                | ContainerStatus::Expired
                | ContainerStatus::Withdrawn
                | ContainerStatus::Resolved
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ContainerStatus::Pending => "pending",
            ContainerStatus::AwaitingAcceptance => "awaiting-acceptance",
            ContainerStatus::Accepted => "accepted",
            ContainerStatus::VerificationPending => "verification-pending",
            ContainerStatus::Disputed => "disputed",
            ContainerStatus::Halted => "halted",
            ContainerStatus::Frozen => "frozen",
            ContainerStatus::Locked => "locked",
            ContainerStatus::Secured => "secured",
            ContainerStatus::WithdrawalPending => "withdrawal-pending",
            ContainerStatus::Completed => "completed",
            ContainerStatus::Returned => "returned",
            ContainerStatus::Cancelled => "cancelled",
            ContainerStatus::Expired => "expired",
            ContainerStatus::Withdrawn => "withdrawn",
            ContainerStatus::Resolved => "resolved",
        }
    }
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Auxiliary records
// ---------------------------------------------------------------------------

/// Opaque classification tag. Never interpreted by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceCategory(pub String);

impl ResourceCategory {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }
}

impl fmt::Display for ResourceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Release schedule for a phased container: `interval_count` equal tranches
/// of `per_interval`, the k-th unlocking at `start_height + k * interval_blocks`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseSchedule {
    pub interval_count: u32,
    pub per_interval: u64,
    pub interval_blocks: u64,
    pub start_height: u64,
    /// Tranches released so far.
    pub released: u32,
}

impl PhaseSchedule {
    /// Height at which the next tranche unlocks, or `None` when every
    /// tranche is out.
    pub fn next_unlock_height(&self) -> Option<u64> {
        if self.released >= self.interval_count {
            return None;
        }
        let k = u64::from(self.released) + 1;
        Some(
            self.start_height
                .saturating_add(k.saturating_mul(self.interval_blocks)),
        )
    }

    /// Total span of the schedule in blocks.
    pub fn span_blocks(&self) -> u64 {
        u64::from(self.interval_count).saturating_mul(self.interval_blocks)
    }
}

/// A digest-anchored piece of dispute evidence. The payload lives off-ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    pub submitted_by: Identity,
    pub description: String,
    /// Hex-encoded BLAKE3 digest of the off-ledger payload.
    pub data_hash: String,
    pub height: u64,
}

/// The open dispute on a container, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisputeCase {
    pub initiated_by: Identity,
    pub reason: String,
    pub opened_at_height: u64,
    pub evidence: Vec<Evidence>,
}

// ---------------------------------------------------------------------------
// Container
// ---------------------------------------------------------------------------

/// A single escrow container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    pub reference: ContainerRef,
    /// Funded the container; default authority for reversal.
    pub originator: Identity,
    /// Entitled to distributed value.
    pub beneficiary: Identity,
    pub resource_category: ResourceCategory,
    /// Value still custodied for this container.
    pub quantity: u64,
    pub status: ContainerStatus,
    /// Start of the container, or of its current lockdown/withdrawal phase.
    pub initiation_height: u64,
    /// Last height at which forward-progress operations are allowed.
    pub termination_height: u64,
    /// Blocks added by extensions so far.
    pub extended_by: u64,
    pub schedule: Option<PhaseSchedule>,
    pub dispute: Option<DisputeCase>,
    /// Bumped on every write; the store compares it before overwriting.
    pub version: u64,
}

impl Container {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn is_party(&self, who: &Identity) -> bool {
        *who == self.originator || *who == self.beneficiary
    }
}
