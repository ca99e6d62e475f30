//! Operation names, the categories admission policies reason about, and
//! the caller roles the engine authorizes against.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Every operation the engine exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Create,
    Accept,
    Verify,
    Distribute,
    PartialDistribute,
    ReleasePhase,
    Cancel,
    Retrieve,
    RetrieveExpired,
    ExtendTimeframe,
    InitiateDispute,
    SubmitEvidence,
    Adjudicate,
    Lockdown,
    ReleaseLockdown,
    Freeze,
    Halt,
    Secure,
    ReassignBeneficiary,
    ReassignOriginator,
    BeginWithdrawal,
    CompleteWithdrawal,
}

impl OperationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::Create => "create",
            OperationKind::Accept => "accept",
            OperationKind::Verify => "verify",
            OperationKind::Distribute => "distribute",
            OperationKind::PartialDistribute => "partial_distribute",
            OperationKind::ReleasePhase => "release_phase",
            OperationKind::Cancel => "cancel",
            OperationKind::Retrieve => "retrieve",
            OperationKind::RetrieveExpired => "retrieve_expired",
            OperationKind::ExtendTimeframe => "extend_timeframe",
            OperationKind::InitiateDispute => "initiate_dispute",
            OperationKind::SubmitEvidence => "submit_evidence",
            OperationKind::Adjudicate => "adjudicate",
            OperationKind::Lockdown => "lockdown",
            OperationKind::ReleaseLockdown => "release_lockdown",
            OperationKind::Freeze => "freeze",
            OperationKind::Halt => "halt",
            OperationKind::Secure => "secure",
            OperationKind::ReassignBeneficiary => "reassign_beneficiary",
            OperationKind::ReassignOriginator => "reassign_originator",
            OperationKind::BeginWithdrawal => "begin_withdrawal",
            OperationKind::CompleteWithdrawal => "complete_withdrawal",
        }
    }

    pub fn category(self) -> OperationCategory {
        match self {
            OperationKind::Create => OperationCategory::Funding,
            OperationKind::Distribute
            | OperationKind::PartialDistribute
            | OperationKind::ReleasePhase
            | OperationKind::Cancel
            | OperationKind::Retrieve
            | OperationKind::RetrieveExpired
            | OperationKind::Adjudicate
            | OperationKind::CompleteWithdrawal => OperationCategory::Release,
            _ => OperationCategory::Governance,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse grouping used by rate limits and circuit breakers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationCategory {
    /// Escrowing new value.
    Funding,
    /// Moving custodied value out.
    Release,
    /// Status and party changes without value movement.
    Governance,
}

impl fmt::Display for OperationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OperationCategory::Funding => "funding",
            OperationCategory::Release => "release",
            OperationCategory::Governance => "governance",
        };
        f.write_str(s)
    }
}

/// The capacity in which a caller acts on a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Originator,
    Beneficiary,
    Operator,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories() {
        assert_eq!(OperationKind::Create.category(), OperationCategory::Funding);
        assert_eq!(OperationKind::Adjudicate.category(), OperationCategory::Release);
        assert_eq!(OperationKind::Freeze.category(), OperationCategory::Governance);
        assert_eq!(OperationKind::RetrieveExpired.category(), OperationCategory::Release);
        assert_eq!(OperationKind::ExtendTimeframe.category(), OperationCategory::Governance);
    }

    #[test]
    fn display_matches_serde_name() {
        let json = serde_json::to_string(&OperationKind::PartialDistribute).unwrap();
        assert_eq!(json, format!("\"{}\"", OperationKind::PartialDistribute));
    }
}
