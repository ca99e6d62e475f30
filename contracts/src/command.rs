//! # Commands
//!
//! Every engine operation as data. Hosts that receive requests over a wire,
//! replay scripts, or sign operations for the attestation layer build a
//! [`Command`] and hand it to [`EscrowEngine::execute`].
//!
//! The JSON form is internally tagged on `op`:
//!
//! ```json
//! { "op": "create", "beneficiary": "bob", "quantity": 1000 }
//! { "op": "partial_distribute", "reference": 1, "amount": 250 }
//! { "op": "adjudicate", "reference": 1, "originator_allocation": 33 }
//! ```

use holdfast_protocol::{HeightOracle, Identity, ValueLedger};
use serde::{Deserialize, Serialize};

use crate::container::{Container, ContainerRef};
use crate::error::EscrowResult;
use crate::lifecycle::{CreateRequest, EscrowEngine};
use crate::operation::OperationKind;
use crate::store::ContainerStore;

/// One engine operation, minus the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    Create(CreateRequest),
    Accept { reference: ContainerRef },
    Verify { reference: ContainerRef },
    Distribute { reference: ContainerRef },
    PartialDistribute { reference: ContainerRef, amount: u64 },
    ReleasePhase { reference: ContainerRef },
    Cancel { reference: ContainerRef },
    Retrieve { reference: ContainerRef },
    RetrieveExpired { reference: ContainerRef },
    ExtendTimeframe { reference: ContainerRef, additional_blocks: u64 },
    InitiateDispute {
        reference: ContainerRef,
        #[serde(default)]
        reason: String,
    },
    SubmitEvidence {
        reference: ContainerRef,
        description: String,
        data_hash: String,
    },
    Adjudicate { reference: ContainerRef, originator_allocation: u8 },
    Lockdown { reference: ContainerRef },
    ReleaseLockdown { reference: ContainerRef },
    Freeze { reference: ContainerRef },
    Halt { reference: ContainerRef },
    Secure { reference: ContainerRef },
    ReassignBeneficiary { reference: ContainerRef, new_beneficiary: Identity },
    ReassignOriginator { reference: ContainerRef, new_originator: Identity },
    BeginWithdrawal { reference: ContainerRef },
    CompleteWithdrawal { reference: ContainerRef },
}

impl Command {
    pub fn kind(&self) -> OperationKind {
        use Command::*;
        match self {
            Create(_) => OperationKind::Create,
            Accept { .. } => OperationKind::Accept,
            Verify { .. } => OperationKind::Verify,
            Distribute { .. } => OperationKind::Distribute,
            PartialDistribute { .. } => OperationKind::PartialDistribute,
            ReleasePhase { .. } => OperationKind::ReleasePhase,
            Cancel { .. } => OperationKind::Cancel,
            Retrieve { .. } => OperationKind::Retrieve,
            RetrieveExpired { .. } => OperationKind::RetrieveExpired,
            ExtendTimeframe { .. } => OperationKind::ExtendTimeframe,
            InitiateDispute { .. } => OperationKind::InitiateDispute,
            SubmitEvidence { .. } => OperationKind::SubmitEvidence,
            Adjudicate { .. } => OperationKind::Adjudicate,
            Lockdown { .. } => OperationKind::Lockdown,
            ReleaseLockdown { .. } => OperationKind::ReleaseLockdown,
            Freeze { .. } => OperationKind::Freeze,
            Halt { .. } => OperationKind::Halt,
            Secure { .. } => OperationKind::Secure,
            ReassignBeneficiary { .. } => OperationKind::ReassignBeneficiary,
            ReassignOriginator { .. } => OperationKind::ReassignOriginator,
            BeginWithdrawal { .. } => OperationKind::BeginWithdrawal,
            CompleteWithdrawal { .. } => OperationKind::CompleteWithdrawal,
        }
    }

    /// The container this command targets, or `None` for creation.
    pub fn reference(&self) -> Option<ContainerRef> {
        use Command::*;
        match self {
            Create(_) => None,
            Accept { reference }
            | Verify { reference }
            | Distribute { reference }
            | PartialDistribute { reference, .. }
            | ReleasePhase { reference }
            | Cancel { reference }
            | Retrieve { reference }
            | RetrieveExpired { reference }
            | ExtendTimeframe { reference, .. }
            | InitiateDispute { reference, .. }
            | SubmitEvidence { reference, .. }
            | Adjudicate { reference, .. }
            | Lockdown { reference }
            | ReleaseLockdown { reference }
            | Freeze { reference }
            | Halt { reference }
            | Secure { reference }
            | ReassignBeneficiary { reference, .. }
            | ReassignOriginator { reference, .. }
            | BeginWithdrawal { reference }
            | CompleteWithdrawal { reference } => Some(*reference),
        }
    }
}

impl<S, L, H> EscrowEngine<S, L, H>
where
    S: ContainerStore,
    L: ValueLedger,
    H: HeightOracle,
{
    /// Run `command` on behalf of `caller`.
    pub fn execute(&self, caller: &Identity, command: &Command) -> EscrowResult<Container> {
        match command {
            Command::Create(request) => self.create(caller, request.clone()),
            Command::Accept { reference } => self.accept(caller, *reference),
            Command::Verify { reference } => self.verify(caller, *reference),
            Command::Distribute { reference } => self.distribute(caller, *reference),
            Command::PartialDistribute { reference, amount } => {
                self.partial_distribute(caller, *reference, *amount)
            }
            Command::ReleasePhase { reference } => self.release_phase(caller, *reference),
            Command::Cancel { reference } => self.cancel(caller, *reference),
            Command::Retrieve { reference } => self.retrieve(caller, *reference),
            Command::RetrieveExpired { reference } => self.retrieve_expired(caller, *reference),
            Command::ExtendTimeframe {
                reference,
                additional_blocks,
            } => self.extend_timeframe(caller, *reference, *additional_blocks),
            Command::InitiateDispute { reference, reason } => {
                self.initiate_dispute(caller, *reference, reason)
            }
            Command::SubmitEvidence {
                reference,
                description,
                data_hash,
            } => self.submit_evidence(caller, *reference, description, data_hash),
            Command::Adjudicate {
                reference,
                originator_allocation,
            } => self.adjudicate(caller, *reference, *originator_allocation),
            Command::Lockdown { reference } => self.lockdown(caller, *reference),
            Command::ReleaseLockdown { reference } => self.release_lockdown(caller, *reference),
            Command::Freeze { reference } => self.freeze(caller, *reference),
            Command::Halt { reference } => self.halt(caller, *reference),
            Command::Secure { reference } => self.secure(caller, *reference),
            Command::ReassignBeneficiary {
                reference,
                new_beneficiary,
            } => self.reassign_beneficiary(caller, *reference, new_beneficiary),
            Command::ReassignOriginator {
                reference,
                new_originator,
            } => self.reassign_originator(caller, *reference, new_originator),
            Command::BeginWithdrawal { reference } => self.begin_withdrawal(caller, *reference),
            Command::CompleteWithdrawal { reference } => self.complete_withdrawal(caller, *reference),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::CreationVariant;

    #[test]
    fn json_shape() {
        let cmd: Command = serde_json::from_str(r#"{"op":"partial_distribute","reference":3,"amount":25}"#).unwrap();
        assert_eq!(
            cmd,
            Command::PartialDistribute {
                reference: ContainerRef(3),
                amount: 25
            }
        );
        assert_eq!(cmd.kind(), OperationKind::PartialDistribute);
        assert_eq!(cmd.reference(), Some(ContainerRef(3)));
    }

    #[test]
    fn create_defaults_to_standard_variant() {
        let cmd: Command = serde_json::from_str(r#"{"op":"create","beneficiary":"bob","quantity":10}"#).unwrap();
        match cmd {
            Command::Create(req) => {
                assert_eq!(req.variant, CreationVariant::Standard);
                assert_eq!(req.beneficiary, Identity::new("bob"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn phased_create_parses() {
        let cmd: Command = serde_json::from_str(
            r#"{"op":"create","beneficiary":"bob","quantity":900,
                "variant":{"kind":"phased","intervals":3,"interval_blocks":10}}"#,
        )
        .unwrap();
        assert_eq!(cmd.reference(), None);
        assert_eq!(
            cmd,
            Command::Create(CreateRequest::new("bob", 900).phased(3, 10))
        );
    }
}
