//! # Container Lifecycle Engine
//!
//! Validates preconditions and executes state transitions against the
//! container store, moving value through the host ledger where a
//! transition requires it.
//!
//! ## Transition table
//!
//! | Operation            | Callers                      | From                                   | To                  |
//! |----------------------|------------------------------|----------------------------------------|---------------------|
//! | create               | anyone (becomes originator)  | none                                   | pending / awaiting-acceptance / verification-pending |
//! | accept               | beneficiary                  | awaiting-acceptance                    | accepted            |
//! | verify               | operator                     | verification-pending                   | pending             |
//! | distribute           | originator, operator         | pending, accepted (unphased)           | completed           |
//! | partial_distribute   | originator, operator         | pending, accepted (unphased)           | same / completed    |
//! | release_phase        | originator, operator         | pending, accepted                      | same / completed    |
//! | cancel               | originator                   | pending, awaiting-acceptance           | cancelled           |
//! | retrieve             | operator                     | any non-terminal                       | returned            |
//! | retrieve_expired     | originator, operator         | pending, accepted                      | expired             |
//! | extend_timeframe     | any party, operator          | pending, accepted                      | same                |
//! | lockdown             | any party, operator          | non-terminal except locked, withdrawal-pending | locked      |
//! | release_lockdown     | operator                     | locked                                 | pending             |
//! | freeze / halt        | any party, operator          | pending, accepted, awaiting-acceptance, disputed | frozen / halted |
//! | secure               | originator, operator         | pending, accepted                      | secured             |
//! | reassign_*           | the role itself, operator    | pending, accepted                      | same                |
//! | begin_withdrawal     | originator, operator         | pending, accepted                      | withdrawal-pending  |
//! | complete_withdrawal  | originator, operator         | withdrawal-pending                     | withdrawn           |
//!
//! Dispute operations live in [`dispute_resolution`](crate::dispute_resolution).
//!
//! ## Check order
//!
//! Reference validity, record existence, admission policy, caller role,
//! status, time window, amounts. The first failure aborts the operation
//! with nothing written and nothing moved.
//!
//! ## Serialization
//!
//! Each reference has its own mutex, held from load to write, so operations
//! on one container never interleave. Creation takes a separate lock that
//! keeps the reference sequence dense. Writes are still version-checked by
//! the store.

use std::sync::Arc;

use dashmap::DashMap;
use holdfast_protocol::events::TracingSink;
use holdfast_protocol::{EngineConfig, Event, EventSink, HeightOracle, Identity, TransferLeg, ValueLedger};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::container::{Container, ContainerRef, ContainerStatus, PhaseSchedule, ResourceCategory};
use crate::error::{EscrowError, EscrowResult};
use crate::operation::{OperationKind, Role};
use crate::policy::{AdmissionPolicy, AllowAll};
use crate::settlement::{settle, Commit};
use crate::store::ContainerStore;
use crate::window;

use ContainerStatus::*;

// ---------------------------------------------------------------------------
// Creation requests
// ---------------------------------------------------------------------------

/// Which initial state (and schedule) a new container gets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CreationVariant {
    /// Starts `pending`.
    #[default]
    Standard,
    /// Starts `awaiting-acceptance`; the beneficiary must accept.
    AwaitingAcceptance,
    /// Starts `verification-pending`; the operator must verify.
    VerificationPending,
    /// Starts `pending` with `intervals` equal tranches, one unlocking every
    /// `interval_blocks`. The quantity must divide exactly.
    Phased { intervals: u32, interval_blocks: u64 },
}

/// Parameters for creating a container. The caller becomes the originator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRequest {
    pub beneficiary: Identity,
    pub quantity: u64,
    #[serde(default)]
    pub resource_category: ResourceCategory,
    #[serde(default)]
    pub variant: CreationVariant,
}

impl CreateRequest {
    pub fn new(beneficiary: impl Into<Identity>, quantity: u64) -> Self {
        Self {
            beneficiary: beneficiary.into(),
            quantity,
            resource_category: ResourceCategory::default(),
            variant: CreationVariant::Standard,
        }
    }

    pub fn category(mut self, tag: impl Into<String>) -> Self {
        self.resource_category = ResourceCategory::new(tag);
        self
    }

    pub fn awaiting_acceptance(mut self) -> Self {
        self.variant = CreationVariant::AwaitingAcceptance;
        self
    }

    pub fn verification_pending(mut self) -> Self {
        self.variant = CreationVariant::VerificationPending;
        self
    }

    pub fn phased(mut self, intervals: u32, interval_blocks: u64) -> Self {
        self.variant = CreationVariant::Phased {
            intervals,
            interval_blocks,
        };
        self
    }
}

// ---------------------------------------------------------------------------
// EscrowEngine
// ---------------------------------------------------------------------------

/// The escrow engine.
///
/// Generic over its store, ledger and height oracle so hosts can plug in
/// their own; events and admission policy are trait objects because they
/// are optional and often composed at runtime.
pub struct EscrowEngine<S, L, H> {
    config: EngineConfig,
    store: S,
    ledger: Arc<L>,
    height: Arc<H>,
    sink: Arc<dyn EventSink>,
    policy: Arc<dyn AdmissionPolicy>,
    locks: DashMap<ContainerRef, Arc<Mutex<()>>>,
    create_lock: Mutex<()>,
}

impl<S, L, H> EscrowEngine<S, L, H>
where
    S: ContainerStore,
    L: ValueLedger,
    H: HeightOracle,
{
    /// Engine with a [`TracingSink`] and the [`AllowAll`] policy.
    pub fn new(config: EngineConfig, store: S, ledger: Arc<L>, height: Arc<H>) -> Self {
        Self {
            config,
            store,
            ledger,
            height,
            sink: Arc::new(TracingSink),
            policy: Arc::new(AllowAll),
            locks: DashMap::new(),
            create_lock: Mutex::new(()),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_policy(mut self, policy: Arc<dyn AdmissionPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn current_height(&self) -> u64 {
        self.height.current_height()
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Highest reference issued so far (`0` before the first creation).
    pub fn latest_reference(&self) -> EscrowResult<ContainerRef> {
        Ok(self.store.latest_reference()?)
    }

    /// Load a container, applying the same reference checks as operations.
    pub fn container(&self, reference: ContainerRef) -> EscrowResult<Container> {
        self.check_reference(reference)?;
        self.store
            .get(reference)?
            .ok_or(EscrowError::ContainerMissing(reference))
    }

    /// Every container, terminal ones included, in reference order.
    pub fn containers(&self) -> EscrowResult<Vec<Container>> {
        Ok(self.store.scan()?)
    }

    /// Sum of `quantity` over non-terminal containers. Never exceeds the
    /// custodian's ledger balance.
    pub fn total_custodied(&self) -> EscrowResult<u64> {
        let total = self
            .store
            .scan()?
            .iter()
            .filter(|c| !c.is_terminal())
            .try_fold(0u64, |acc, c| acc.checked_add(c.quantity))
            .ok_or_else(|| EscrowError::InvalidQuantity("custodied total overflows".into()))?;
        Ok(total)
    }

    // -----------------------------------------------------------------------
    // Create
    // -----------------------------------------------------------------------

    /// Escrow `request.quantity` from `caller` and insert a new container.
    ///
    /// The transfer and the insert are one unit: if the transfer fails no
    /// record is written and no reference is consumed.
    pub fn create(&self, caller: &Identity, request: CreateRequest) -> EscrowResult<Container> {
        let height = self.height.current_height();
        self.admit(caller, OperationKind::Create, height)?;

        if request.quantity == 0 {
            return Err(EscrowError::InvalidQuantity("quantity must be > 0".into()));
        }
        self.check_new_parties(caller, &request.beneficiary)?;

        let (status, schedule) = match request.variant {
            CreationVariant::Standard => (Pending, None),
            CreationVariant::AwaitingAcceptance => (AwaitingAcceptance, None),
            CreationVariant::VerificationPending => (VerificationPending, None),
            CreationVariant::Phased {
                intervals,
                interval_blocks,
            } => (
                Pending,
                Some(phase_schedule(request.quantity, intervals, interval_blocks, height)?),
            ),
        };
        let min_span = schedule.as_ref().map_or(0, PhaseSchedule::span_blocks);
        let termination_height = window::initial_termination(&self.config, height, min_span)?;

        let _sequence = self.create_lock.lock();
        let reference = self.store.latest_reference()?.next();

        let container = Container {
            reference,
            originator: caller.clone(),
            beneficiary: request.beneficiary,
            resource_category: request.resource_category,
            quantity: request.quantity,
            status,
            initiation_height: height,
            termination_height,
            extended_by: 0,
            schedule,
            dispute: None,
            version: 0,
        };

        let legs = vec![TransferLeg::new(
            container.quantity,
            caller,
            &self.config.custodian,
        )];
        settle(&*self.ledger, &self.store, legs.clone(), Commit::Insert(&container))?;

        info!(
            %reference,
            originator = %container.originator,
            beneficiary = %container.beneficiary,
            quantity = container.quantity,
            status = %container.status,
            termination = container.termination_height,
            "container created"
        );
        self.emit(OperationKind::Create, caller, height, None, &container, &legs);
        Ok(container)
    }

    // -----------------------------------------------------------------------
    // Acceptance & verification
    // -----------------------------------------------------------------------

    /// Beneficiary accepts an `awaiting-acceptance` container.
    pub fn accept(&self, caller: &Identity, reference: ContainerRef) -> EscrowResult<Container> {
        let op = OperationKind::Accept;
        self.transition(caller, reference, op, |c, height| {
            self.authorize(caller, c, &[Role::Beneficiary], op)?;
            require_status(c, &[AwaitingAcceptance], op)?;
            window::ensure_within(c, height)?;
            c.status = Accepted;
            Ok(Vec::new())
        })
    }

    /// Operator clears a `verification-pending` container into `pending`.
    pub fn verify(&self, caller: &Identity, reference: ContainerRef) -> EscrowResult<Container> {
        let op = OperationKind::Verify;
        self.transition(caller, reference, op, |c, _| {
            self.authorize(caller, c, &[Role::Operator], op)?;
            require_status(c, &[VerificationPending], op)?;
            c.status = Pending;
            Ok(Vec::new())
        })
    }

    // -----------------------------------------------------------------------
    // Distribution
    // -----------------------------------------------------------------------

    /// Release the full quantity to the beneficiary.
    pub fn distribute(&self, caller: &Identity, reference: ContainerRef) -> EscrowResult<Container> {
        let op = OperationKind::Distribute;
        self.transition(caller, reference, op, |c, height| {
            self.authorize(caller, c, &[Role::Originator, Role::Operator], op)?;
            require_status(c, &[Pending, Accepted], op)?;
            window::ensure_within(c, height)?;
            ensure_unphased(c)?;
            let to = c.beneficiary.clone();
            Ok(self.drain(c, &to, Completed))
        })
    }

    /// Release `amount` to the beneficiary; completes when nothing is left.
    pub fn partial_distribute(
        &self,
        caller: &Identity,
        reference: ContainerRef,
        amount: u64,
    ) -> EscrowResult<Container> {
        let op = OperationKind::PartialDistribute;
        self.transition(caller, reference, op, |c, height| {
            self.authorize(caller, c, &[Role::Originator, Role::Operator], op)?;
            require_status(c, &[Pending, Accepted], op)?;
            window::ensure_within(c, height)?;
            ensure_unphased(c)?;
            if amount == 0 || amount > c.quantity {
                return Err(EscrowError::InvalidQuantity(format!(
                    "partial amount must be in 1..={}, got {amount}",
                    c.quantity
                )));
            }
            Ok(vec![self.release(c, amount)])
        })
    }

    /// Release the next tranche of a phased container once it has unlocked.
    pub fn release_phase(&self, caller: &Identity, reference: ContainerRef) -> EscrowResult<Container> {
        let op = OperationKind::ReleasePhase;
        self.transition(caller, reference, op, |c, height| {
            self.authorize(caller, c, &[Role::Originator, Role::Operator], op)?;
            require_status(c, &[Pending, Accepted], op)?;
            window::ensure_within(c, height)?;

            let schedule = c
                .schedule
                .as_mut()
                .ok_or_else(|| EscrowError::InvalidQuantity("container has no phase schedule".into()))?;
            let unlock = schedule
                .next_unlock_height()
                .ok_or_else(|| EscrowError::InvalidQuantity("every phase has been released".into()))?;
            if height < unlock {
                return Err(EscrowError::TimeframeExceeded {
                    height,
                    boundary: unlock,
                });
            }
            schedule.released += 1;
            let amount = schedule.per_interval.min(c.quantity);
            Ok(vec![self.release(c, amount)])
        })
    }

    // -----------------------------------------------------------------------
    // Reversal & expiry
    // -----------------------------------------------------------------------

    /// Originator aborts before the container progresses.
    pub fn cancel(&self, caller: &Identity, reference: ContainerRef) -> EscrowResult<Container> {
        let op = OperationKind::Cancel;
        self.transition(caller, reference, op, |c, height| {
            self.authorize(caller, c, &[Role::Originator], op)?;
            require_status(c, &[Pending, AwaitingAcceptance], op)?;
            window::ensure_within(c, height)?;
            let to = c.originator.clone();
            Ok(self.drain(c, &to, Cancelled))
        })
    }

    /// Operator returns the full quantity to the originator.
    pub fn retrieve(&self, caller: &Identity, reference: ContainerRef) -> EscrowResult<Container> {
        let op = OperationKind::Retrieve;
        self.transition(caller, reference, op, |c, height| {
            self.authorize(caller, c, &[Role::Operator], op)?;
            if c.is_terminal() {
                return Err(status_conflict(c, op));
            }
            window::ensure_within(c, height)?;
            let to = c.originator.clone();
            Ok(self.drain(c, &to, Returned))
        })
    }

    /// Return the quantity to the originator after the window has closed.
    pub fn retrieve_expired(&self, caller: &Identity, reference: ContainerRef) -> EscrowResult<Container> {
        let op = OperationKind::RetrieveExpired;
        self.transition(caller, reference, op, |c, height| {
            self.authorize(caller, c, &[Role::Originator, Role::Operator], op)?;
            require_status(c, &[Pending, Accepted], op)?;
            window::ensure_expired(c, height)?;
            let to = c.originator.clone();
            Ok(self.drain(c, &to, Expired))
        })
    }

    /// Push the termination height out while the window is still open. No
    /// value moves.
    pub fn extend_timeframe(
        &self,
        caller: &Identity,
        reference: ContainerRef,
        additional_blocks: u64,
    ) -> EscrowResult<Container> {
        let op = OperationKind::ExtendTimeframe;
        self.transition(caller, reference, op, |c, height| {
            self.authorize(caller, c, &[Role::Originator, Role::Beneficiary, Role::Operator], op)?;
            require_status(c, &[Pending, Accepted], op)?;
            window::ensure_within(c, height)?;
            window::extend(c, additional_blocks, &self.config)?;
            Ok(Vec::new())
        })
    }

    // -----------------------------------------------------------------------
    // Emergency controls
    // -----------------------------------------------------------------------

    /// Emergency lock. Restarts `initiation_height` for the cooldown.
    pub fn lockdown(&self, caller: &Identity, reference: ContainerRef) -> EscrowResult<Container> {
        let op = OperationKind::Lockdown;
        self.transition(caller, reference, op, |c, height| {
            self.authorize(caller, c, &[Role::Originator, Role::Beneficiary, Role::Operator], op)?;
            if c.is_terminal() || matches!(c.status, Locked | WithdrawalPending) {
                return Err(status_conflict(c, op));
            }
            c.status = Locked;
            c.initiation_height = height;
            Ok(Vec::new())
        })
    }

    /// Operator lifts a lockdown once the cooldown has elapsed. Any dispute
    /// case the container carried is closed; a new one starts empty.
    pub fn release_lockdown(&self, caller: &Identity, reference: ContainerRef) -> EscrowResult<Container> {
        let op = OperationKind::ReleaseLockdown;
        self.transition(caller, reference, op, |c, height| {
            self.authorize(caller, c, &[Role::Operator], op)?;
            require_status(c, &[Locked], op)?;
            window::ensure_elapsed(c.initiation_height, self.config.lockdown_cooldown_blocks, height)?;
            if let Some(case) = c.dispute.take() {
                debug!(%reference, evidence = case.evidence.len(), "dispute case closed on release");
            }
            c.status = Pending;
            Ok(Vec::new())
        })
    }

    /// Manual circuit breaker on a single container. No defined exit other
    /// than lockdown or operator retrieval.
    pub fn freeze(&self, caller: &Identity, reference: ContainerRef) -> EscrowResult<Container> {
        self.suspend(caller, reference, OperationKind::Freeze, Frozen)
    }

    /// Like [`freeze`](Self::freeze), recorded as `halted`.
    pub fn halt(&self, caller: &Identity, reference: ContainerRef) -> EscrowResult<Container> {
        self.suspend(caller, reference, OperationKind::Halt, Halted)
    }

    fn suspend(
        &self,
        caller: &Identity,
        reference: ContainerRef,
        op: OperationKind,
        target: ContainerStatus,
    ) -> EscrowResult<Container> {
        self.transition(caller, reference, op, |c, _| {
            self.authorize(caller, c, &[Role::Originator, Role::Beneficiary, Role::Operator], op)?;
            require_status(c, &[Pending, Accepted, AwaitingAcceptance, Disputed], op)?;
            c.status = target;
            Ok(Vec::new())
        })
    }

    /// Protective hold ahead of a party reassignment or investigation.
    pub fn secure(&self, caller: &Identity, reference: ContainerRef) -> EscrowResult<Container> {
        let op = OperationKind::Secure;
        self.transition(caller, reference, op, |c, _| {
            self.authorize(caller, c, &[Role::Originator, Role::Operator], op)?;
            require_status(c, &[Pending, Accepted], op)?;
            c.status = Secured;
            Ok(Vec::new())
        })
    }

    // -----------------------------------------------------------------------
    // Reassignment
    // -----------------------------------------------------------------------

    /// Hand the beneficiary role to `new_beneficiary`.
    pub fn reassign_beneficiary(
        &self,
        caller: &Identity,
        reference: ContainerRef,
        new_beneficiary: &Identity,
    ) -> EscrowResult<Container> {
        let op = OperationKind::ReassignBeneficiary;
        self.transition(caller, reference, op, |c, _| {
            self.authorize(caller, c, &[Role::Beneficiary, Role::Operator], op)?;
            require_status(c, &[Pending, Accepted], op)?;
            self.check_replacement(c, new_beneficiary)?;
            c.beneficiary = new_beneficiary.clone();
            Ok(Vec::new())
        })
    }

    /// Hand the originator role to `new_originator`.
    pub fn reassign_originator(
        &self,
        caller: &Identity,
        reference: ContainerRef,
        new_originator: &Identity,
    ) -> EscrowResult<Container> {
        let op = OperationKind::ReassignOriginator;
        self.transition(caller, reference, op, |c, _| {
            self.authorize(caller, c, &[Role::Originator, Role::Operator], op)?;
            require_status(c, &[Pending, Accepted], op)?;
            self.check_replacement(c, new_originator)?;
            c.originator = new_originator.clone();
            Ok(Vec::new())
        })
    }

    // -----------------------------------------------------------------------
    // Delayed withdrawal
    // -----------------------------------------------------------------------

    /// Start the withdrawal delay. Afterwards only completion and operator
    /// retrieval apply.
    pub fn begin_withdrawal(&self, caller: &Identity, reference: ContainerRef) -> EscrowResult<Container> {
        let op = OperationKind::BeginWithdrawal;
        self.transition(caller, reference, op, |c, height| {
            self.authorize(caller, c, &[Role::Originator, Role::Operator], op)?;
            require_status(c, &[Pending, Accepted], op)?;
            c.status = WithdrawalPending;
            c.initiation_height = height;
            Ok(Vec::new())
        })
    }

    /// Return the remaining quantity to the originator once the delay has
    /// elapsed since the withdrawal began.
    pub fn complete_withdrawal(&self, caller: &Identity, reference: ContainerRef) -> EscrowResult<Container> {
        let op = OperationKind::CompleteWithdrawal;
        self.transition(caller, reference, op, |c, height| {
            self.authorize(caller, c, &[Role::Originator, Role::Operator], op)?;
            require_status(c, &[WithdrawalPending], op)?;
            window::ensure_elapsed(c.initiation_height, self.config.withdrawal_delay_blocks, height)?;
            let to = c.originator.clone();
            Ok(self.drain(c, &to, Withdrawn))
        })
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Load → validate/mutate → settle → emit, under the reference's lock.
    ///
    /// `apply` mutates a copy of the record and returns the ledger legs the
    /// transition needs. If it fails, nothing was written.
    pub(crate) fn transition<F>(
        &self,
        caller: &Identity,
        reference: ContainerRef,
        op: OperationKind,
        apply: F,
    ) -> EscrowResult<Container>
    where
        F: FnOnce(&mut Container, u64) -> EscrowResult<Vec<TransferLeg>>,
    {
        self.check_reference(reference)?;

        let lock = self.lock_for(reference);
        let _held = lock.lock();

        let current = self
            .store
            .get(reference)?
            .ok_or(EscrowError::ContainerMissing(reference))?;

        let height = self.height.current_height();
        self.admit(caller, op, height)?;

        let mut next = current.clone();
        let legs = apply(&mut next, height).map_err(|err| {
            debug!(%reference, %caller, operation = %op, error = %err, "operation rejected");
            err
        })?;
        next.version = current.version + 1;

        settle(
            &*self.ledger,
            &self.store,
            legs.clone(),
            Commit::Update {
                expected_version: current.version,
                container: &next,
            },
        )?;

        info!(
            %reference,
            %caller,
            operation = %op,
            from = %current.status,
            to = %next.status,
            quantity = next.quantity,
            "container transition"
        );
        self.emit(op, caller, height, Some(current.status), &next, &legs);
        Ok(next)
    }

    fn check_reference(&self, reference: ContainerRef) -> EscrowResult<()> {
        let latest = self.store.latest_reference()?;
        if reference.0 == 0 || reference > latest {
            return Err(EscrowError::InvalidReference { reference, latest });
        }
        Ok(())
    }

    fn lock_for(&self, reference: ContainerRef) -> Arc<Mutex<()>> {
        self.locks.entry(reference).or_default().clone()
    }

    fn admit(&self, caller: &Identity, op: OperationKind, height: u64) -> EscrowResult<()> {
        self.policy
            .admit(caller, op, height)
            .map_err(|rejection| EscrowError::PolicyRejected {
                operation: op,
                reason: rejection.to_string(),
            })
    }

    pub(crate) fn authorize(
        &self,
        caller: &Identity,
        container: &Container,
        allowed: &[Role],
        op: OperationKind,
    ) -> EscrowResult<()> {
        let permitted = allowed.iter().any(|role| match role {
            Role::Originator => *caller == container.originator,
            Role::Beneficiary => *caller == container.beneficiary,
            Role::Operator => *caller == self.config.operator,
        });
        if permitted {
            Ok(())
        } else {
            Err(EscrowError::AccessDenied {
                actor: caller.clone(),
                operation: op,
            })
        }
    }

    /// Creation-time party rules.
    fn check_new_parties(&self, originator: &Identity, beneficiary: &Identity) -> EscrowResult<()> {
        if originator.is_empty() || beneficiary.is_empty() {
            return Err(EscrowError::InvalidOriginatorOrBeneficiary(
                "parties must be non-empty identities".into(),
            ));
        }
        if originator == beneficiary {
            return Err(EscrowError::InvalidOriginatorOrBeneficiary(
                "beneficiary must differ from originator".into(),
            ));
        }
        if *beneficiary == self.config.custodian || *originator == self.config.custodian {
            return Err(EscrowError::InvalidOriginatorOrBeneficiary(
                "the custodial identity cannot be a party".into(),
            ));
        }
        Ok(())
    }

    /// Reassignment rules: the newcomer must be a genuinely new party.
    fn check_replacement(&self, container: &Container, newcomer: &Identity) -> EscrowResult<()> {
        if newcomer.is_empty() {
            return Err(EscrowError::InvalidOriginatorOrBeneficiary(
                "new party must be a non-empty identity".into(),
            ));
        }
        if container.is_party(newcomer) {
            return Err(EscrowError::InvalidOriginatorOrBeneficiary(format!(
                "{newcomer} is already a party to container {}",
                container.reference
            )));
        }
        if *newcomer == self.config.custodian {
            return Err(EscrowError::InvalidOriginatorOrBeneficiary(
                "the custodial identity cannot be a party".into(),
            ));
        }
        Ok(())
    }

    /// Pay `amount` to the beneficiary out of custody.
    fn release(&self, container: &mut Container, amount: u64) -> TransferLeg {
        container.quantity -= amount;
        if container.quantity == 0 {
            container.status = Completed;
        }
        TransferLeg::new(amount, &self.config.custodian, &container.beneficiary)
    }

    /// Pay out everything to `to` and land in the terminal `status`.
    fn drain(&self, container: &mut Container, to: &Identity, status: ContainerStatus) -> Vec<TransferLeg> {
        let amount = std::mem::take(&mut container.quantity);
        container.status = status;
        vec![self.payout(amount, to)]
    }

    pub(crate) fn payout(&self, amount: u64, to: &Identity) -> TransferLeg {
        TransferLeg::new(amount, &self.config.custodian, to)
    }

    fn emit(
        &self,
        op: OperationKind,
        caller: &Identity,
        height: u64,
        from: Option<ContainerStatus>,
        container: &Container,
        legs: &[TransferLeg],
    ) {
        let moved: u64 = legs.iter().map(|l| l.amount).sum();
        let mut event = Event::new(op.as_str(), container.reference.to_string(), caller, height)
            .with("to", container.status.as_str())
            .with("quantity", container.quantity)
            .with("moved", moved)
            .with("originator", container.originator.as_str())
            .with("beneficiary", container.beneficiary.as_str())
            .with("termination_height", container.termination_height);
        if let Some(from) = from {
            event = event.with("from", from.as_str());
        }
        if !legs.is_empty() {
            event = event.with(
                "legs",
                serde_json::to_value(legs).unwrap_or(serde_json::Value::Null),
            );
        }
        self.sink.record(event);
    }
}

pub(crate) fn require_status(container: &Container, allowed: &[ContainerStatus], op: OperationKind) -> EscrowResult<()> {
    if allowed.contains(&container.status) {
        Ok(())
    } else {
        Err(status_conflict(container, op))
    }
}

pub(crate) fn status_conflict(container: &Container, op: OperationKind) -> EscrowError {
    EscrowError::StatusConflict {
        current: container.status,
        operation: op,
    }
}

/// Phased containers pay out only through `release_phase`.
fn ensure_unphased(c: &Container) -> EscrowResult<()> {
    match &c.schedule {
        Some(schedule) => Err(EscrowError::InvalidQuantity(format!(
            "container releases in {} phases; use release_phase",
            schedule.interval_count
        ))),
        None => Ok(()),
    }
}

/// Validate a phased creation and build its schedule.
fn phase_schedule(quantity: u64, intervals: u32, interval_blocks: u64, height: u64) -> EscrowResult<PhaseSchedule> {
    if intervals == 0 || interval_blocks == 0 {
        return Err(EscrowError::InvalidQuantity(
            "phased containers need at least one interval of at least one block".into(),
        ));
    }
    if quantity % u64::from(intervals) != 0 {
        return Err(EscrowError::InvalidQuantity(format!(
            "{quantity} does not divide evenly into {intervals} intervals"
        )));
    }
    Ok(PhaseSchedule {
        interval_count: intervals,
        per_interval: quantity / u64::from(intervals),
        interval_blocks,
        start_height: height,
        released: 0,
    })
}
