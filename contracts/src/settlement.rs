//! # Settlement
//!
//! Binds a ledger movement and a container write into one unit. The ledger
//! goes first, then the store. If the store write fails after the ledger
//! moved value, the movement is reversed before the error is reported, so
//! callers never observe value that moved without a matching record (or a
//! record without its value).
//!
//! Multi-leg movements (adjudication payouts) go through
//! [`ValueLedger::transfer_batch`], which is all-or-nothing by contract.
//! Zero-amount legs are dropped before they reach the ledger.

use holdfast_protocol::{TransferLeg, ValueLedger};
use tracing::{debug, error};

use crate::container::Container;
use crate::error::{EscrowError, EscrowResult};
use crate::store::ContainerStore;

/// How the container is written once value has moved.
pub(crate) enum Commit<'a> {
    /// First write of a freshly created container.
    Insert(&'a Container),
    /// Versioned overwrite of an existing container.
    Update {
        expected_version: u64,
        container: &'a Container,
    },
}

impl Commit<'_> {
    fn apply(&self, store: &dyn ContainerStore) -> EscrowResult<()> {
        match self {
            Commit::Insert(c) => store.insert(c)?,
            Commit::Update {
                expected_version,
                container,
            } => store.compare_and_swap(*expected_version, container)?,
        }
        Ok(())
    }

    fn container(&self) -> &Container {
        match self {
            Commit::Insert(c) => c,
            Commit::Update { container, .. } => container,
        }
    }
}

/// Move `legs` and persist `commit` as one unit.
pub(crate) fn settle(
    ledger: &dyn ValueLedger,
    store: &dyn ContainerStore,
    legs: Vec<TransferLeg>,
    commit: Commit<'_>,
) -> EscrowResult<()> {
    let legs: Vec<TransferLeg> = legs.into_iter().filter(|l| l.amount > 0).collect();
    let reference = commit.container().reference;

    if !legs.is_empty() {
        ledger.transfer_batch(&legs).map_err(|err| {
            debug!(%reference, error = %err, "ledger rejected settlement");
            EscrowError::from(err)
        })?;
    }

    if let Err(err) = commit.apply(store) {
        if !legs.is_empty() {
            let undo: Vec<TransferLeg> = legs.iter().rev().map(TransferLeg::reversed).collect();
            if let Err(undo_err) = ledger.transfer_batch(&undo) {
                error!(
                    %reference,
                    store_error = %err,
                    ledger_error = %undo_err,
                    "settlement compensation failed; ledger and store disagree"
                );
            }
        }
        return Err(err);
    }

    Ok(())
}
