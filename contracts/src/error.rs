//! # Escrow Errors
//!
//! One enum for every way an engine operation can fail. Checks are
//! fail-fast and side-effect free: if an operation returns one of these,
//! the container record and the ledger are exactly as they were before the
//! call. Replaying the call against the same state yields the same error,
//! which is why the type is `Clone + PartialEq`.

use holdfast_protocol::{Identity, LedgerError};
use thiserror::Error;

use crate::container::{ContainerRef, ContainerStatus};
use crate::operation::OperationKind;
use crate::store::StoreError;

/// Errors that can occur during escrow operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EscrowError {
    /// The caller lacks the role this operation requires.
    #[error("access denied: {actor} may not {operation}")]
    AccessDenied {
        /// The identity that made the call.
        actor: Identity,
        /// The operation it attempted.
        operation: OperationKind,
    },

    /// The reference was issued but no record exists for it.
    #[error("container {0} not found")]
    ContainerMissing(ContainerRef),

    /// The reference has never been issued.
    #[error("invalid reference {reference}: latest issued is {latest}")]
    InvalidReference {
        /// The reference the caller supplied.
        reference: ContainerRef,
        /// The highest reference issued so far.
        latest: ContainerRef,
    },

    /// The container's status does not permit this operation.
    #[error("cannot {operation} a container that is {current}")]
    StatusConflict {
        /// The container's status at the time of the call.
        current: ContainerStatus,
        /// The operation that status does not allow.
        operation: OperationKind,
    },

    /// An amount, interval, percentage or extension is out of range.
    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),

    /// A party is ineligible (self-dealing, the custodian, or unchanged).
    #[error("invalid originator or beneficiary: {0}")]
    InvalidOriginatorOrBeneficiary(String),

    /// A height-window check failed, in either direction.
    #[error("timeframe exceeded: height {height}, boundary {boundary}")]
    TimeframeExceeded {
        /// The height the check ran at.
        height: u64,
        /// The window edge or unlock height that was violated.
        boundary: u64,
    },

    /// The underlying value transfer failed; nothing moved.
    #[error("distribution failed: {0}")]
    DistributionFailed(String),

    /// An admission policy refused the operation before it was attempted.
    #[error("{operation} rejected by policy: {reason}")]
    PolicyRejected {
        /// The operation that was refused.
        operation: OperationKind,
        /// Which policy refused it, and why.
        reason: String,
    },

    /// The container store failed or a concurrent write won the race.
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<LedgerError> for EscrowError {
    fn from(err: LedgerError) -> Self {
        EscrowError::DistributionFailed(err.to_string())
    }
}

impl From<StoreError> for EscrowError {
    fn from(err: StoreError) -> Self {
        EscrowError::Storage(err.to_string())
    }
}

pub type EscrowResult<T> = Result<T, EscrowError>;
