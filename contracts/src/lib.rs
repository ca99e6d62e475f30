//! # Holdfast Escrow Engine
//!
//! Value held in custody between an originator and a beneficiary, released
//! by explicit instruction, returned on reversal or expiry, or split by the
//! protocol operator when the parties disagree.
//!
//! - **Lifecycle** ([`lifecycle::EscrowEngine`]): creation, distribution,
//!   partial and phased release, reversal, expiry, extensions, emergency
//!   controls, reassignment and delayed withdrawal.
//! - **Dispute Resolution**: evidence anchoring and percentage
//!   adjudication paid out as one atomic ledger batch.
//! - **Stores**: the container table, in memory (`dashmap`) or on disk
//!   (`sled`).
//! - **Commands & Attestation**: every operation as serializable data,
//!   optionally signed with Ed25519 and replay-protected by nonce.
//! - **Admission Policies**: rate limits and circuit breakers consulted
//!   before any operation.
//!
//! ## Design Principles
//!
//! 1. A failed operation leaves no trace: no record change, no value moved,
//!    no event.
//! 2. Value and record move together. The ledger is debited/credited and
//!    the container written as one unit.
//! 3. Quantity arithmetic is checked; terminal containers hold zero.
//! 4. State transitions are explicit: enum variants, not boolean flags.
//! 5. Every public type is serializable for scripts, the wire, and storage.

pub mod attestation;
pub mod command;
pub mod container;
pub mod dispute_resolution;
pub mod error;
pub mod lifecycle;
pub mod operation;
pub mod policy;
mod settlement;
pub mod store;
pub mod window;

pub use attestation::{AttestationError, AttestedExecutor, SignedCommand};
pub use command::Command;
pub use container::{Container, ContainerRef, ContainerStatus, ResourceCategory};
pub use dispute_resolution::split_allocation;
pub use error::{EscrowError, EscrowResult};
pub use lifecycle::{CreateRequest, CreationVariant, EscrowEngine};
pub use operation::{OperationCategory, OperationKind};
pub use store::{ContainerStore, MemoryContainerStore, SledContainerStore};
