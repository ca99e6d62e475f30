//! # Container Store
//!
//! Durable mapping from [`ContainerRef`] to [`Container`], plus ownership of
//! the reference sequence. The store has no escrow logic. It enforces only
//! two structural rules:
//!
//! 1. **Dense sequence.** `insert` accepts exactly `latest + 1`. References
//!    are never reused and a failed creation leaves no gap, because the
//!    engine only inserts after the escrow transfer succeeded.
//! 2. **Versioned writes.** `compare_and_swap` replaces a record only if the
//!    stored version matches the one the caller read. A stale writer gets
//!    [`StoreError::VersionConflict`] instead of silently clobbering a newer
//!    state.
//!
//! Two backends ship with the engine: [`MemoryContainerStore`] (DashMap) and
//! [`SledContainerStore`] (sled + bincode).

mod memory;
mod sled_store;

use thiserror::Error;

use crate::container::{Container, ContainerRef};

pub use self::memory::MemoryContainerStore;
pub use self::sled_store::SledContainerStore;

/// Errors raised by a container store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("out-of-sequence insert: expected reference {expected}, got {got}")]
    OutOfSequence {
        expected: ContainerRef,
        got: ContainerRef,
    },

    #[error("version conflict on container {reference}: expected {expected}, found {found}")]
    VersionConflict {
        reference: ContainerRef,
        expected: u64,
        found: u64,
    },

    #[error("container {0} not stored")]
    NotFound(ContainerRef),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Storage contract for container records.
pub trait ContainerStore: Send + Sync {
    /// Highest reference issued so far; `ContainerRef(0)` when empty.
    fn latest_reference(&self) -> StoreResult<ContainerRef>;

    fn get(&self, reference: ContainerRef) -> StoreResult<Option<Container>>;

    /// Insert a new record whose reference must be `latest + 1`. Advances
    /// the sequence atomically with the insert.
    fn insert(&self, container: &Container) -> StoreResult<()>;

    /// Replace the record for `container.reference` iff its stored version
    /// equals `expected_version`.
    fn compare_and_swap(&self, expected_version: u64, container: &Container) -> StoreResult<()>;

    /// Every stored record, in reference order.
    fn scan(&self) -> StoreResult<Vec<Container>>;
}
