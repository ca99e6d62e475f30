//! DashMap-backed container store.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::{ContainerStore, StoreError, StoreResult};
use crate::container::{Container, ContainerRef};

/// In-memory store. Records are sharded across a `DashMap`; the sequence is
/// an atomic counter.
///
/// A record is written before the sequence advances past it, so a reader
/// that first checks `reference <= latest` never observes a half-inserted
/// container.
#[derive(Debug, Default)]
pub struct MemoryContainerStore {
    records: DashMap<ContainerRef, Container>,
    latest: AtomicU64,
}

impl MemoryContainerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl ContainerStore for MemoryContainerStore {
    fn latest_reference(&self) -> StoreResult<ContainerRef> {
        Ok(ContainerRef(self.latest.load(Ordering::Acquire)))
    }

    fn get(&self, reference: ContainerRef) -> StoreResult<Option<Container>> {
        Ok(self.records.get(&reference).map(|r| r.value().clone()))
    }

    fn insert(&self, container: &Container) -> StoreResult<()> {
        let current = self.latest.load(Ordering::Acquire);
        let expected = ContainerRef(current + 1);
        if container.reference != expected {
            return Err(StoreError::OutOfSequence {
                expected,
                got: container.reference,
            });
        }

        match self.records.entry(container.reference) {
            Entry::Occupied(_) => {
                return Err(StoreError::OutOfSequence {
                    expected: ContainerRef(self.latest.load(Ordering::Acquire) + 1),
                    got: container.reference,
                });
            }
            Entry::Vacant(slot) => {
                slot.insert(container.clone());
            }
        }
        if self
            .latest
            .compare_exchange(current, expected.0, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            // Another insert claimed this slot first; undo ours.
            self.records.remove(&container.reference);
            let now = self.latest.load(Ordering::Acquire);
            return Err(StoreError::OutOfSequence {
                expected: ContainerRef(now + 1),
                got: container.reference,
            });
        }
        Ok(())
    }

    fn compare_and_swap(&self, expected_version: u64, container: &Container) -> StoreResult<()> {
        let mut slot = self
            .records
            .get_mut(&container.reference)
            .ok_or(StoreError::NotFound(container.reference))?;

        if slot.version != expected_version {
            return Err(StoreError::VersionConflict {
                reference: container.reference,
                expected: expected_version,
                found: slot.version,
            });
        }
        *slot = container.clone();
        Ok(())
    }

    fn scan(&self) -> StoreResult<Vec<Container>> {
        let mut all: Vec<Container> = self.records.iter().map(|r| r.value().clone()).collect();
        all.sort_by_key(|c| c.reference);
        Ok(all)
    }
}
