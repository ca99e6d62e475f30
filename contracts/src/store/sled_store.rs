//! sled-backed container store.
//!
//! ## Tree Layout
//!
//! | Tree         | Key                      | Value                |
//! |--------------|--------------------------|----------------------|
//! | `containers` | `reference` (8B BE)      | `bincode(Container)` |
//! | `metadata`   | `latest_reference`       | `reference` (8B BE)  |
//!
//! References are big-endian so sled's lexicographic order matches numeric
//! order and `scan` comes back sorted for free.
//!
//! Inserts run as a sled transaction across both trees, so the record and
//! the sequence bump land together or not at all. Updates use sled's native
//! `compare_and_swap` on the serialized bytes that were version-checked.

use std::path::Path;

use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Db, Transactional, Tree};

use super::{ContainerStore, StoreError, StoreResult};
use crate::container::{Container, ContainerRef};

/// Well-known key in the `metadata` tree for the sequence head.
const META_LATEST_REFERENCE: &[u8] = b"latest_reference";

/// Persistent container store.
#[derive(Debug, Clone)]
pub struct SledContainerStore {
    db: Db,
    containers: Tree,
    metadata: Tree,
}

impl SledContainerStore {
    /// Open or create a store at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let db = sled::open(path).map_err(backend)?;
        Self::from_db(db)
    }

    /// A store that lives in a temp directory and vanishes on drop.
    pub fn open_temporary() -> StoreResult<Self> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(backend)?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> StoreResult<Self> {
        let containers = db.open_tree("containers").map_err(backend)?;
        let metadata = db.open_tree("metadata").map_err(backend)?;
        Ok(Self {
            db,
            containers,
            metadata,
        })
    }

    /// Flush dirty buffers to disk.
    pub fn flush(&self) -> StoreResult<()> {
        self.db.flush().map_err(backend)?;
        Ok(())
    }
}

fn backend(err: sled::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

fn encode(container: &Container) -> StoreResult<Vec<u8>> {
    bincode::serialize(container).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn decode(bytes: &[u8]) -> StoreResult<Container> {
    bincode::deserialize(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn decode_reference(bytes: &[u8]) -> StoreResult<ContainerRef> {
    let arr: [u8; 8] = bytes
        .try_into()
        .map_err(|_| StoreError::Serialization("corrupt reference key".into()))?;
    Ok(ContainerRef(u64::from_be_bytes(arr)))
}

impl ContainerStore for SledContainerStore {
    fn latest_reference(&self) -> StoreResult<ContainerRef> {
        match self.metadata.get(META_LATEST_REFERENCE).map_err(backend)? {
            Some(bytes) => decode_reference(&bytes),
            None => Ok(ContainerRef(0)),
        }
    }

    fn get(&self, reference: ContainerRef) -> StoreResult<Option<Container>> {
        match self.containers.get(reference.to_key()).map_err(backend)? {
            Some(bytes) => decode(&bytes).map(Some),
            None => Ok(None),
        }
    }

    fn insert(&self, container: &Container) -> StoreResult<()> {
        let bytes = encode(container)?;
        let key = container.reference.to_key();

        let result = (&self.containers, &self.metadata).transaction(|(containers, metadata)| {
            let latest = match metadata.get(META_LATEST_REFERENCE)? {
                Some(raw) => decode_reference(&raw).map_err(ConflictableTransactionError::Abort)?,
                None => ContainerRef(0),
            };
            let expected = latest.next();
            if container.reference != expected {
                return Err(ConflictableTransactionError::Abort(StoreError::OutOfSequence {
                    expected,
                    got: container.reference,
                }));
            }
            containers.insert(&key[..], bytes.as_slice())?;
            metadata.insert(META_LATEST_REFERENCE, &key[..])?;
            Ok(())
        });

        match result {
            Ok(()) => Ok(()),
            Err(TransactionError::Abort(err)) => Err(err),
            Err(TransactionError::Storage(err)) => Err(backend(err)),
        }
    }

    fn compare_and_swap(&self, expected_version: u64, container: &Container) -> StoreResult<()> {
        let key = container.reference.to_key();
        let current = self
            .containers
            .get(key)
            .map_err(backend)?
            .ok_or(StoreError::NotFound(container.reference))?;

        let stored = decode(&current)?;
        if stored.version != expected_version {
            return Err(StoreError::VersionConflict {
                reference: container.reference,
                expected: expected_version,
                found: stored.version,
            });
        }

        let next = encode(container)?;
        self.containers
            .compare_and_swap(key, Some(current), Some(next))
            .map_err(backend)?
            .map_err(|_| StoreError::VersionConflict {
                reference: container.reference,
                expected: expected_version,
                found: expected_version + 1,
            })?;
        Ok(())
    }

    fn scan(&self) -> StoreResult<Vec<Container>> {
        self.containers
            .iter()
            .values()
            .map(|value| decode(&value.map_err(backend)?))
            .collect()
    }
}
