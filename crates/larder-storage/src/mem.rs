// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-memory blob store.
//!
//! [`MemStorage`] is the mock backend: a byte-budgeted map holding real
//! blob bytes, so hashing and tamper tests exercise the same code paths as
//! the filesystem backend. Free space is the configured budget minus the
//! bytes stored.

use std::collections::BTreeMap;

use larder_core::{ArtifactKey, EntityHash};

use crate::traits::{StorageError, StorageModify, StorageRead};

/// Byte-budgeted in-memory blob store.
#[derive(Debug)]
pub struct MemStorage {
    blobs: BTreeMap<ArtifactKey, Vec<u8>>,
    total_space: u64,
}

impl MemStorage {
    /// Create an empty store with `total_space` bytes of capacity.
    pub fn new(total_space: u64) -> Self {
        Self {
            blobs: BTreeMap::new(),
            total_space,
        }
    }

    /// Number of blobs currently stored.
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    /// Returns `true` if no blobs are stored.
    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    /// Total bytes stored across all blobs.
    pub fn used_bytes(&self) -> u64 {
        self.blobs.values().map(|b| b.len() as u64).sum()
    }
}

impl StorageRead for MemStorage {
    fn free_space(&self) -> Result<u64, StorageError> {
        Ok(self.total_space.saturating_sub(self.used_bytes()))
    }

    fn storage_id(&self) -> String {
        format!("memory({} bytes)", self.total_space)
    }

    fn exists(&self, key: &ArtifactKey) -> bool {
        self.blobs.contains_key(key)
    }

    fn size(&self, key: &ArtifactKey) -> Result<u64, StorageError> {
        self.blobs
            .get(key)
            .map(|b| b.len() as u64)
            .ok_or_else(|| StorageError::Missing {
                key: key.encode(),
            })
    }

    fn hash(&self, key: &ArtifactKey) -> Result<Option<EntityHash>, StorageError> {
        self.blobs
            .get(key)
            .map(|b| Some(EntityHash::of_bytes(b)))
            .ok_or_else(|| StorageError::Missing {
                key: key.encode(),
            })
    }

    fn remove(&mut self, key: &ArtifactKey) -> bool {
        self.blobs.remove(key).is_some()
    }

    fn close(&mut self) {}
}

impl StorageModify for MemStorage {
    fn save(&mut self, bytes: &[u8], key: &ArtifactKey) -> Result<(), StorageError> {
        if self.blobs.contains_key(key) {
            return Err(StorageError::AlreadyExists {
                key: key.encode(),
            });
        }
        self.blobs.insert(key.clone(), bytes.to_vec());
        Ok(())
    }

    fn load(&self, key: &ArtifactKey) -> Result<Vec<u8>, StorageError> {
        self.blobs
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::Missing {
                key: key.encode(),
            })
    }

    fn canonical_key(&self, key: &ArtifactKey) -> ArtifactKey {
        key.clone()
    }
}
