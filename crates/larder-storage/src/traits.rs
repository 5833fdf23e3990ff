// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The blob store trait surfaces and their error taxonomy.

use larder_core::{ArtifactKey, EntityHash};
use thiserror::Error;

/// Read surface of a blob store.
///
/// Object-safe so producers can inspect storage through a `&dyn` seam.
pub trait StorageRead {
    /// Free space in bytes, after any headroom the backend reserves
    /// internally. Re-read on every call; never cached.
    ///
    /// # Errors
    ///
    /// Backend transport failures only.
    fn free_space(&self) -> Result<u64, StorageError>;

    /// Stable identifier of this store, for logs and reports.
    fn storage_id(&self) -> String;

    /// Whether a blob is stored under `key`.
    fn exists(&self, key: &ArtifactKey) -> bool;

    /// Size in bytes of the blob under `key`.
    ///
    /// # Errors
    ///
    /// [`StorageError::Missing`] if nothing is stored there.
    fn size(&self, key: &ArtifactKey) -> Result<u64, StorageError>;

    /// Content digest of the bytes stored under `key`, or `Ok(None)` when
    /// the backend cannot hash in principle (verification then passes
    /// trivially).
    ///
    /// # Errors
    ///
    /// [`StorageError::Missing`] if nothing is stored there; transport
    /// failures if the bytes cannot be read.
    fn hash(&self, key: &ArtifactKey) -> Result<Option<EntityHash>, StorageError>;

    /// Delete the blob under `key`. Returns `true` on success, `false` when
    /// the target was absent or the backend refused.
    fn remove(&mut self, key: &ArtifactKey) -> bool;

    /// Release any resources. Further calls are backend-defined.
    fn close(&mut self);
}

/// Write surface of a blob store.
pub trait StorageModify: StorageRead {
    /// Store `bytes` under `key`.
    ///
    /// # Errors
    ///
    /// [`StorageError::AlreadyExists`] if the key is occupied — no silent
    /// overwrite — plus backend transport failures.
    fn save(&mut self, bytes: &[u8], key: &ArtifactKey) -> Result<(), StorageError>;

    /// Load the blob under `key`.
    ///
    /// # Errors
    ///
    /// [`StorageError::Missing`] if nothing is stored there.
    fn load(&self, key: &ArtifactKey) -> Result<Vec<u8>, StorageError>;

    /// Resolve `key` relative to the backend's root. Idempotent: canonical
    /// keys resolve to themselves.
    fn canonical_key(&self, key: &ArtifactKey) -> ArtifactKey;
}

/// Errors surfaced by blob stores.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading a blob that is not stored.
    #[error("[STORAGE_MISSING] no blob at {key}")]
    Missing {
        /// Encoded key of the absent blob.
        key: String,
    },

    /// Saving to an occupied key.
    #[error("[STORAGE_EXISTS] blob already at {key}; refusing to overwrite")]
    AlreadyExists {
        /// Encoded key of the occupied slot.
        key: String,
    },

    /// The key variant is not addressable by this backend.
    #[error("[STORAGE_BAD_KEY] {key} is not addressable by this backend")]
    BadKey {
        /// Encoded offending key.
        key: String,
    },

    /// Transport-level I/O failure.
    #[error("storage i/o failure at {key}: {source}")]
    Io {
        /// Encoded key (or root) the operation touched.
        key: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}
