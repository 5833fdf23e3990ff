// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Engine error taxonomy.
//!
//! Every public engine operation returns a value or one of these typed
//! kinds. There is no silent fallback: a verify failure surfaces as
//! [`CacheError::Corrupted`] rather than triggering a recompute, and the
//! caller decides what to do with the entry.

use larder_core::{EntityHash, EntryError};
use larder_meta::StoreError;
use larder_storage::StorageError;
use thiserror::Error;

/// Failures a caller-supplied producer can report.
#[derive(Debug, Error)]
pub enum ProducerError {
    /// Auxiliaries were passed to a producer whose serialization is
    /// self-contained.
    #[error("[PRODUCER_UNEXPECTED_AUX] auxiliaries passed to a producer that stores none")]
    UnexpectedAuxiliaries,

    /// The producer's codec failed to serialize or deserialize.
    #[error("codec failure: {0}")]
    Codec(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Errors surfaced by the cache engine.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Verification found stored content whose recomputed hash differs from
    /// the recorded one. The entry is not auto-removed; the caller decides.
    #[error("[CACHE_CORRUPTED] stored content of {logical_key} does not match its recorded hash")]
    Corrupted {
        /// Short logical key of the corrupted entry.
        logical_key: String,
    },

    /// The freshly stored main blob's hash differs from the hash of the
    /// bytes the producer declared.
    #[error("[CACHE_HASH_MISMATCH] blob at {key}: declared {declared}, stored {stored}")]
    HashMismatch {
        /// Encoded artifact key of the blob.
        key: String,
        /// Digest of the serialized bytes the engine saved.
        declared: EntityHash,
        /// Digest the storage backend computed over the stored bytes.
        stored: EntityHash,
    },

    /// A re-seen producer reported a different auxiliary key set than the
    /// catalog recorded — it is not functional over its inputs.
    #[error("[CACHE_NON_FUNCTIONAL_PRODUCER] auxiliary key set changed for {logical_key}")]
    NonFunctionalProducer {
        /// Short logical key of the affected entry.
        logical_key: String,
    },

    /// An auxiliary blob's content changed between observations.
    #[error("[CACHE_AUX_MUTATED] auxiliary {key} changed since it was recorded")]
    AuxiliaryMutated {
        /// Encoded artifact key of the mutated auxiliary.
        key: String,
    },

    /// Storage refused or failed to delete an artifact during eviction or
    /// removal. Entries already evicted in the same pass remain evicted.
    #[error("[CACHE_ARTIFACT_REMOVAL_FAILED] could not remove {key}")]
    ArtifactRemovalFailed {
        /// Encoded artifact key that could not be removed.
        key: String,
    },

    /// A producer failed.
    #[error(transparent)]
    Producer(#[from] ProducerError),

    /// The metadata catalog failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Artifact storage failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// An entry failed model validation while being built.
    #[error(transparent)]
    Model(#[from] EntryError),
}
