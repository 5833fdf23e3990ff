// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The metadata store trait and its error taxonomy.

use std::time::{Duration, SystemTime};

use larder_core::{
    AccessRecord, ArtifactKey, CacheEntry, EntityHash, EntryError, ParseHashError,
    SerializationSample, SerializationSummary, StoredArtifact,
};
use thiserror::Error;

/// Durable catalog of cache entries, artifacts, accesses and
/// serialization-performance samples.
///
/// Implementations are single-writer, single-reader from the engine's
/// perspective. Mutations become durable at [`commit`](Self::commit)
/// boundaries only.
pub trait MetadataStore {
    /// Record a new entry and its artifact descriptors.
    ///
    /// # Errors
    ///
    /// [`StoreError::DuplicateKey`] if the logical key is already
    /// cataloged.
    fn insert_entry(&mut self, entry: &CacheEntry) -> Result<(), StoreError>;

    /// Look up an entry by logical key.
    fn entry(&self, logical_key: EntityHash) -> Result<Option<CacheEntry>, StoreError>;

    /// Look up the entry owning a given artifact key, if any.
    fn entry_by_artifact(&self, key: &ArtifactKey) -> Result<Option<CacheEntry>, StoreError>;

    /// Snapshot of all cataloged entries.
    ///
    /// Order is unspecified but stable within one pass.
    fn entries(&self) -> Result<Vec<CacheEntry>, StoreError>;

    /// Remove an entry and its artifact descriptors. Returns whether an
    /// entry was actually removed. Access history is kept when
    /// `retain_history` is set, deleted otherwise.
    fn remove_entry(&mut self, logical_key: EntityHash, retain_history: bool)
        -> Result<bool, StoreError>;

    /// Append one access record.
    fn append_access(&mut self, access: &AccessRecord) -> Result<(), StoreError>;

    /// Timestamp of the most recent access, if any.
    fn last_access(&self, logical_key: EntityHash) -> Result<Option<SystemTime>, StoreError>;

    /// Full access history, oldest first.
    fn access_history(&self, logical_key: EntityHash) -> Result<Vec<SystemTime>, StoreError>;

    /// Append one serialization-performance sample.
    fn append_serialization_sample(
        &mut self,
        sample: &SerializationSample,
    ) -> Result<(), StoreError>;

    /// Aggregate the samples of one class under the given filters.
    fn summarize_serialization(
        &self,
        class: &str,
        filters: &SampleFilters,
    ) -> Result<SerializationSummary, StoreError>;

    /// Attach an auxiliary blob descriptor to an existing entry.
    ///
    /// # Errors
    ///
    /// [`StoreError::DuplicateKey`] if the artifact key is already
    /// cataloged; [`StoreError::Missing`] if the entry is not.
    fn add_artifact_to_entry(
        &mut self,
        logical_key: EntityHash,
        artifact: &StoredArtifact,
    ) -> Result<(), StoreError>;

    /// Flush pending mutations durably and open the next batch.
    fn commit(&mut self) -> Result<(), StoreError>;

    /// Discard pending uncommitted mutations and open the next batch.
    ///
    /// The engine calls this when an operation fails partway, so a later
    /// commit cannot flush a failed operation's leftovers.
    fn rollback(&mut self) -> Result<(), StoreError>;

    /// Release resources. Pending uncommitted mutations are discarded;
    /// subsequent calls fail with [`StoreError::Closed`].
    fn close(&mut self) -> Result<(), StoreError>;
}

/// Filters over serialization samples, all optional and conjunctive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleFilters {
    /// Consider only the `n` most recent samples.
    pub last_n: Option<u64>,
    /// Minimum serialized size, bytes, inclusive.
    pub min_size: Option<u64>,
    /// Maximum serialized size, bytes, inclusive.
    pub max_size: Option<u64>,
    /// Minimum measured serialization duration, inclusive.
    pub min_serialize_duration: Option<Duration>,
}

/// Errors surfaced by metadata stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Inserting under a logical or artifact key that already exists.
    #[error("[STORE_DUPLICATE_KEY] {key} is already cataloged")]
    DuplicateKey {
        /// The offending key, in string form.
        key: String,
    },

    /// Referencing an entry that does not exist.
    #[error("[STORE_MISSING] no entry for {key}")]
    Missing {
        /// The referenced key, in string form.
        key: String,
    },

    /// The store handle was closed.
    #[error("[STORE_CLOSED] metadata store has been closed")]
    Closed,

    /// A persisted row failed model validation on the way out.
    #[error("[STORE_BAD_ROW] {0}")]
    BadRow(#[from] EntryError),

    /// A persisted hash failed to parse on the way out.
    #[error("[STORE_BAD_HASH] {0}")]
    BadHash(#[from] ParseHashError),

    /// Transport-level failure of the embedded database.
    #[error("metadata store unavailable: {0}")]
    Unavailable(#[from] rusqlite::Error),
}
