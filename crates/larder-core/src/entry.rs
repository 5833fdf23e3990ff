// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The logical cache record and its stored-blob descriptors.
//!
//! A [`CacheEntry`] binds one logical key to one or more [`StoredArtifact`]
//! blob descriptors. The constructor enforces the structural invariants that
//! every downstream layer relies on:
//!
//! - the main artifact key is a member of the artifact map;
//! - the artifact map is non-empty;
//! - tags are at most [`MAX_TAG_LEN`] characters, the empty tag marking the
//!   main blob;
//! - blob sizes are positive and weights are positive and finite.
//!
//! The aggregated content hash is a deterministic function of the artifact
//! map: member hashes are folded in ascending [`ArtifactKey`] order, which
//! the backing `BTreeMap` provides by construction.

use std::collections::BTreeMap;
use std::time::Duration;

use thiserror::Error;

use crate::artifact_key::ArtifactKey;
use crate::entity_hash::EntityHash;
use crate::pretty::{pretty_duration, pretty_size};

/// The reserved tag of the main serialized blob.
pub const MAIN_TAG: &str = "";

/// Maximum length of an auxiliary blob tag, in characters.
pub const MAX_TAG_LEN: usize = 10;

/// Descriptor of one stored blob.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredArtifact {
    artifact_key: ArtifactKey,
    tag: String,
    content_hash: Option<EntityHash>,
    size_bytes: u64,
}

impl StoredArtifact {
    /// Build a descriptor, validating the tag and size.
    ///
    /// `content_hash` is `None` when the blob's content digest is unknown:
    /// either the backend cannot hash in principle, or the entry is tracked
    /// without resident blobs and nothing has been serialized yet. Unknown
    /// hashes verify trivially.
    ///
    /// # Errors
    ///
    /// Returns [`EntryError::TagTooLong`] or [`EntryError::ZeroSize`].
    pub fn new(
        artifact_key: ArtifactKey,
        tag: &str,
        content_hash: Option<EntityHash>,
        size_bytes: u64,
    ) -> Result<Self, EntryError> {
        if tag.chars().count() > MAX_TAG_LEN {
            return Err(EntryError::TagTooLong {
                tag: tag.to_owned(),
            });
        }
        if size_bytes == 0 {
            return Err(EntryError::ZeroSize {
                key: artifact_key.encode(),
            });
        }
        Ok(Self {
            artifact_key,
            tag: tag.to_owned(),
            content_hash,
            size_bytes,
        })
    }

    /// The blob's storage key.
    pub fn artifact_key(&self) -> &ArtifactKey {
        &self.artifact_key
    }

    /// The blob's tag; [`MAIN_TAG`] for the main serialized result.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Content digest of the blob, if known.
    pub fn content_hash(&self) -> Option<EntityHash> {
        self.content_hash
    }

    /// Blob size in bytes.
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }
}

/// A single logical cache record.
#[derive(Clone, Debug, PartialEq)]
pub struct CacheEntry {
    logical_key: EntityHash,
    compute_time: Duration,
    weight: f64,
    main_artifact_key: ArtifactKey,
    artifacts: BTreeMap<ArtifactKey, StoredArtifact>,
    serialization_class: String,
}

impl CacheEntry {
    /// Build an entry, validating the structural invariants.
    ///
    /// # Errors
    ///
    /// Returns [`EntryError::NoArtifacts`] for an empty artifact map,
    /// [`EntryError::MissingMainArtifact`] when `main_artifact_key` is not a
    /// member, and [`EntryError::BadWeight`] for a non-positive or
    /// non-finite weight.
    pub fn new(
        logical_key: EntityHash,
        compute_time: Duration,
        weight: f64,
        main_artifact_key: ArtifactKey,
        artifacts: BTreeMap<ArtifactKey, StoredArtifact>,
        serialization_class: String,
    ) -> Result<Self, EntryError> {
        if artifacts.is_empty() {
            return Err(EntryError::NoArtifacts {
                logical_key: logical_key.pretty(),
            });
        }
        if !artifacts.contains_key(&main_artifact_key) {
            return Err(EntryError::MissingMainArtifact {
                key: main_artifact_key.encode(),
            });
        }
        if !(weight.is_finite() && weight > 0.0) {
            return Err(EntryError::BadWeight { weight });
        }
        Ok(Self {
            logical_key,
            compute_time,
            weight,
            main_artifact_key,
            artifacts,
            serialization_class,
        })
    }

    /// The logical key identifying the computation invocation.
    pub fn logical_key(&self) -> EntityHash {
        self.logical_key
    }

    /// Measured (or declared) wall-clock compute time.
    pub fn compute_time(&self) -> Duration {
        self.compute_time
    }

    /// Caller-supplied importance multiplier.
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Key of the main serialized blob. Always a member of
    /// [`artifacts`](Self::artifacts).
    pub fn main_artifact_key(&self) -> &ArtifactKey {
        &self.main_artifact_key
    }

    /// All blob descriptors, keyed by artifact key in ascending order.
    pub fn artifacts(&self) -> &BTreeMap<ArtifactKey, StoredArtifact> {
        &self.artifacts
    }

    /// Serialization-performance class tag; may be empty.
    pub fn serialization_class(&self) -> &str {
        &self.serialization_class
    }

    /// Total size across all blobs, in bytes.
    pub fn size_bytes(&self) -> u64 {
        self.artifacts.values().map(StoredArtifact::size_bytes).sum()
    }

    /// Aggregated content digest: member hashes folded in ascending key
    /// order. `None` if any member hash is unknown — an unverifiable entry.
    pub fn content_hash(&self) -> Option<EntityHash> {
        let mut members = Vec::with_capacity(self.artifacts.len());
        for artifact in self.artifacts.values() {
            members.push(artifact.content_hash()?);
        }
        Some(EntityHash::combine(members.iter()))
    }

    /// Auxiliary blobs keyed by tag, or `None` when the entry has only the
    /// main blob. This is the map handed to a producer's `instantiate`.
    pub fn auxiliaries_by_tag(&self) -> Option<BTreeMap<String, ArtifactKey>> {
        let aux: BTreeMap<String, ArtifactKey> = self
            .artifacts
            .iter()
            .filter(|(key, _)| **key != self.main_artifact_key)
            .map(|(key, artifact)| (artifact.tag().to_owned(), key.clone()))
            .collect();
        if aux.is_empty() {
            None
        } else {
            Some(aux)
        }
    }

    /// Pessimistic merge for a re-seen entry: keep the larger compute time,
    /// adopt the fresh weight. Artifacts and keys are unchanged.
    pub fn merged_with(&self, fresh_compute_time: Duration, fresh_weight: f64) -> Self {
        let mut merged = self.clone();
        merged.compute_time = merged.compute_time.max(fresh_compute_time);
        merged.weight = fresh_weight;
        merged
    }

    /// One-line human description: short key, size and compute time.
    pub fn pretty_description(&self) -> String {
        format!(
            "{}: {} and {}",
            self.logical_key.pretty(),
            pretty_size(self.size_bytes()),
            pretty_duration(self.compute_time),
        )
    }
}

impl std::fmt::Display for CacheEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, " logical key={}", self.logical_key.pretty())?;
        writeln!(f, " main storage key={}", self.main_artifact_key.pretty_shorten(50))?;
        writeln!(f, " object size={}", pretty_size(self.size_bytes()))?;
        writeln!(f, " compute time={}", pretty_duration(self.compute_time))?;
        writeln!(f, " serialization class={}", self.serialization_class)?;
        if (self.weight - 1.0).abs() > f64::EPSILON {
            writeln!(f, " weight={}", self.weight)?;
        }
        Ok(())
    }
}

/// Structural validation errors for entries and artifact descriptors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EntryError {
    /// A tag exceeded [`MAX_TAG_LEN`] characters.
    #[error("[ENTRY_TAG_TOO_LONG] tag {tag:?} exceeds {MAX_TAG_LEN} characters")]
    TagTooLong {
        /// The offending tag.
        tag: String,
    },

    /// A blob descriptor declared a zero size.
    #[error("[ENTRY_ZERO_SIZE] artifact {key} has zero size")]
    ZeroSize {
        /// Encoded artifact key of the offending blob.
        key: String,
    },

    /// The artifact map was empty.
    #[error("[ENTRY_NO_ARTIFACTS] entry {logical_key} has no artifacts")]
    NoArtifacts {
        /// Short logical key of the offending entry.
        logical_key: String,
    },

    /// The main artifact key is not a member of the artifact map.
    #[error("[ENTRY_MAIN_NOT_MEMBER] main artifact {key} missing from artifact map")]
    MissingMainArtifact {
        /// Encoded main artifact key.
        key: String,
    },

    /// Weight was non-positive or non-finite.
    #[error("[ENTRY_BAD_WEIGHT] weight must be positive and finite, got {weight}")]
    BadWeight {
        /// The offending weight.
        weight: f64,
    },
}
