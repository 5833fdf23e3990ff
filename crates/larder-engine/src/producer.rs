// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The producer contract.
//!
//! A producer describes one computation: how to derive its invocation
//! identity, run it, serialize the result, and reinstantiate it from stored
//! bytes. Producers are ephemeral — the engine never stores one; each is
//! tied to a single `lookup_or_produce` call.

use std::collections::BTreeMap;
use std::time::Duration;

use larder_core::{ArtifactKey, EntityHash};
use larder_storage::StorageModify;

use crate::error::ProducerError;

/// Caller-supplied description of a computation and its codec.
pub trait Producer {
    /// The type the computation yields.
    type Item;

    /// Content-addressed identity of this invocation: a pure, deterministic
    /// fingerprint over the producer's configuration and arguments.
    fn logical_key(&self) -> EntityHash;

    /// Tag grouping items of comparable (de)serialization cost. May be
    /// empty.
    fn serialization_class(&self) -> String {
        String::new()
    }

    /// Run the computation.
    fn compute(&mut self) -> Self::Item;

    /// Serialize a computed item to the bytes stored as the main blob.
    ///
    /// # Errors
    ///
    /// [`ProducerError::Codec`] on codec failure.
    fn serialize(&self, item: &Self::Item) -> Result<Vec<u8>, ProducerError>;

    /// Reinstantiate an item from stored bytes.
    ///
    /// `auxiliaries` maps tags to the auxiliary blob keys recorded with the
    /// entry, `None` when the entry has only its main blob. A producer
    /// whose serialization is self-contained MUST reject a non-`None` map
    /// with [`ProducerError::UnexpectedAuxiliaries`].
    ///
    /// # Errors
    ///
    /// [`ProducerError::Codec`] on codec failure;
    /// [`ProducerError::UnexpectedAuxiliaries`] as above.
    fn instantiate(
        &self,
        bytes: &[u8],
        auxiliaries: Option<&BTreeMap<String, ArtifactKey>>,
    ) -> Result<Self::Item, ProducerError>;

    /// Side-effect blobs the computation wrote directly into storage,
    /// keyed by tag. Empty for self-contained producers (the default).
    ///
    /// Needed when the computation creates state the serialized stream does
    /// not contain — compiled object code next to a compiled model, say.
    fn auxiliary_artifacts(&mut self, storage: &dyn StorageModify) -> BTreeMap<String, ArtifactKey> {
        let _ = storage;
        BTreeMap::new()
    }

    /// The engine has committed to keeping the auxiliaries: the producer
    /// must not delete them on drop. Called only when
    /// [`auxiliary_artifacts`](Self::auxiliary_artifacts) was non-empty and
    /// the entry was admitted.
    fn protect_auxiliaries(&mut self) {}

    /// Propose the main blob's storage key, overriding key generation.
    fn propose_key(&self) -> Option<ArtifactKey> {
        None
    }

    /// Synthetic compute duration declared by mock producers; `None` means
    /// the engine uses its own wall-clock measurement.
    fn declared_compute_time(&self) -> Option<Duration> {
        None
    }

    /// Size of the serialized form, if the producer knows it without
    /// serializing. `None` (the default) makes the engine serialize and
    /// measure; the bytes are kept and reused on admission.
    fn estimate_size(&self, item: &Self::Item) -> Option<u64> {
        let _ = item;
        None
    }

    /// Approximate in-memory size of a computed item, for the
    /// serialization-performance log. Optional.
    fn in_memory_size(&self, item: &Self::Item) -> Option<u64> {
        let _ = item;
        None
    }
}
