// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Mock producer for exercising admission and eviction without burning
//! real compute time or disk.
//!
//! A [`MockProducer`] declares its compute time and serialized size up
//! front. The engine uses the declared duration instead of the wall clock,
//! and the declared size for the admission decision; the payload itself is
//! a deterministic byte pattern of exactly the declared size, so storage
//! accounting and hashing behave like the real thing.

use std::collections::BTreeMap;
use std::time::Duration;

use larder_core::{pretty_duration, pretty_size, ArtifactKey, EntityHash};

use crate::error::ProducerError;
use crate::producer::Producer;

/// Producer with declared compute time and size.
#[derive(Debug, Clone)]
pub struct MockProducer {
    logical_key: EntityHash,
    compute_time: Duration,
    size_bytes: u64,
}

impl MockProducer {
    /// Declare a computation of `compute_time` yielding `size_bytes` of
    /// serialized output. The logical key is derived from both, so two
    /// mocks with the same declaration are the same invocation.
    pub fn new(compute_time: Duration, size_bytes: u64) -> Self {
        let descriptor = format!(
            "{} and {}",
            pretty_size(size_bytes),
            pretty_duration(compute_time)
        );
        Self {
            logical_key: EntityHash::of_bytes(descriptor.as_bytes()),
            compute_time,
            size_bytes,
        }
    }

    /// Override the derived logical key, making otherwise-identical
    /// declarations distinct invocations.
    pub fn with_key(mut self, logical_key: EntityHash) -> Self {
        self.logical_key = logical_key;
        self
    }

    /// The declared serialized size.
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// The declared compute time.
    pub fn compute_time(&self) -> Duration {
        self.compute_time
    }

    fn payload(&self) -> Vec<u8> {
        let pattern = self.logical_key.as_bytes();
        let size = self.size_bytes as usize;
        let mut bytes = Vec::with_capacity(size);
        while bytes.len() + pattern.len() <= size {
            bytes.extend_from_slice(pattern);
        }
        bytes.extend_from_slice(&pattern[..size - bytes.len()]);
        bytes
    }
}

impl Producer for MockProducer {
    type Item = Vec<u8>;

    fn logical_key(&self) -> EntityHash {
        self.logical_key
    }

    fn compute(&mut self) -> Vec<u8> {
        // No sleep: the declared duration stands in for the wall clock.
        self.payload()
    }

    fn serialize(&self, item: &Vec<u8>) -> Result<Vec<u8>, ProducerError> {
        Ok(item.clone())
    }

    fn instantiate(
        &self,
        bytes: &[u8],
        auxiliaries: Option<&BTreeMap<String, ArtifactKey>>,
    ) -> Result<Vec<u8>, ProducerError> {
        if auxiliaries.is_some() {
            return Err(ProducerError::UnexpectedAuxiliaries);
        }
        Ok(bytes.to_vec())
    }

    fn declared_compute_time(&self) -> Option<Duration> {
        Some(self.compute_time)
    }

    fn estimate_size(&self, _item: &Vec<u8>) -> Option<u64> {
        Some(self.size_bytes)
    }

    fn in_memory_size(&self, item: &Vec<u8>) -> Option<u64> {
        Some(item.len() as u64)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // ── 1. payload honors the declared size and is deterministic ────────

    #[test]
    fn payload_size_and_determinism() {
        let mut a = MockProducer::new(Duration::from_secs(5), 1234);
        let mut b = a.clone();
        let pa = a.compute();
        let pb = b.compute();
        assert_eq!(pa.len(), 1234);
        assert_eq!(pa, pb);
    }

    // ── 2. same declaration, same key; with_key overrides ───────────────

    #[test]
    fn keys_follow_declaration() {
        let a = MockProducer::new(Duration::from_secs(5), 100);
        let b = MockProducer::new(Duration::from_secs(5), 100);
        let c = MockProducer::new(Duration::from_secs(6), 100);
        assert_eq!(a.logical_key(), b.logical_key());
        assert_ne!(a.logical_key(), c.logical_key());

        let forced = MockProducer::new(Duration::from_secs(5), 100)
            .with_key(EntityHash::of_bytes(b"forced"));
        assert_ne!(forced.logical_key(), a.logical_key());
    }

    // ── 3. round-trip and auxiliary rejection ───────────────────────────

    #[test]
    fn round_trip_and_aux_rejection() {
        let mut producer = MockProducer::new(Duration::from_secs(1), 64);
        let item = producer.compute();
        let bytes = producer.serialize(&item).unwrap();
        assert_eq!(producer.instantiate(&bytes, None).unwrap(), item);

        let aux: BTreeMap<String, ArtifactKey> =
            [("t".to_owned(), ArtifactKey::path("t.bin"))].into();
        assert!(matches!(
            producer.instantiate(&bytes, Some(&aux)).unwrap_err(),
            ProducerError::UnexpectedAuxiliaries
        ));
    }
}
