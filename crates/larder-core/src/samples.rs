// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Durable bookkeeping records: accesses and serialization performance.

use std::time::{Duration, SystemTime};

use crate::entity_hash::EntityHash;

/// One access to a cache entry. Accesses form an append-only log per entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AccessRecord {
    /// The accessed entry's logical key.
    pub logical_key: EntityHash,
    /// When the access happened.
    pub timestamp: SystemTime,
}

/// One observation of (de)serialization performance for a class of items.
///
/// Samples are one-sided: the admission path measures serialization only,
/// the hit path measures deserialization only. Absent durations are `None`,
/// and summaries average over present values.
#[derive(Clone, Debug, PartialEq)]
pub struct SerializationSample {
    /// Serialization-performance class the sample belongs to.
    pub class: String,
    /// When the sample was taken.
    pub timestamp: SystemTime,
    /// Wall-clock serialization time, if this sample measured one.
    pub serialize_duration: Option<Duration>,
    /// Wall-clock deserialization time, if this sample measured one.
    pub deserialize_duration: Option<Duration>,
    /// Size of the serialized form, in bytes.
    pub serialized_size: u64,
    /// In-memory size of the object, when the producer can report it.
    pub in_memory_size: Option<u64>,
}

/// Aggregate over the retained samples of one serialization class.
///
/// Recorded for a future admission model; nothing feeds back into the
/// utility function yet.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SerializationSummary {
    /// Mean serialization time over samples that measured one.
    pub mean_serialize: Option<Duration>,
    /// Mean deserialization time over samples that measured one.
    pub mean_deserialize: Option<Duration>,
    /// Number of samples that matched the filters.
    pub sample_count: u64,
    /// Timestamp of the oldest matching sample.
    pub oldest_sample: Option<SystemTime>,
}
