// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Admission scenarios over the in-memory cache.
//!
//! These drive the engine end-to-end with mock producers: declared compute
//! times and sizes, real bytes in storage, real SQLite catalog in memory.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use larder_core::{CacheConfig, EntityHash};
use larder_engine::{mem_cache, MockProducer, Producer};
use larder_storage::StorageRead as _;
use rand::rngs::StdRng;
use rand::{Rng as _, SeedableRng as _};

const GIB: u64 = 1 << 30;
const MIB: u64 = 1 << 20;
const KIB: u64 = 1 << 10;

// ── 1. small-and-slow wins ──────────────────────────────────────────────
// 10 GiB of space, 1 GiB reserved: five minutes of compute for 128 bytes
// is an easy admit.

#[test]
fn small_and_slow_wins() {
    let config = CacheConfig {
        reserved_free_space_bytes: GIB,
        ..CacheConfig::default()
    };
    let mut cache = mem_cache(10 * GIB, config).unwrap();

    let mut producer = MockProducer::new(Duration::from_secs(300), 128);
    cache.get(&mut producer).unwrap();

    let entry = cache.entry_info(producer.logical_key()).unwrap().unwrap();
    assert!(cache.is_resident(&entry));
    assert!(cache.utility_of(&entry).unwrap() > 0.0);
    assert!(cache.storage().exists(entry.main_artifact_key()));
    assert_eq!(cache.access_history(entry.logical_key()).unwrap().len(), 1);
}

// ── 2. large-and-fast loses ─────────────────────────────────────────────
// Zero compute time buys nothing; a 1 MiB result is tracked but never
// stored.

#[test]
fn large_and_fast_loses() {
    let config = CacheConfig {
        reserved_free_space_bytes: GIB,
        ..CacheConfig::default()
    };
    let mut cache = mem_cache(10 * GIB, config).unwrap();

    let mut producer = MockProducer::new(Duration::ZERO, MIB);
    let item = cache.get(&mut producer).unwrap();
    assert_eq!(item.len(), MIB as usize);

    let entry = cache.entry_info(producer.logical_key()).unwrap().unwrap();
    assert!(!cache.is_resident(&entry));
    assert!(cache.utility_of(&entry).unwrap() < 0.0);
    assert!(!cache.storage().exists(entry.main_artifact_key()));
    assert!(cache.storage().is_empty());
    // Tracked: the access is still on record.
    assert_eq!(cache.access_history(entry.logical_key()).unwrap().len(), 1);
}

// ── 3. mock budget: hit serves stored bytes, one access per call ────────

#[test]
fn hit_increments_access_once() {
    let mut cache = mem_cache(100_000_000, CacheConfig::default()).unwrap();

    let mut producer = MockProducer::new(Duration::from_secs(5), 500 * KIB);
    let first = cache.get(&mut producer).unwrap();
    let key = producer.logical_key();
    assert_eq!(cache.access_history(key).unwrap().len(), 1);

    let mut again = MockProducer::new(Duration::from_secs(5), 500 * KIB);
    assert_eq!(again.logical_key(), key);
    let second = cache.get(&mut again).unwrap();

    assert_eq!(first, second);
    assert_eq!(cache.access_history(key).unwrap().len(), 2);
    let entry = cache.entry_info(key).unwrap().unwrap();
    assert!(cache.is_resident(&entry));
}

// ── 4. occupancy and size summaries track admissions ────────────────────

#[test]
fn size_summary_splits_resident_and_tracked() {
    let config = CacheConfig {
        reserved_free_space_bytes: GIB,
        ..CacheConfig::default()
    };
    let mut cache = mem_cache(10 * GIB, config).unwrap();

    let mut stored = MockProducer::new(Duration::from_secs(300), 4 * KIB);
    let mut rejected = MockProducer::new(Duration::ZERO, MIB);
    cache.get(&mut stored).unwrap();
    cache.get(&mut rejected).unwrap();

    let (resident_size, resident_count) = cache.size_summary(Some(true)).unwrap();
    let (tracked_size, tracked_count) = cache.size_summary(Some(false)).unwrap();
    let (total_size, total_count) = cache.size_summary(None).unwrap();
    assert_eq!(resident_count, 1);
    assert_eq!(resident_size, 4 * KIB);
    assert_eq!(tracked_count, 1);
    assert_eq!(tracked_size, MIB);
    assert_eq!(total_count, 2);
    assert_eq!(total_size, resident_size + tracked_size);

    let report = cache.contents_report().unwrap();
    assert_eq!(report.lines().count(), 2);
    let occupancy = cache.occupancy_report().unwrap();
    assert!(occupancy.contains("1 of 2 seen entries stored"));
}

// ── 5. eviction sweep under pressure (seeded) ───────────────────────────
// 1,001 draws of exponential sizes and times against a 100 MB budget. The
// reserved floor must never be crossed, and whatever survives each sweep
// must score non-negative.

#[test]
fn sweep_under_pressure_holds_invariants() {
    const TOTAL: u64 = 100_000_000;
    const RESERVED: u64 = 10_000_000;
    let config = CacheConfig {
        reserved_free_space_bytes: RESERVED,
        ..CacheConfig::default()
    };
    let mut cache = mem_cache(TOTAL, config).unwrap();

    let mut rng = StdRng::seed_from_u64(123);
    let exponential = |rng: &mut StdRng, mean: f64| -> f64 {
        let u: f64 = rng.gen_range(0.0..1.0);
        -mean * (1.0 - u).ln()
    };

    for i in 0_u32..1001 {
        let size = exponential(&mut rng, 10.0 * MIB as f64).max(1.0) as u64;
        let secs = exponential(&mut rng, 30.0);
        let mut producer = MockProducer::new(Duration::from_secs_f64(secs), size)
            .with_key(EntityHash::of_bytes(&i.to_le_bytes()));

        let known = cache.entry_info(producer.logical_key()).unwrap();
        if known.is_none() {
            cache.get(&mut producer).unwrap();
            let entry = cache.entry_info(producer.logical_key()).unwrap().unwrap();
            if cache.is_resident(&entry) {
                cache.evict(false).unwrap();
            }
        }

        assert!(
            cache.free_space().unwrap() >= RESERVED,
            "reserved floor crossed at iteration {i}"
        );

        if i % 200 == 0 {
            // Drain residual sweeps: the heap is ordered by the scores at
            // the start of a pass, so one pass can leave a straggler.
            while cache.evict(false).unwrap() > 0 {}
            for entry in cache.entries(true).unwrap() {
                assert!(
                    cache.utility_of(&entry).unwrap() >= 0.0,
                    "surviving entry {} scores negative",
                    entry.pretty_description()
                );
            }
        }
    }

    // The budget can never hold the whole stream; rejections must exist.
    let (_, total_seen) = cache.size_summary(None).unwrap();
    let (_, resident) = cache.size_summary(Some(true)).unwrap();
    assert_eq!(total_seen, 1001);
    assert!(resident < total_seen);
}

// ── 6. tracked entry is re-admitted once it earns its keep ──────────────
// Same logical key, first seen with zero compute (rejected), later seen
// expensive: the entry moves Tracked → Resident with the pessimistic
// compute-time merge.

#[test]
fn tracked_entry_readmitted() {
    let mut cache = mem_cache(GIB, CacheConfig::default()).unwrap();
    let key = EntityHash::of_bytes(b"readmission");

    let mut cheap = MockProducer::new(Duration::ZERO, 256 * KIB).with_key(key);
    cache.get(&mut cheap).unwrap();
    let tracked = cache.entry_info(key).unwrap().unwrap();
    assert!(!cache.is_resident(&tracked));

    let mut expensive = MockProducer::new(Duration::from_secs(600), 256 * KIB).with_key(key);
    cache.get(&mut expensive).unwrap();
    let resident = cache.entry_info(key).unwrap().unwrap();
    assert!(cache.is_resident(&resident));
    assert_eq!(resident.compute_time(), Duration::from_secs(600));
    assert_eq!(cache.access_history(key).unwrap().len(), 2);

    // Now resident: a further call is a plain hit and leaves the record
    // untouched apart from its access log.
    let mut cheaper = MockProducer::new(Duration::from_secs(1), 256 * KIB).with_key(key);
    cache.get(&mut cheaper).unwrap();
    let after_hit = cache.entry_info(key).unwrap().unwrap();
    assert_eq!(after_hit.compute_time(), Duration::from_secs(600));
    assert_eq!(cache.access_history(key).unwrap().len(), 3);
}
