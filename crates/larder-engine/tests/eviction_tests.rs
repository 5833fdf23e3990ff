// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Eviction sweep semantics: post-eviction state, history retention,
//! termination, CBOR round-trip under pressure.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use larder_core::{CacheConfig, EntityHash};
use larder_engine::{
    mem_cache, CborProducer, invocation_key, MemCache, MockProducer, Options,
};
use larder_storage::{StorageModify as _, StorageRead as _};
use serde::{Deserialize, Serialize};

const MIB: u64 = 1 << 20;

/// Admit `count` mock entries of `size` bytes each.
fn admit_entries(cache: &mut MemCache, count: u32, size: u64) -> Vec<EntityHash> {
    let mut keys = Vec::new();
    for i in 0..count {
        let key = EntityHash::of_bytes(&i.to_le_bytes());
        let mut producer = MockProducer::new(Duration::from_secs(3600), size).with_key(key);
        cache.get(&mut producer).unwrap();
        let entry = cache.entry_info(key).unwrap().unwrap();
        assert!(cache.is_resident(&entry), "fixture entry {i} must admit");
        keys.push(key);
    }
    keys
}

/// Shrink free space out-of-band, the way another tenant of the device
/// would.
fn squeeze(cache: &mut MemCache, bytes: u64) {
    let filler = vec![0_u8; bytes as usize];
    cache
        .storage_mut()
        .save(&filler, &larder_core::ArtifactKey::path("pressure.blob"))
        .unwrap();
}

// ── 1. entries evicted under pressure lose their blobs ──────────────────

#[test]
fn eviction_removes_blobs() {
    let mut cache = mem_cache(64 * MIB, CacheConfig::default()).unwrap();
    let keys = admit_entries(&mut cache, 4, 4 * MIB);

    // Fill the device so every resident entry scores negative.
    squeeze(&mut cache, 47 * MIB);
    let evicted = cache.evict(false).unwrap();
    assert!(evicted > 0, "pressure must evict something");

    for key in &keys {
        match cache.entry_info(*key).unwrap() {
            // Fully evicted: metadata and access history are gone too.
            None => assert!(cache.access_history(*key).unwrap().is_empty()),
            // Survivor: must still be whole and score non-negative.
            Some(entry) => {
                assert!(cache.is_resident(&entry));
                assert!(cache.utility_of(&entry).unwrap() >= 0.0);
            }
        }
    }
}

// ── 2. retain_history keeps the access log of evicted entries ───────────

#[test]
fn eviction_can_retain_history() {
    let mut cache = mem_cache(16 * MIB, CacheConfig::default()).unwrap();
    let keys = admit_entries(&mut cache, 2, 2 * MIB);

    squeeze(&mut cache, 11 * MIB + 512 * 1024);
    let evicted = cache.evict(true).unwrap();
    assert!(evicted > 0);

    let mut retained = 0;
    for key in &keys {
        if cache.entry_info(*key).unwrap().is_none() {
            // Entry gone, history kept.
            assert!(!cache.access_history(*key).unwrap().is_empty());
            retained += 1;
        }
    }
    assert_eq!(retained, evicted);
}

// ── 3. a sweep with healthy utilities is a no-op ────────────────────────

#[test]
fn healthy_cache_sweeps_clean() {
    let mut cache = mem_cache(1 << 30, CacheConfig::default()).unwrap();
    let keys = admit_entries(&mut cache, 3, MIB);
    assert_eq!(cache.evict(false).unwrap(), 0);
    for key in keys {
        assert!(cache.entry_info(key).unwrap().is_some());
    }
}

// ── 4. remove_all clears resident and tracked entries alike ─────────────

#[test]
fn remove_all_clears_everything() {
    let mut cache = mem_cache(64 * MIB, CacheConfig::default()).unwrap();
    admit_entries(&mut cache, 2, MIB);
    // One tracked-only entry.
    let mut cheap = MockProducer::new(Duration::ZERO, 2 * MIB)
        .with_key(EntityHash::of_bytes(b"tracked"));
    cache.get(&mut cheap).unwrap();

    let removed = cache.remove_all(false).unwrap();
    assert_eq!(removed, 3);
    assert!(cache.entries(false).unwrap().is_empty());
    assert!(cache.storage().is_empty());
}

// ── 5. eviction, then re-admission on the next request ──────────────────

#[test]
fn evicted_entry_readmits() {
    let mut cache = mem_cache(16 * MIB, CacheConfig::default()).unwrap();
    let key = EntityHash::of_bytes(b"boomerang");
    let mut producer = MockProducer::new(Duration::from_secs(120), MIB).with_key(key);
    cache.get(&mut producer).unwrap();

    squeeze(&mut cache, 15 * MIB);
    cache.evict(true).unwrap();
    assert!(cache.entry_info(key).unwrap().is_none());

    // Release the pressure and ask again.
    assert!(cache
        .storage_mut()
        .remove(&larder_core::ArtifactKey::path("pressure.blob")));
    let mut again = MockProducer::new(Duration::from_secs(120), MIB).with_key(key);
    cache.get(&mut again).unwrap();
    let entry = cache.entry_info(key).unwrap().unwrap();
    assert!(cache.is_resident(&entry));
}

// ── 6. CBOR producer round-trips through the memory cache ───────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Weights {
    layers: Vec<Vec<f32>>,
    epoch: u16,
}

#[test]
fn cbor_round_trip_through_cache() {
    let mut cache = mem_cache(1 << 30, CacheConfig::default()).unwrap();
    let key = invocation_key("train", &("weights", 3));
    let make = || {
        std::thread::sleep(Duration::from_millis(5));
        Weights {
            layers: vec![vec![0.5; 16]; 4],
            epoch: 12,
        }
    };
    let options = Options {
        weight: 1.0e9,
        ..Options::default()
    };

    let mut producer = CborProducer::new(key, make).with_class("cbor");
    let first = cache.lookup_or_produce(&mut producer, &options).unwrap();
    let entry = cache.entry_info(key).unwrap().unwrap();
    assert!(cache.is_resident(&entry));

    let mut reader = CborProducer::new(key, make).with_class("cbor");
    let second = cache.lookup_or_produce(&mut reader, &options).unwrap();
    assert_eq!(first, second);
}
