// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Property tests over the admission decision.
//!
//! For arbitrary declared sizes and compute times the engine must keep its
//! structural promises: every seen invocation is cataloged exactly once,
//! resident entries are whole, rejected entries leave storage untouched,
//! and a second call is served idempotently.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use larder_core::{CacheConfig, EntityHash};
use larder_engine::{mem_cache, MockProducer};
use larder_storage::StorageRead as _;
use proptest::prelude::*;

const MIB: u64 = 1 << 20;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    // ── 1. every outcome is structurally sound ──────────────────────────

    #[test]
    fn admission_is_structurally_sound(
        size in 1_u64..(8 * MIB),
        compute_secs in 0_u64..600,
        seed in 0_u64..u64::MAX,
    ) {
        let mut cache = mem_cache(16 * MIB, CacheConfig::default()).unwrap();
        let key = EntityHash::of_bytes(&seed.to_le_bytes());
        let mut producer =
            MockProducer::new(Duration::from_secs(compute_secs), size).with_key(key);

        let item = cache.get(&mut producer).unwrap();
        prop_assert_eq!(item.len() as u64, size);

        // Cataloged exactly once, with the declared size.
        let entry = cache.entry_info(key).unwrap().unwrap();
        prop_assert_eq!(entry.size_bytes(), size);
        prop_assert_eq!(entry.compute_time(), Duration::from_secs(compute_secs));
        prop_assert!(entry.artifacts().contains_key(entry.main_artifact_key()));
        prop_assert_eq!(cache.access_history(key).unwrap().len(), 1);

        if cache.is_resident(&entry) {
            // Whole: the main blob holds exactly the serialized bytes.
            prop_assert_eq!(cache.storage().size(entry.main_artifact_key()).unwrap(), size);
            prop_assert!(entry.content_hash().is_some());
        } else {
            // Rejected: storage untouched, hash unknown until admission.
            prop_assert!(cache.storage().is_empty());
            prop_assert!(entry.content_hash().is_none());
        }

        // ── 2. idempotent second call ───────────────────────────────────
        let mut again =
            MockProducer::new(Duration::from_secs(compute_secs), size).with_key(key);
        let item_again = cache.get(&mut again).unwrap();
        prop_assert_eq!(item, item_again);
        prop_assert_eq!(cache.access_history(key).unwrap().len(), 2);
        prop_assert_eq!(
            cache.entries(false).unwrap().len(),
            1,
            "one invocation, one catalog row"
        );
    }
}
