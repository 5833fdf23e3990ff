// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The admission/eviction scorer.
//!
//! [`UtilityPolicy`] maps an entry and a free-space snapshot to one real
//! number: the net value of keeping (or admitting) the entry's blobs. The
//! score trades the discounted cost of recomputation against the marginal
//! scarcity of disk space. Negative utility means "do not store" on the
//! admission path and "evict" on the sweep path.
//!
//! # Monotonicity Invariant
//!
//! For a fixed entry and last access, utility is non-decreasing in free
//! space. The eviction sweep depends on this: removing the worst entry can
//! only improve the remaining entries' scores, so the sweep terminates at
//! the first non-negative pop. Any replacement formula MUST preserve this
//! property.
//!
//! # Purity
//!
//! No clocks, no I/O. `now` is captured once per engine operation and
//! passed in, so one operation scores every entry against one instant.

use std::time::SystemTime;

use crate::config::CacheConfig;
use crate::entry::CacheEntry;

/// Bytes per GiB; the scorer's only unit conversion.
pub const BYTES_PER_GIB: f64 = (1_u64 << 30) as f64;

const SECONDS_PER_MINUTE: f64 = 60.0;
const SECONDS_PER_HOUR: f64 = 3600.0;

/// Pure utility scorer parameterized by a [`CacheConfig`].
#[derive(Debug, Clone)]
pub struct UtilityPolicy {
    config: CacheConfig,
}

impl UtilityPolicy {
    /// Build a scorer over the given configuration.
    pub fn new(config: CacheConfig) -> Self {
        Self { config }
    }

    /// The configuration this scorer applies.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Score `entry` against a free-space snapshot.
    ///
    /// `free_space` is the raw byte reading from storage; the reserved
    /// floor is subtracted here. `resident` selects the framing: `true`
    /// scores an entry whose blobs are on disk (eviction candidate — the
    /// cost is the scarcity relief its removal would buy), `false` scores
    /// a prospective admission (the cost is the scarcity the new blobs
    /// would add). Returns `f64::NEG_INFINITY` when the free-space guard
    /// fails: a resident entry below the reserved floor, or an admission
    /// that would cross it.
    pub fn utility(
        &self,
        entry: &CacheEntry,
        free_space: u64,
        last_access: Option<SystemTime>,
        now: SystemTime,
        resident: bool,
    ) -> f64 {
        let age_hours = last_access.map_or(0.0, |at| {
            now.duration_since(at)
                .map_or(0.0, |age| age.as_secs_f64() / SECONDS_PER_HOUR)
        });
        let compute_minutes = entry.compute_time().as_secs_f64() / SECONDS_PER_MINUTE;
        let benefit = compute_minutes / self.config.cost_per_minute_compute_vs_1gb
            * entry.weight()
            * self.decay(age_hours);
        benefit - self.storage_cost(free_space, entry.size_bytes(), resident)
    }

    /// Exponential benefit decay: halves every `half_life_hours`.
    fn decay(&self, age_hours: f64) -> f64 {
        (-age_hours / self.config.half_life_hours).exp2()
    }

    /// Marginal utility of `f` GiB of free space: `U(f) = U₁ · f^(−α)`.
    ///
    /// Decreasing in `f` — scarce space is precious, abundant space cheap.
    fn free_space_utility(&self, f: f64) -> f64 {
        self.config.utility_at_1gb * f.powf(-self.config.marginal_utility_exponent)
    }

    /// Positive storage cost of the entry's blobs, or `f64::INFINITY` when
    /// the free-space guard fails.
    fn storage_cost(&self, free_space: u64, size_bytes: u64, resident: bool) -> f64 {
        let size = size_bytes as f64 / BYTES_PER_GIB;
        let f = (free_space as f64 - self.config.reserved_free_space_bytes as f64) / BYTES_PER_GIB;
        if resident {
            // Cost of keeping: the scarcity relief eviction would buy.
            if f < 0.0 {
                return f64::INFINITY;
            }
            self.free_space_utility(f) - self.free_space_utility(f + size)
        } else {
            // Cost of admitting: the scarcity the new blobs would add.
            if f < size {
                return f64::INFINITY;
            }
            self.free_space_utility(f - size) - self.free_space_utility(f)
        }
    }
}
