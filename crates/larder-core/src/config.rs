// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Engine configuration.

use serde::{Deserialize, Serialize};

/// Parameters of the utility function, stable for the process lifetime.
///
/// All sizes are bytes; conversion to GB happens only inside the scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Equivalence factor between compute and storage: one minute of compute
    /// costs the same as `1/C` GB-hours of storage utility. Lower values
    /// make compute more precious and admission more likely.
    pub cost_per_minute_compute_vs_1gb: f64,

    /// Free space subtracted from every raw reading before scoring. The
    /// cache never knowingly fills the device past this floor.
    pub reserved_free_space_bytes: u64,

    /// Half-life of an item's benefit, in hours since its last access.
    pub half_life_hours: f64,

    /// Scalar utility of one GB of free space.
    pub utility_at_1gb: f64,

    /// Shape parameter of the marginal utility curve `U(f) = U₁ · f^(−α)`.
    pub marginal_utility_exponent: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cost_per_minute_compute_vs_1gb: 0.1,
            reserved_free_space_bytes: 0,
            half_life_hours: 24.0,
            utility_at_1gb: 2.0,
            marginal_utility_exponent: 1.0,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // ── 1. documented defaults ──────────────────────────────────────────

    #[test]
    fn defaults_match_contract() {
        let config = CacheConfig::default();
        assert_eq!(config.cost_per_minute_compute_vs_1gb, 0.1);
        assert_eq!(config.reserved_free_space_bytes, 0);
        assert_eq!(config.half_life_hours, 24.0);
        assert_eq!(config.utility_at_1gb, 2.0);
        assert_eq!(config.marginal_utility_exponent, 1.0);
    }

    // ── 2. serde round-trip with partial input ──────────────────────────

    #[test]
    fn serde_round_trip_and_partial() {
        let config = CacheConfig {
            reserved_free_space_bytes: 1 << 30,
            ..CacheConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: CacheConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);

        // Missing fields fall back to defaults.
        let partial: CacheConfig = serde_json::from_str(r#"{"half_life_hours": 6.0}"#).unwrap();
        assert_eq!(partial.half_life_hours, 6.0);
        assert_eq!(partial.utility_at_1gb, 2.0);
    }
}
