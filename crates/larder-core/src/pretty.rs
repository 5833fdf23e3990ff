// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Humanized sizes and durations for reports and log lines.

use std::time::Duration;

/// Render a byte count with a binary unit suffix, one decimal place.
pub fn pretty_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

/// Render a duration at the most natural single unit.
pub fn pretty_duration(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 0.001 {
        format!("{:.0} µs", secs * 1e6)
    } else if secs < 1.0 {
        format!("{:.0} ms", secs * 1e3)
    } else if secs < 60.0 {
        format!("{secs:.1} s")
    } else if secs < 3600.0 {
        format!("{:.1} min", secs / 60.0)
    } else {
        format!("{:.1} h", secs / 3600.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // ── 1. size unit boundaries ─────────────────────────────────────────

    #[test]
    fn size_unit_boundaries() {
        assert_eq!(pretty_size(0), "0 B");
        assert_eq!(pretty_size(1023), "1023 B");
        assert_eq!(pretty_size(1024), "1.0 KiB");
        assert_eq!(pretty_size(1536), "1.5 KiB");
        assert_eq!(pretty_size(5 * 1024 * 1024), "5.0 MiB");
        assert_eq!(pretty_size(3 << 30), "3.0 GiB");
    }

    // ── 2. duration unit boundaries ─────────────────────────────────────

    #[test]
    fn duration_unit_boundaries() {
        assert_eq!(pretty_duration(Duration::from_micros(250)), "250 µs");
        assert_eq!(pretty_duration(Duration::from_millis(12)), "12 ms");
        assert_eq!(pretty_duration(Duration::from_secs(5)), "5.0 s");
        assert_eq!(pretty_duration(Duration::from_secs(90)), "1.5 min");
        assert_eq!(pretty_duration(Duration::from_secs(5400)), "1.5 h");
    }
}
