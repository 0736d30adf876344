//! Unit parsing and the small numeric derivations shared by every storage
//! parser: byte-unit strings, pool capacity percentage, ARC hit ratio.

/// Converts a ZFS/`dladm`-style size string (`"6.05G"`, `"2.62M"`, `"-"`,
/// `"none"`) to bytes. Units are powers of 1024: `{K,M,G,T,P,E,Z}`. A bare
/// number with no suffix is already bytes. `"-"` and `"none"` are null.
pub fn unit_to_bytes(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() || s == "-" || s.eq_ignore_ascii_case("none") {
        return None;
    }

    let last = s.chars().last()?;
    let (number_part, exponent) = if last.is_ascii_alphabetic() {
        let exp = match last.to_ascii_uppercase() {
            'K' => 1,
            'M' => 2,
            'G' => 3,
            'T' => 4,
            'P' => 5,
            'E' => 6,
            'Z' => 7,
            _ => return None,
        };
        (&s[..s.len() - 1], exp)
    } else {
        (s, 0)
    };

    let number: f64 = number_part.trim().parse().ok()?;
    Some(number * 1024f64.powi(exponent))
}

/// Inverse of [`unit_to_bytes`]: renders a byte count using the largest unit
/// that keeps the mantissa in `[1, 1024)`, two decimal places, matching the
/// formatting `zpool`/`zfs` use. Used only for display / round-trip tests.
pub fn bytes_to_unit(bytes: f64) -> String {
    const UNITS: [&str; 8] = ["", "K", "M", "G", "T", "P", "E", "Z"];
    if bytes == 0.0 {
        return "0".to_string();
    }
    let mut value = bytes;
    let mut idx = 0;
    while value.abs() >= 1024.0 && idx < UNITS.len() - 1 {
        value /= 1024.0;
        idx += 1;
    }
    if idx == 0 {
        format!("{value:.0}")
    } else {
        format!("{value:.2}{}", UNITS[idx])
    }
}

/// Pool capacity percentage: `alloc / (alloc + free) * 100`, rounded to two
/// decimals. `None` when either side is missing or the pool is empty.
pub fn capacity_pct(alloc: Option<f64>, free: Option<f64>) -> Option<f64> {
    let alloc = alloc?;
    let free = free?;
    let total = alloc + free;
    if total <= 0.0 {
        return None;
    }
    Some(round2(alloc / total * 100.0))
}

/// ARC (or L2ARC) hit ratio: `hits / (hits + misses) * 100`. Computed only
/// when both counters are present; `None` when both are zero.
pub fn hit_ratio_pct(hits: Option<u64>, misses: Option<u64>) -> Option<f64> {
    let hits = hits?;
    let misses = misses?;
    let total = hits + misses;
    if total == 0 {
        return None;
    }
    Some(round2(hits as f64 / total as f64 * 100.0))
}

pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_suffixed_sizes() {
        assert_eq!(unit_to_bytes("6.05G"), Some(6.05 * 1024f64.powi(3)));
        assert_eq!(unit_to_bytes("2.62M"), Some(2.62 * 1024f64.powi(2)));
        assert_eq!(unit_to_bytes("512"), Some(512.0));
    }

    #[test]
    fn null_sentinels_map_to_none() {
        assert_eq!(unit_to_bytes("-"), None);
        assert_eq!(unit_to_bytes("none"), None);
        assert_eq!(unit_to_bytes("None"), None);
        assert_eq!(unit_to_bytes(""), None);
    }

    #[test]
    fn unit_round_trip_within_half_percent() {
        for raw in ["1.00K", "6.05G", "2.62M", "999.99T", "1.50P"] {
            let bytes = unit_to_bytes(raw).unwrap();
            let rendered = bytes_to_unit(bytes);
            let back = unit_to_bytes(&rendered).unwrap();
            let tolerance = bytes.abs() * 0.005 + 1e-9;
            assert!(
                (back - bytes).abs() <= tolerance,
                "{raw} -> {bytes} -> {rendered} -> {back} exceeds 0.5% tolerance"
            );
        }
    }

    #[test]
    fn capacity_is_alloc_over_alloc_plus_free() {
        assert_eq!(capacity_pct(Some(25.0), Some(75.0)), Some(25.0));
        assert_eq!(capacity_pct(None, Some(75.0)), None);
        assert_eq!(capacity_pct(Some(25.0), None), None);
    }

    #[test]
    fn arc_efficiency_needs_both_counters() {
        assert_eq!(hit_ratio_pct(Some(90), Some(10)), Some(90.0));
        assert_eq!(hit_ratio_pct(None, Some(10)), None);
        assert_eq!(hit_ratio_pct(Some(0), Some(0)), None);
    }
}
