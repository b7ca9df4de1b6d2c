//! Human-readable byte formatting.

const UNIT: u64 = 1024;
const GIB: u64 = UNIT * UNIT * UNIT;

/// Format a byte count with binary units.
///
/// KB and MB use two decimals so slow progress still moves visibly; GB and
/// larger use one.
///
/// ```
/// use toke_core::format_size;
///
/// assert_eq!(format_size(0), "0 B");
/// assert_eq!(format_size(1536), "1.50 KB");
/// assert_eq!(format_size(5_368_709_120), "5.0 GB");
/// ```
#[allow(clippy::cast_precision_loss)]
pub fn format_size(bytes: u64) -> String {
    if bytes < UNIT {
        return format!("{bytes} B");
    }

    let mut div = UNIT;
    let mut exp = 0usize;
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }

    let value = bytes as f64 / div as f64;
    let unit = ['K', 'M', 'G', 'T', 'P', 'E'][exp];
    if exp < 2 {
        format!("{value:.2} {unit}B")
    } else {
        format!("{value:.1} {unit}B")
    }
}

/// Whole gibibytes, truncated.
pub const fn whole_gib(bytes: u64) -> u64 {
    bytes / GIB
}
