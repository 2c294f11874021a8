//! Compact labels for counts and sizes.

/// `950` → `"950"`, `1_234` → `"1.2K"`, `5_000_000` → `"5M"`.
pub fn compact_count(n: u64) -> String {
    const UNITS: [(f64, &str); 3] = [(1e3, "K"), (1e6, "M"), (1e9, "B")];

    match scale(n as f64, &UNITS, 1_000.0) {
        Some((value, suffix)) => {
            let rounded = format!("{:.1}", value);
            let trimmed = rounded.strip_suffix(".0").unwrap_or(&rounded);
            format!("{}{}", trimmed, suffix)
        }
        None => n.to_string(),
    }
}

/// Binary units, one decimal: `1536` → `"1.5 KB"`.
pub fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const UNITS: [(f64, &str); 4] = [
        (KB, "KB"),
        (KB * KB, "MB"),
        (KB * KB * KB, "GB"),
        (KB * KB * KB * KB, "TB"),
    ];

    match scale(bytes as f64, &UNITS, KB) {
        Some((value, suffix)) => format!("{:.1} {}", value, suffix),
        None => format!("{} B", bytes),
    }
}

/// Picks the largest unit not above `value` and rounds to one decimal,
/// moving up a unit when rounding reaches `base` (`999_999` is `1M`, not
/// `1000K`). `None` when `value` is below the smallest unit.
fn scale(value: f64, units: &[(f64, &'static str)], base: f64) -> Option<(f64, &'static str)> {
    let mut index = units.iter().rposition(|(size, _)| value >= *size)?;
    loop {
        let (size, suffix) = units[index];
        let rounded = (value / size * 10.0).round() / 10.0;
        if rounded < base || index + 1 == units.len() {
            return Some((rounded, suffix));
        }
        index += 1;
    }
}

pub fn rows_label(n: u64) -> String {
    if n == 1 {
        "1 row".to_string()
    } else {
        format!("{} rows", compact_count(n))
    }
}
