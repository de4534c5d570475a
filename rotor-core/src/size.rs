//! Size-string parsing
//!
//! The transfer tool reports sizes as loosely formatted strings ("1.5G",
//! "126.7 GiB", "512 MiB"). Quota arithmetic needs a single unit, so
//! everything is normalized to gigabytes here.

/// Parses a lenient size string into gigabytes.
///
/// Accepts `<number><unit>` with optional whitespace in between. The unit
/// is matched case-insensitively by substring: a `T` scales by 1024, a `G`
/// passes through, an `M` divides by 1024. Unknown units and unparseable
/// input yield `0.0` so a garbled stats line never takes the caller down.
///
/// # Arguments
/// * `text` - Raw size token, e.g. `"700G"` or `"126.7 GiB"`
///
/// # Returns
/// The size in gigabytes, or `0.0` when the input cannot be read.
pub fn parse_gb(text: &str) -> f64 {
    let trimmed = text.trim();
    let digits_end = trimmed
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(trimmed.len());
    let (number, rest) = trimmed.split_at(digits_end);
    let Ok(value) = number.parse::<f64>() else {
        return 0.0;
    };
    let unit = rest.trim().to_ascii_uppercase();
    if unit.contains('T') {
        value * 1024.0
    } else if unit.contains('G') {
        value
    } else if unit.contains('M') {
        value / 1024.0
    } else {
        0.0
    }
}

/// Rounds to two decimal places for human-facing totals.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
