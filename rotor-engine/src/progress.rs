//! Transfer tool output parsing
//!
//! With a one-second stats interval the tool prints periodic lines like
//!
//! ```text
//! Transferred:   126.7 GiB / 700 GiB, 18%, 31.4 MBytes/s, ETA 5h2m
//! ```
//!
//! Each field updates independently; a line that carries only some of them
//! still produces a reading with the rest unset. The speed matcher keys on
//! the `Bytes/s` and `bits/s` spellings the tool contract fixes.

use rotor_core::size;

/// One parsed stats reading. Unset fields were absent from the line.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProgressReading {
    /// Cumulative size moved this run, in gigabytes.
    pub transferred_gb: Option<f64>,
    /// Speed token verbatim, e.g. `31.4 MBytes/s`.
    pub speed: Option<String>,
    /// Percentage token verbatim, e.g. `18%`.
    pub progress: Option<String>,
}

/// Parses one output line. Returns `None` for anything that is not a
/// stats line.
pub fn parse_stats_line(line: &str) -> Option<ProgressReading> {
    if !(line.contains("Transferred:") && line.contains(',')) {
        return None;
    }

    let mut reading = ProgressReading::default();

    if let Some(after) = line.split("Transferred:").nth(1) {
        let token = leading_size_token(after);
        if !token.is_empty() {
            reading.transferred_gb = Some(size::parse_gb(token));
        }
    }

    for part in line.split(',') {
        if part.contains("Bytes/s") || part.contains("bits/s") {
            reading.speed = Some(part.trim().to_string());
        } else if part.contains('%') {
            reading.progress = Some(part.trim().to_string());
        }
    }

    Some(reading)
}

/// Extracts the leading `<number>[ ]<letters>` token, mirroring the size
/// format the tool prints. Empty when the text does not start with one.
fn leading_size_token(text: &str) -> &str {
    let text = text.trim_start();
    let bytes = text.as_bytes();

    let mut digits = 0;
    while digits < bytes.len() && (bytes[digits].is_ascii_digit() || bytes[digits] == b'.') {
        digits += 1;
    }
    if digits == 0 {
        return "";
    }

    let mut unit_start = digits;
    if unit_start < bytes.len() && bytes[unit_start] == b' ' {
        unit_start += 1;
    }
    let mut end = unit_start;
    while end < bytes.len() && bytes[end].is_ascii_alphabetic() {
        end += 1;
    }
    if end == unit_start {
        return "";
    }

    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_stats_line() {
        let line = "Transferred:   126.7 GiB / 700 GiB, 18%, 31.4 MBytes/s, ETA 5h2m";
        let reading = parse_stats_line(line).unwrap();
        assert_eq!(reading.transferred_gb, Some(126.7));
        assert_eq!(reading.speed.as_deref(), Some("31.4 MBytes/s"));
        assert_eq!(reading.progress.as_deref(), Some("18%"));
    }

    #[test]
    fn test_bits_per_second_speed() {
        let line = "Transferred: 1.5 GiB / 2 GiB, 75%, 120 Mbits/s, ETA 1m";
        let reading = parse_stats_line(line).unwrap();
        assert_eq!(reading.speed.as_deref(), Some("120 Mbits/s"));
    }

    #[test]
    fn test_non_stats_lines_ignored() {
        assert_eq!(parse_stats_line("2026/01/10 12:00:01 INFO  : chunk 4 uploaded"), None);
        assert_eq!(parse_stats_line("Elapsed time: 3m2s"), None);
        // A Transferred line without the comma-separated tail is the
        // object-count variant, not the size stats.
        assert_eq!(parse_stats_line("Transferred: 17 / 245"), None);
    }

    #[test]
    fn test_partial_line_leaves_fields_unset() {
        let line = "Transferred: garbled, 44%";
        let reading = parse_stats_line(line).unwrap();
        assert_eq!(reading.transferred_gb, None);
        assert_eq!(reading.speed, None);
        assert_eq!(reading.progress.as_deref(), Some("44%"));
    }

    #[test]
    fn test_size_token_without_space() {
        let line = "Transferred: 680GiB / 700 GiB, 97%, 12 MBytes/s, ETA 2m";
        let reading = parse_stats_line(line).unwrap();
        assert_eq!(reading.transferred_gb, Some(680.0));
    }
}
