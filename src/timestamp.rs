//! Timestamp helpers: `HH:MM:SS` strings, plain seconds, and trim times
//! encoded in the input's file name (`HHMMSS-HHMMSS.ext` or `HHMMSS.ext`).

use crate::error::{Result, ShrinkError};

/// Parse a strict `HH:MM:SS` timestamp into seconds.
pub fn seconds_from_timestamp(ts: &str) -> Result<u32> {
    let parts: Vec<&str> = ts.split(':').collect();
    if parts.len() != 3 {
        return Err(ShrinkError::Config(format!(
            "invalid timestamp '{ts}', expected HH:MM:SS"
        )));
    }
    let mut fields = [0u32; 3];
    for (i, part) in parts.iter().enumerate() {
        fields[i] = part.parse::<u32>().map_err(|_| {
            ShrinkError::Config(format!("invalid timestamp '{ts}', expected HH:MM:SS"))
        })?;
    }
    let [h, m, s] = fields;
    if m >= 60 || s >= 60 {
        return Err(ShrinkError::Config(format!(
            "invalid timestamp '{ts}': minutes and seconds must be below 60"
        )));
    }
    Ok(h * 3600 + m * 60 + s)
}

/// Format seconds as `HH:MM:SS`.
pub fn timestamp_from_seconds(secs: u32) -> String {
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// Compact `HHMMSS` form, used in synthesized output file names.
pub fn compact_timestamp(secs: u32) -> String {
    format!("{:02}{:02}{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// Parse a user-supplied time value: either plain seconds or `HH:MM:SS`.
pub fn parse_time_value(value: &str) -> Result<u32> {
    if let Ok(secs) = value.parse::<u32>() {
        return Ok(secs);
    }
    seconds_from_timestamp(value)
}

/// Extract trim times from a file stem shaped like `HHMMSS-HHMMSS` or
/// `HHMMSS`. Returns `(start, Some(end))`, `(start, None)`, or `None`
/// when the stem does not carry a time window.
pub fn times_from_stem(stem: &str) -> Option<(u32, Option<u32>)> {
    let bytes = stem.as_bytes();
    if bytes.len() < 6 || !bytes[..6].iter().all(u8::is_ascii_digit) {
        return None;
    }
    let start = stem_digits_to_seconds(&stem[..6]);

    if bytes.len() >= 13 && bytes[6] == b'-' && bytes[7..13].iter().all(u8::is_ascii_digit) {
        let end = stem_digits_to_seconds(&stem[7..13]);
        return Some((start, Some(end)));
    }
    Some((start, None))
}

fn stem_digits_to_seconds(digits: &str) -> u32 {
    // Callers guarantee six ASCII digits.
    let h: u32 = digits[..2].parse().unwrap_or(0);
    let m: u32 = digits[2..4].parse().unwrap_or(0);
    let s: u32 = digits[4..6].parse().unwrap_or(0);
    h * 3600 + m * 60 + s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seconds_from_timestamp() {
        assert_eq!(seconds_from_timestamp("01:02:03").unwrap(), 3723);
        assert_eq!(seconds_from_timestamp("00:00:00").unwrap(), 0);
        assert_eq!(seconds_from_timestamp("10:00:00").unwrap(), 36000);
    }

    #[test]
    fn test_seconds_from_timestamp_rejects_garbage() {
        assert!(seconds_from_timestamp("1:2").is_err());
        assert!(seconds_from_timestamp("aa:bb:cc").is_err());
        assert!(seconds_from_timestamp("00:99:00").is_err());
        assert!(seconds_from_timestamp("").is_err());
    }

    #[test]
    fn test_timestamp_from_seconds() {
        assert_eq!(timestamp_from_seconds(3723), "01:02:03");
        assert_eq!(timestamp_from_seconds(0), "00:00:00");
        assert_eq!(timestamp_from_seconds(36000), "10:00:00");
    }

    #[test]
    fn test_round_trip() {
        for secs in [0, 1, 59, 60, 3599, 3600, 3723, 36000, 86399] {
            assert_eq!(
                seconds_from_timestamp(&timestamp_from_seconds(secs)).unwrap(),
                secs
            );
        }
    }

    #[test]
    fn test_parse_time_value() {
        assert_eq!(parse_time_value("90").unwrap(), 90);
        assert_eq!(parse_time_value("00:01:30").unwrap(), 90);
        assert!(parse_time_value("ninety").is_err());
    }

    #[test]
    fn test_times_from_stem_window() {
        assert_eq!(times_from_stem("000010-000030"), Some((10, Some(30))));
        assert_eq!(times_from_stem("010000-020000"), Some((3600, Some(7200))));
    }

    #[test]
    fn test_times_from_stem_start_only() {
        assert_eq!(times_from_stem("000010"), Some((10, None)));
        // Trailing junk after the start time still yields a start-only window.
        assert_eq!(times_from_stem("000010_clip"), Some((10, None)));
    }

    #[test]
    fn test_times_from_stem_invalid() {
        assert_eq!(times_from_stem("badname"), None);
        assert_eq!(times_from_stem("00001"), None);
        assert_eq!(times_from_stem(""), None);
    }

    #[test]
    fn test_compact_timestamp() {
        assert_eq!(compact_timestamp(10), "000010");
        assert_eq!(compact_timestamp(3723), "010203");
    }
}
