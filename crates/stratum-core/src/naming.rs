//! Timestamp naming codec.
//!
//! Migration files carry their creation instant as a fixed-width
//! `YYYYMMDDHHmmss` prefix. All instants are naive UTC.

use chrono::{NaiveDate, NaiveDateTime, Timelike, Utc};

/// `chrono` format string matching the fixed-width prefix.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Number of digits in an encoded timestamp.
pub const TIMESTAMP_LEN: usize = 14;

/// Format an instant as a `YYYYMMDDHHmmss` name fragment.
pub fn encode(at: NaiveDateTime) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Extract the timestamp a name starts with.
///
/// Returns `None` when the name does not begin with 14 digits or the digits
/// do not form a valid calendar instant. Directories may hold unrelated
/// files, so this is a skip signal rather than an error.
pub fn decode(name: &str) -> Option<NaiveDateTime> {
    let digits = name.get(..TIMESTAMP_LEN)?;
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let field = |range: std::ops::Range<usize>| digits[range].parse::<u32>().ok();

    let year = digits[0..4].parse::<i32>().ok()?;
    NaiveDate::from_ymd_opt(year, field(4..6)?, field(6..8)?)?.and_hms_opt(
        field(8..10)?,
        field(10..12)?,
        field(12..14)?,
    )
}

/// Lower bound used when the ledger is empty: every file compares as after it.
pub fn epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1900, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or(NaiveDateTime::MIN)
}

/// Current instant, truncated to whole seconds. Used for file stamps and
/// ledger rows.
pub fn now() -> NaiveDateTime {
    let now = instant();
    now.with_nanosecond(0).unwrap_or(now)
}

/// Current instant at full precision. Used as the default upper bound of an
/// up run, so a file stamped earlier in the current second still qualifies.
pub fn instant() -> NaiveDateTime {
    Utc::now().naive_utc()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn test_encode_fixed_width() {
        assert_eq!(encode(at(2023, 1, 2, 3, 4, 5)), "20230102030405");
        assert_eq!(encode(at(999, 1, 1, 0, 0, 0)), "09990101000000");
    }

    #[test]
    fn test_decode_inverts_encode() {
        for t in [
            at(2023, 1, 1, 0, 0, 0),
            at(2024, 2, 29, 23, 59, 59),
            at(1999, 12, 31, 12, 30, 1),
        ] {
            assert_eq!(decode(&encode(t)), Some(t));
        }
    }

    #[test]
    fn test_decode_migration_names() {
        let expected = Some(at(2023, 2, 1, 0, 0, 0));
        assert_eq!(decode("20230201000000_up.sql"), expected);
        assert_eq!(decode("20230201000000-add-users_down.sql"), expected);
        assert_eq!(decode("20230201000000.rs"), expected);
    }

    #[test]
    fn test_decode_rejects_non_migrations() {
        assert_eq!(decode("README.md"), None);
        assert_eq!(decode(".gitkeep"), None);
        assert_eq!(decode("2023010100000_up.sql"), None);
        assert_eq!(decode("up_20230101000000.sql"), None);
        // 14 digits that are not a calendar instant
        assert_eq!(decode("20231301000000_up.sql"), None);
        assert_eq!(decode("20230101250000_up.sql"), None);
    }

    #[test]
    fn test_decode_non_ascii_prefix() {
        assert_eq!(decode("２０２３0101000000"), None);
        assert_eq!(decode(""), None);
    }

    #[test]
    fn test_epoch_precedes_everything() {
        assert_eq!(encode(epoch()), "19000101000000");
        assert!(epoch() < at(1970, 1, 1, 0, 0, 0));
    }

    #[test]
    fn test_now_has_second_precision() {
        let t = now();
        assert_eq!(decode(&encode(t)), Some(t));
    }

    #[test]
    fn test_instant_not_before_stamp_of_same_second() {
        let stamp = now();
        let bound = instant();
        assert!(bound >= stamp);
        assert!(decode(&encode(stamp)).unwrap() <= bound);
    }
}
