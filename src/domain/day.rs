//! Day-boundary and timezone helpers.
//!
//! Metric collection buckets reports by UTC day; nudge decisions use the
//! account's own timezone, carried as a fixed-offset string such as
//! `"GMT+8"` or `"GMT-05:30"`. Both notions of "today" live here so the
//! rest of the crate never computes a boundary by hand.

use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc};

/// Start-of-day boundaries for three consecutive UTC days around `now`:
/// `(yesterday_start, today_start, tomorrow_start)`, as epoch seconds.
#[must_use]
pub fn consecutive_day_starts(now: DateTime<Utc>) -> (i64, i64, i64) {
    let today_start = day_start_utc(now);
    (
        today_start - Duration::days(1).num_seconds(),
        today_start,
        today_start + Duration::days(1).num_seconds(),
    )
}

/// Epoch seconds of the UTC midnight at or before `now`.
#[must_use]
pub fn day_start_utc(now: DateTime<Utc>) -> i64 {
    let date = now.date_naive();
    Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap_or_default())
        .timestamp()
}

/// `YYYY-MM-DD` date string for an epoch timestamp, in UTC.
#[must_use]
pub fn utc_date_string(ts: i64) -> String {
    DateTime::<Utc>::from_timestamp(ts, 0)
        .unwrap_or_default()
        .format("%Y-%m-%d")
        .to_string()
}

/// Parses a `"GMT+8"` / `"GMT-05:30"`-style offset string into a fixed
/// offset. Unknown or malformed strings fall back to GMT+8, matching the
/// historic default for accounts that never reported a timezone.
#[must_use]
pub fn account_offset(timezone: &str) -> FixedOffset {
    parse_gmt_offset(timezone).unwrap_or_else(default_offset)
}

fn default_offset() -> FixedOffset {
    FixedOffset::east_opt(8 * 3600).expect("static offset is in range")
}

fn parse_gmt_offset(timezone: &str) -> Option<FixedOffset> {
    let rest = timezone.strip_prefix("GMT")?;
    if rest.is_empty() {
        return FixedOffset::east_opt(0);
    }

    let (sign, digits) = match rest.as_bytes()[0] {
        b'+' => (1, &rest[1..]),
        b'-' => (-1, &rest[1..]),
        _ => return None,
    };

    let (hours, minutes) = match digits.split_once(':') {
        Some((h, m)) => (h.parse::<i32>().ok()?, m.parse::<i32>().ok()?),
        None => (digits.parse::<i32>().ok()?, 0),
    };
    if hours > 14 || minutes > 59 {
        return None;
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Epoch seconds of local midnight (in the account's offset) at or before
/// the instant `ts`.
#[must_use]
pub fn local_day_start(ts: i64, offset: FixedOffset) -> i64 {
    let local = DateTime::<Utc>::from_timestamp(ts, 0)
        .unwrap_or_default()
        .with_timezone(&offset);
    let date = local.date_naive();
    offset
        .from_local_datetime(&date.and_hms_opt(0, 0, 0).unwrap_or_default())
        .single()
        .map_or(0, |dt| dt.timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consecutive_days_are_24h_apart() {
        let now = Utc.with_ymd_and_hms(2020, 5, 10, 15, 30, 0).unwrap();
        let (yesterday, today, tomorrow) = consecutive_day_starts(now);
        assert_eq!(today - yesterday, 86_400);
        assert_eq!(tomorrow - today, 86_400);
        assert_eq!(utc_date_string(today), "2020-05-10");
    }

    #[test]
    fn parses_simple_offsets() {
        assert_eq!(account_offset("GMT+8").local_minus_utc(), 8 * 3600);
        assert_eq!(account_offset("GMT-5").local_minus_utc(), -5 * 3600);
        assert_eq!(account_offset("GMT").local_minus_utc(), 0);
    }

    #[test]
    fn parses_offsets_with_minutes() {
        assert_eq!(
            account_offset("GMT+5:30").local_minus_utc(),
            5 * 3600 + 30 * 60
        );
        assert_eq!(
            account_offset("GMT-05:30").local_minus_utc(),
            -(5 * 3600 + 30 * 60)
        );
    }

    #[test]
    fn malformed_offset_falls_back_to_gmt8() {
        assert_eq!(account_offset("").local_minus_utc(), 8 * 3600);
        assert_eq!(account_offset("UTC+8").local_minus_utc(), 8 * 3600);
        assert_eq!(account_offset("GMT+99").local_minus_utc(), 8 * 3600);
    }

    #[test]
    fn local_day_start_respects_offset() {
        // 2020-05-10 02:00 UTC is 2020-05-10 10:00 in GMT+8,
        // so local midnight is 2020-05-09 16:00 UTC.
        let ts = Utc.with_ymd_and_hms(2020, 5, 10, 2, 0, 0).unwrap().timestamp();
        let start = local_day_start(ts, account_offset("GMT+8"));
        let expect = Utc.with_ymd_and_hms(2020, 5, 9, 16, 0, 0).unwrap().timestamp();
        assert_eq!(start, expect);
    }

    #[test]
    fn utc_day_start_is_midnight() {
        let now = Utc.with_ymd_and_hms(2020, 5, 10, 23, 59, 59).unwrap();
        let start = day_start_utc(now);
        assert_eq!(utc_date_string(start), "2020-05-10");
        assert_eq!(start % 86_400, 0);
    }
}
