//! Local-time helpers shared by the cache and the sync engines.
//!
//! Everything is expressed in epoch seconds (`i64`). "Local" always means the
//! process timezone as seen by [`chrono::Local`].

use chrono::{
    DateTime, Datelike, Duration, Local, LocalResult, NaiveDate, NaiveDateTime, NaiveTime,
    TimeZone, Utc,
};

pub const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Current time in epoch seconds.
pub fn now_ts() -> i64 {
    Utc::now().timestamp()
}

/// Convert epoch seconds to a local datetime. Out-of-range values clamp to the epoch.
pub fn local_datetime(ts: i64) -> DateTime<Local> {
    Local
        .timestamp_opt(ts, 0)
        .earliest()
        .unwrap_or_else(|| Utc.timestamp_nanos(0).with_timezone(&Local))
}

/// Resolve a wall-clock time in the local zone.
///
/// Ambiguous times (DST fall-back) take the earlier instant. Times inside a
/// DST gap are shifted forward by an hour, which is what `mktime` does too.
pub fn local_naive_to_ts(naive: NaiveDateTime) -> Option<i64> {
    match Local.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt.timestamp()),
        LocalResult::Ambiguous(earliest, _) => Some(earliest.timestamp()),
        LocalResult::None => Local
            .from_local_datetime(&(naive + Duration::hours(1)))
            .earliest()
            .map(|dt| dt.timestamp()),
    }
}

/// Local midnight of the given calendar date.
pub fn local_midnight(year: i32, month: u32, day: u32) -> Option<i64> {
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    local_naive_to_ts(date.and_time(NaiveTime::MIN))
}

/// First second of the local day containing `ts`.
pub fn start_of_day(ts: i64) -> i64 {
    let date = local_datetime(ts).date_naive();
    local_naive_to_ts(date.and_time(NaiveTime::MIN)).unwrap_or(ts)
}

/// 23:59:59 local on the day containing `ts`.
pub fn end_of_day(ts: i64) -> i64 {
    let date = local_datetime(ts).date_naive();
    date.and_hms_opt(23, 59, 59)
        .and_then(local_naive_to_ts)
        .unwrap_or(ts)
}

/// Local `[first second, last second]` of a calendar month.
pub fn month_bounds(year: i32, month: u32) -> Option<(i64, i64)> {
    let start = local_midnight(year, month, 1)?;
    let last_day = NaiveDate::from_ymd_opt(year, month, days_in_month(year, month))?;
    let end = local_naive_to_ts(last_day.and_hms_opt(23, 59, 59)?)?;
    Some((start, end))
}

/// Number of days in `month` (1-12) of `year`.
pub fn days_in_month(year: i32, month: u32) -> u32 {
    const DAYS: [u32; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
    if !(1..=12).contains(&month) {
        return 0;
    }
    let leap = (year % 4 == 0 && year % 100 != 0) || year % 400 == 0;
    if month == 2 && leap {
        29
    } else {
        DAYS[(month - 1) as usize]
    }
}

/// Day of week for a date, 0 = Sunday.
pub fn weekday_index(year: i32, month: u32, day: u32) -> Option<u32> {
    NaiveDate::from_ymd_opt(year, month, day).map(|d| d.weekday().num_days_from_sunday())
}

/// Parse RFC3339 (`YYYY-MM-DDTHH:MM:SS[.fff](Z|+HH:MM|-HH:MM)`) to epoch seconds.
///
/// A timestamp without an offset is read as UTC.
pub fn parse_rfc3339(text: &str) -> Option<i64> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.timestamp());
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc().timestamp())
}

/// Parse an ISO `YYYY-MM-DD` date as local midnight.
pub fn parse_date_local(text: &str) -> Option<i64> {
    let date = NaiveDate::parse_from_str(text.get(..10)?, "%Y-%m-%d").ok()?;
    local_naive_to_ts(date.and_time(NaiveTime::MIN))
}

/// Format epoch seconds as `YYYY-MM-DDTHH:MM:SSZ`.
pub fn to_rfc3339_utc(ts: i64) -> String {
    DateTime::<Utc>::from_timestamp(ts, 0)
        .unwrap_or_else(|| Utc.timestamp_nanos(0))
        .format("%Y-%m-%dT%H:%M:%SZ")
        .to_string()
}

pub fn format_time_hhmm(ts: i64) -> String {
    local_datetime(ts).format("%H:%M").to_string()
}

/// e.g. `Sat - Jun 15, 2024`
pub fn format_date_line(ts: i64) -> String {
    local_datetime(ts).format("%a - %b %d, %Y").to_string()
}

/// e.g. `June 2024`
pub fn format_month_year(ts: i64) -> String {
    local_datetime(ts).format("%B %Y").to_string()
}

/// Parse an epoch-seconds Meta value. Empty or zero means "never".
pub fn parse_meta_ts(value: &str) -> Option<i64> {
    value.trim().parse::<i64>().ok().filter(|ts| *ts > 0)
}

/// Whole minutes elapsed since a Meta timestamp, `None` when it was never written.
pub fn minutes_since(meta_value: &str, now: i64) -> Option<i64> {
    parse_meta_ts(meta_value).map(|ts| (now - ts).max(0) / 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_bounds_cover_full_local_day() {
        let noon = local_naive_to_ts(
            NaiveDate::from_ymd_opt(2024, 6, 15)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
        )
        .unwrap();
        let start = start_of_day(noon);
        let end = end_of_day(noon);
        assert_eq!(Some(start), local_midnight(2024, 6, 15));
        assert_eq!(local_datetime(end).format("%H:%M:%S").to_string(), "23:59:59");
        assert!(start <= noon && noon <= end);
    }

    #[test]
    fn days_in_month_handles_leap_years() {
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2023, 2), 28);
        assert_eq!(days_in_month(1900, 2), 28);
        assert_eq!(days_in_month(2000, 2), 29);
        assert_eq!(days_in_month(2024, 4), 30);
        assert_eq!(days_in_month(2024, 13), 0);
    }

    #[test]
    fn weekday_index_starts_on_sunday() {
        // 2024-06-16 was a Sunday
        assert_eq!(weekday_index(2024, 6, 16), Some(0));
        assert_eq!(weekday_index(2024, 6, 15), Some(6));
    }

    #[test]
    fn rfc3339_offsets() {
        assert_eq!(parse_rfc3339("1970-01-01T00:00:00Z"), Some(0));
        assert_eq!(parse_rfc3339("1970-01-01T01:00:00+01:00"), Some(0));
        assert_eq!(parse_rfc3339("1970-01-01T00:00:00.250-00:30"), Some(1800));
        assert_eq!(parse_rfc3339("1970-01-01T00:01:00"), Some(60));
        assert_eq!(parse_rfc3339("not a date"), None);
    }

    #[test]
    fn rfc3339_round_trips_through_formatter() {
        let ts = 1_718_438_400;
        assert_eq!(to_rfc3339_utc(ts), "2024-06-15T08:00:00Z");
        assert_eq!(parse_rfc3339(&to_rfc3339_utc(ts)), Some(ts));
    }

    #[test]
    fn date_local_is_midnight() {
        assert_eq!(parse_date_local("2024-06-15"), local_midnight(2024, 6, 15));
        assert_eq!(parse_date_local("2024-13-01"), None);
        assert_eq!(parse_date_local("2024"), None);
    }

    #[test]
    fn month_bounds_span_month() {
        let (start, end) = month_bounds(2024, 2).unwrap();
        assert_eq!(Some(start), local_midnight(2024, 2, 1));
        assert_eq!(local_datetime(end).format("%d %H:%M:%S").to_string(), "29 23:59:59");
        assert_eq!(format_month_year(start), "February 2024");
    }

    #[test]
    fn minutes_since_meta() {
        assert_eq!(minutes_since("", 1000), None);
        assert_eq!(minutes_since("0", 1000), None);
        assert_eq!(minutes_since("880", 1000), Some(2));
        assert_eq!(minutes_since("2000", 1000), Some(0));
    }
}
