//! iCalendar feed parsing.
//!
//! Streams `VEVENT` blocks out of a feed body. Recurrence rules are not
//! expanded; every block is taken at face value.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::storage::EventRecord;
use crate::time_util::local_naive_to_ts;

/// Calendar id given to every event that came from the feed.
pub const ICS_CALENDAR_ID: &str = "ics";

/// Length of an all-day event without an explicit end, in seconds.
const ALL_DAY_SPAN: i64 = 86_399;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IcsEvent {
    pub uid: String,
    pub summary: String,
    pub location: String,
    pub status: String,
    pub start_ts: i64,
    pub end_ts: i64,
    pub all_day: bool,
}

impl IcsEvent {
    /// Whether `[start_ts, end_ts]` touches `[window_start, window_end]`.
    pub fn overlaps(&self, window_start: i64, window_end: i64) -> bool {
        self.start_ts <= window_end && self.end_ts >= window_start
    }

    pub fn into_record(self, sync_ts: i64) -> EventRecord {
        EventRecord {
            id: self.uid,
            calendar_id: ICS_CALENDAR_ID.to_string(),
            title: self.summary,
            start_ts: self.start_ts,
            end_ts: self.end_ts,
            all_day: self.all_day,
            location: self.location,
            updated_ts: sync_ts,
            status: self.status,
        }
    }
}

/// A content line split into name, parameters and value.
#[derive(Debug, PartialEq, Eq)]
struct ContentLine<'a> {
    name: String,
    params: Vec<(String, &'a str)>,
    value: &'a str,
}

impl ContentLine<'_> {
    fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| *v)
    }
}

/// Join folded lines. A line starting with a space or tab continues the
/// previous one with that single whitespace character removed.
pub fn unfold_lines(body: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    for raw in body.split('\n') {
        let line = raw.strip_suffix('\r').unwrap_or(raw);
        match (line.as_bytes().first(), lines.last_mut()) {
            (Some(b' ' | b'\t'), Some(prev)) => prev.push_str(&line[1..]),
            _ => lines.push(line.to_string()),
        }
    }
    lines
}

fn split_line(line: &str) -> Option<ContentLine<'_>> {
    // The value starts at the first colon outside a quoted parameter value.
    let mut in_quotes = false;
    let mut colon = None;
    for (i, ch) in line.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ':' if !in_quotes => {
                colon = Some(i);
                break;
            }
            _ => {}
        }
    }
    let colon = colon?;
    let (head, value) = (&line[..colon], &line[colon + 1..]);

    let mut parts = head.split(';');
    let name = parts.next()?.trim().to_ascii_uppercase();
    if name.is_empty() {
        return None;
    }
    let params = parts
        .filter_map(|p| {
            let (k, v) = p.split_once('=')?;
            Some((k.trim().to_ascii_uppercase(), v.trim_matches('"')))
        })
        .collect();
    Some(ContentLine {
        name,
        params,
        value,
    })
}

/// Undo TEXT escaping: `\n`/`\N` become newlines, any other escaped
/// character stands for itself.
pub fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n' | 'N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Parse a DTSTART/DTEND value. Returns the timestamp and whether it was a
/// date-only value.
///
/// Dates resolve to local midnight. Date-times ending in `Z` are UTC, all
/// others (including ones carrying a `TZID`) are read as local time.
pub fn parse_date_value(value: &str, value_type: Option<&str>) -> Option<(i64, bool)> {
    let value = value.trim();
    let is_date = value_type.is_some_and(|t| t.eq_ignore_ascii_case("DATE"))
        || (value.len() == 8 && value.bytes().all(|b| b.is_ascii_digit()));

    if is_date {
        let date = NaiveDate::parse_from_str(value.get(..8)?, "%Y%m%d").ok()?;
        return local_naive_to_ts(date.and_time(NaiveTime::MIN)).map(|ts| (ts, true));
    }

    let (text, utc) = match value.strip_suffix(['Z', 'z']) {
        Some(rest) => (rest, true),
        None => (value, false),
    };
    let naive = NaiveDateTime::parse_from_str(text, "%Y%m%dT%H%M%S").ok()?;
    let ts = if utc {
        naive.and_utc().timestamp()
    } else {
        local_naive_to_ts(naive)?
    };
    Some((ts, false))
}

#[derive(Default)]
struct EventBuilder {
    uid: Option<String>,
    summary: Option<String>,
    location: String,
    status: Option<String>,
    start: Option<(i64, bool)>,
    end: Option<(i64, bool)>,
}

impl EventBuilder {
    fn apply(&mut self, line: &ContentLine<'_>) {
        match line.name.as_str() {
            "UID" => self.uid = Some(line.value.trim().to_string()),
            "SUMMARY" => self.summary = Some(unescape_text(line.value)),
            "LOCATION" => self.location = unescape_text(line.value),
            "STATUS" => self.status = Some(line.value.trim().to_ascii_lowercase()),
            "DTSTART" => self.start = parse_date_value(line.value, line.param("VALUE")),
            "DTEND" => self.end = parse_date_value(line.value, line.param("VALUE")),
            _ => {}
        }
    }

    fn finish(self) -> Option<IcsEvent> {
        let uid = self.uid.filter(|u| !u.is_empty())?;
        let (start_ts, all_day) = self.start?;
        let end_ts = match self.end {
            None if all_day => start_ts + ALL_DAY_SPAN,
            None => start_ts,
            // DTEND dates are exclusive.
            Some((end, true)) if all_day => end - 1,
            Some((end, _)) => end,
        };
        Some(IcsEvent {
            uid,
            summary: self
                .summary
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "(No title)".to_string()),
            location: self.location,
            status: self
                .status
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "confirmed".to_string()),
            start_ts,
            end_ts: end_ts.max(start_ts),
            all_day,
        })
    }
}

/// Extract every well-formed `VEVENT` from a feed body.
///
/// Blocks without a `UID` or a parseable `DTSTART` are dropped. Properties of
/// nested components such as `VALARM` do not leak into the event.
pub fn parse_events(body: &str) -> Vec<IcsEvent> {
    let mut events = Vec::new();
    let mut current: Option<EventBuilder> = None;
    let mut nested = 0usize;

    for raw in unfold_lines(body) {
        let Some(line) = split_line(&raw) else {
            continue;
        };
        let value = line.value.trim();
        match line.name.as_str() {
            "BEGIN" if value.eq_ignore_ascii_case("VEVENT") && current.is_none() => {
                current = Some(EventBuilder::default());
                nested = 0;
            }
            "BEGIN" if current.is_some() => nested += 1,
            "END" if current.is_some() && nested > 0 => nested -= 1,
            "END" if value.eq_ignore_ascii_case("VEVENT") => {
                if let Some(event) = current.take().and_then(EventBuilder::finish) {
                    events.push(event);
                }
            }
            _ => {
                if nested == 0 {
                    if let Some(builder) = current.as_mut() {
                        builder.apply(&line);
                    }
                }
            }
        }
    }
    events
}
