// Calendar logic: the wall-clock date-range type used on the wire and
// the generators for the ranges the batch driver iterates over.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use std::fmt;

/// Wire format for every timestamp sent to the report service.
pub const STAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One calendar month to cover with daily ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchMonth {
    pub year: i32,
    /// 1-based month number.
    pub month: u32,
}

/// A wall-clock date range, start inclusive, end exclusive.
///
/// The one exception is [`yesterday_range`], which keeps the closed
/// 23:59:59 end the report service historically received for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl DateRange {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        DateRange { start, end }
    }

    /// Parse a range from two `YYYY-MM-DD HH:MM:SS` stamps.
    pub fn parse(start: &str, end: &str) -> Result<Self, chrono::ParseError> {
        Ok(DateRange {
            start: parse_stamp(start)?,
            end: parse_stamp(end)?,
        })
    }

    pub fn start_stamp(&self) -> String {
        self.start.format(STAMP_FORMAT).to_string()
    }

    pub fn end_stamp(&self) -> String {
        self.end.format(STAMP_FORMAT).to_string()
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start_stamp(), self.end_stamp())
    }
}

/// Parse one `YYYY-MM-DD HH:MM:SS` stamp.
pub fn parse_stamp(raw: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(raw.trim(), STAMP_FORMAT)
}

/// Daily half-open ranges covering one calendar month, midnight to the
/// next midnight. The last day of a month rolls into the first day of
/// the following month. An invalid month yields no ranges.
pub fn daily_ranges_for_month(year: i32, month: u32) -> Vec<DateRange> {
    let first = match NaiveDate::from_ymd_opt(year, month, 1) {
        Some(date) => date,
        None => return Vec::new(),
    };

    let mut ranges = Vec::new();
    let mut day = first;
    while day.month() == month {
        let next = match day.succ_opt() {
            Some(next) => next,
            None => break,
        };
        ranges.push(DateRange::new(
            day.and_time(NaiveTime::MIN),
            next.and_time(NaiveTime::MIN),
        ));
        day = next;
    }
    ranges
}

/// Daily ranges for every configured month, in order.
pub fn daily_ranges(months: &[BatchMonth]) -> Vec<DateRange> {
    months
        .iter()
        .flat_map(|m| daily_ranges_for_month(m.year, m.month))
        .collect()
}

/// Yesterday relative to `today`: 00:00:00 through 23:59:59 of the
/// previous day. `None` only when no previous day exists.
pub fn yesterday_range(today: NaiveDate) -> Option<DateRange> {
    let yesterday = today.pred_opt()?;
    let end_of_day = NaiveTime::from_hms_opt(23, 59, 59)?;
    Some(DateRange::new(
        yesterday.and_time(NaiveTime::MIN),
        yesterday.and_time(end_of_day),
    ))
}
