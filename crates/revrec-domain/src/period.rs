//! Calendar arithmetic: month spans, month boundaries, and monthly period slicing.

use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
/// An inclusive date range covering at most one calendar month.
pub struct Period {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Period {
    /// `YYYY-MM` of the month the period falls in.
    pub fn key(&self) -> String {
        self.start.format("%Y-%m").to_string()
    }

    /// A period has ended once `as_of` reaches its last day.
    pub fn has_ended(&self, as_of: NaiveDate) -> bool {
        self.end <= as_of
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Shifts `date` by `months`, clamping the day to the target month length.
pub fn shift_months(date: NaiveDate, months: i32) -> NaiveDate {
    let index = date.year() * 12 + date.month0() as i32 + months;
    let year = index.div_euclid(12);
    let month = index.rem_euclid(12) as u32 + 1;
    let day = date.day().min(days_in_month(year, month));
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or(date)
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map(|last| last.day())
        .unwrap_or(28)
}

pub fn month_end(date: NaiveDate) -> NaiveDate {
    date.with_day(days_in_month(date.year(), date.month()))
        .unwrap_or(date)
}

/// Number of months needed to cover the inclusive range `[start, end]`, counting a trailing
/// partial month as a whole one. Returns 0 when `end` precedes `start`.
pub fn months_between(start: NaiveDate, end: NaiveDate) -> u32 {
    if end < start {
        return 0;
    }
    let Some(end_exclusive) = end.succ_opt() else {
        return 0;
    };
    let mut months = (end_exclusive.year() - start.year()) * 12 + end_exclusive.month() as i32
        - start.month() as i32;
    while months > 0 && shift_months(start, months) > end_exclusive {
        months -= 1;
    }
    if shift_months(start, months) < end_exclusive {
        months += 1;
    }
    months.max(0) as u32
}

/// Slices `[start, end]` into one period per calendar month touched. The first and last
/// periods are clipped to the range.
pub fn monthly_periods(start: NaiveDate, end: NaiveDate) -> Vec<Period> {
    let mut periods = Vec::new();
    let mut cursor = start;
    while cursor <= end {
        let period_end = month_end(cursor).min(end);
        periods.push(Period {
            start: cursor,
            end: period_end,
        });
        match period_end.succ_opt() {
            Some(next) => cursor = next,
            None => break,
        }
    }
    periods
}

/// Parses `YYYY-MM-DD`, RFC 3339 timestamps, and naive `YYYY-MM-DDTHH:MM:SS[.f]` values.
pub fn parse_flexible_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(stamp) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(stamp.with_timezone(&Utc).date_naive());
    }
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.date())
}

/// Midnight UTC at the start of `date`.
pub fn date_start_utc(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn shift_months_clamps_to_month_end() {
        assert_eq!(shift_months(d(2025, 1, 31), 1), d(2025, 2, 28));
        assert_eq!(shift_months(d(2024, 1, 31), 1), d(2024, 2, 29));
        assert_eq!(shift_months(d(2025, 11, 15), 3), d(2026, 2, 15));
        assert_eq!(shift_months(d(2025, 1, 15), -2), d(2024, 11, 15));
    }

    #[test]
    fn months_between_counts_full_calendar_year() {
        assert_eq!(months_between(d(2025, 1, 1), d(2025, 12, 31)), 12);
        assert_eq!(months_between(d(2025, 1, 15), d(2026, 1, 14)), 12);
        assert_eq!(months_between(d(2025, 1, 1), d(2025, 1, 1)), 1);
        assert_eq!(months_between(d(2025, 1, 1), d(2025, 2, 10)), 2);
        assert_eq!(months_between(d(2025, 3, 1), d(2025, 2, 1)), 0);
    }

    #[test]
    fn monthly_periods_clip_edges() {
        let periods = monthly_periods(d(2025, 1, 15), d(2025, 3, 10));
        assert_eq!(periods.len(), 3);
        assert_eq!(periods[0].start, d(2025, 1, 15));
        assert_eq!(periods[0].end, d(2025, 1, 31));
        assert_eq!(periods[1].start, d(2025, 2, 1));
        assert_eq!(periods[1].end, d(2025, 2, 28));
        assert_eq!(periods[2].end, d(2025, 3, 10));
        assert_eq!(periods[2].key(), "2025-03");
    }

    #[test]
    fn monthly_periods_empty_for_inverted_range() {
        assert!(monthly_periods(d(2025, 2, 1), d(2025, 1, 1)).is_empty());
    }

    #[test]
    fn parse_flexible_date_accepts_common_shapes() {
        assert_eq!(parse_flexible_date("2025-01-15"), Some(d(2025, 1, 15)));
        assert_eq!(
            parse_flexible_date("2025-01-15T10:00:00Z"),
            Some(d(2025, 1, 15))
        );
        assert_eq!(
            parse_flexible_date("2025-01-15T10:00:00"),
            Some(d(2025, 1, 15))
        );
        assert_eq!(parse_flexible_date("next tuesday"), None);
        assert_eq!(parse_flexible_date(""), None);
    }
}
