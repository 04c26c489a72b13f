//! Timeline scales and the calendar arithmetic behind bucket windows.
//!
//! All window math operates on local calendar dates; UTC timestamps are
//! mapped through the configured fixed offset first. Bucket ids are derived
//! purely from window start dates so the same calendar period always
//! yields the same id.

use std::str::FromStr;

use chrono::{
    Datelike, Days, FixedOffset, Months, NaiveDate, NaiveDateTime, NaiveTime, Weekday,
};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// TimelineScale
// ---------------------------------------------------------------------------

/// Bucket granularity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TimelineScale {
    Week,
    Month,
    Year,
}

/// The UI zone a scale feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineZone {
    Recent,
    Medium,
    Coarse,
}

impl TimelineScale {
    pub const ALL: [TimelineScale; 3] =
        [TimelineScale::Week, TimelineScale::Month, TimelineScale::Year];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
        }
    }

    pub fn zone(self) -> TimelineZone {
        match self {
            Self::Week => TimelineZone::Recent,
            Self::Month => TimelineZone::Medium,
            Self::Year => TimelineZone::Coarse,
        }
    }

    /// Whether gaps at this scale may be bridged by interpolation.
    pub fn interpolates(self) -> bool {
        !matches!(self, Self::Week)
    }
}

impl std::fmt::Display for TimelineScale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimelineScale {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "year" => Ok(Self::Year),
            other => Err(CoreError::Validation(format!(
                "Unknown timeline scale '{other}', expected week, month or year"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Local time mapping
// ---------------------------------------------------------------------------

/// Wall-clock time of `ts` at `offset`.
pub fn local_datetime(ts: Timestamp, offset: FixedOffset) -> NaiveDateTime {
    ts.with_timezone(&offset).naive_local()
}

/// Calendar date of `ts` at `offset`.
pub fn local_date(ts: Timestamp, offset: FixedOffset) -> NaiveDate {
    local_datetime(ts, offset).date()
}

// ---------------------------------------------------------------------------
// Week windows
// ---------------------------------------------------------------------------

/// Start date of the week containing `date`, for weeks beginning on
/// `week_start`.
pub fn week_start_for(date: NaiveDate, week_start: Weekday) -> NaiveDate {
    let back = (date.weekday().num_days_from_monday() + 7 - week_start.num_days_from_monday()) % 7;
    date - Days::new(u64::from(back))
}

/// Exclusive end of the week starting at `start`.
pub fn week_end(start: NaiveDate) -> NaiveDate {
    start + Days::new(7)
}

/// The day a week is attributed to for id and month assignment.
///
/// The fourth day of the window, which for Monday weeks is the ISO Thursday.
pub fn week_anchor(start: NaiveDate) -> NaiveDate {
    start + Days::new(3)
}

/// Week bucket id, e.g. `2025-W07`.
///
/// Uses the ISO week-year and week number of the anchor day. Consecutive
/// windows have anchors exactly seven days apart, so ids stay unique and
/// sort chronologically for any start weekday.
pub fn week_id(start: NaiveDate) -> String {
    let iso = week_anchor(start).iso_week();
    format!("{:04}-W{:02}", iso.year(), iso.week())
}

// ---------------------------------------------------------------------------
// Month windows
// ---------------------------------------------------------------------------

/// First day of the month containing `date`.
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Shift a month start by `delta` months.
pub fn shift_months(start: NaiveDate, delta: i32) -> Option<NaiveDate> {
    let months = Months::new(delta.unsigned_abs());
    if delta >= 0 {
        start.checked_add_months(months)
    } else {
        start.checked_sub_months(months)
    }
}

/// Exclusive end of the month starting at `start`.
pub fn month_end(start: NaiveDate) -> Option<NaiveDate> {
    shift_months(start, 1)
}

/// Month bucket id, e.g. `2025-07`.
pub fn month_id(start: NaiveDate) -> String {
    format!("{:04}-{:02}", start.year(), start.month())
}

// ---------------------------------------------------------------------------
// Year windows
// ---------------------------------------------------------------------------

pub fn year_start(year: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, 1, 1)
}

/// Year bucket id, e.g. `2023`.
pub fn year_id(year: i32) -> String {
    format!("{year:04}")
}

// ---------------------------------------------------------------------------
// Midpoints
// ---------------------------------------------------------------------------

/// Midpoint of the half-open window `[start, end)` at local midnight
/// boundaries.
pub fn window_midpoint(start: NaiveDate, end: NaiveDate) -> NaiveDateTime {
    let start_dt = start.and_time(NaiveTime::MIN);
    let end_dt = end.and_time(NaiveTime::MIN);
    start_dt + (end_dt - start_dt) / 2
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn monday_week_start() {
        // 2025-10-16 is a Thursday.
        assert_eq!(week_start_for(date(2025, 10, 16), Weekday::Mon), date(2025, 10, 13));
        assert_eq!(week_start_for(date(2025, 10, 13), Weekday::Mon), date(2025, 10, 13));
    }

    #[test]
    fn sunday_week_start() {
        assert_eq!(week_start_for(date(2025, 10, 16), Weekday::Sun), date(2025, 10, 12));
        assert_eq!(week_start_for(date(2025, 10, 12), Weekday::Sun), date(2025, 10, 12));
    }

    #[test]
    fn week_id_matches_iso_week_for_monday_weeks() {
        assert_eq!(week_id(date(2025, 10, 13)), "2025-W42");
        // ISO week 1 of 2026 starts on 2025-12-29.
        assert_eq!(week_id(date(2025, 12, 29)), "2026-W01");
    }

    #[test]
    fn consecutive_sunday_weeks_have_distinct_ordered_ids() {
        let mut start = date(2024, 12, 1);
        let mut previous = week_id(start);
        for _ in 0..60 {
            start = week_end(start);
            let id = week_id(start);
            assert!(id > previous, "{id} should sort after {previous}");
            previous = id;
        }
    }

    #[test]
    fn month_ids_and_bounds() {
        let start = month_start(date(2025, 2, 17));
        assert_eq!(start, date(2025, 2, 1));
        assert_eq!(month_id(start), "2025-02");
        assert_eq!(month_end(start), Some(date(2025, 3, 1)));
        assert_eq!(shift_months(start, -3), Some(date(2024, 11, 1)));
    }

    #[test]
    fn year_ids_are_zero_padded() {
        assert_eq!(year_id(2023), "2023");
        assert_eq!(year_id(987), "0987");
    }

    #[test]
    fn local_date_applies_offset() {
        let ts = chrono::Utc.with_ymd_and_hms(2025, 3, 1, 2, 0, 0).unwrap();
        let west = FixedOffset::west_opt(5 * 3600).unwrap();
        assert_eq!(local_date(ts, west), date(2025, 2, 28));
    }

    #[test]
    fn week_midpoint_is_thursday_noon() {
        let start = date(2025, 10, 13);
        let mid = window_midpoint(start, week_end(start));
        assert_eq!(mid, date(2025, 10, 16).and_hms_opt(12, 0, 0).unwrap());
    }

    #[test]
    fn scale_parses_case_insensitively() {
        assert_eq!("Month".parse::<TimelineScale>().unwrap(), TimelineScale::Month);
        assert!("decade".parse::<TimelineScale>().is_err());
    }

    #[test]
    fn only_coarse_scales_interpolate() {
        assert!(!TimelineScale::Week.interpolates());
        assert!(TimelineScale::Month.interpolates());
        assert!(TimelineScale::Year.interpolates());
    }
}
