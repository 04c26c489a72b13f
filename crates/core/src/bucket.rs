//! Bucket shells: the per-scale time windows that aggregation fills in.
//!
//! Builders here only decide *which* windows exist. Values are attached
//! later by [`crate::aggregation`] and [`crate::interpolation`].

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::config::TimelineConfig;
use crate::event::HealthEvent;
use crate::metrics::{MetricKind, MetricsSnapshot};
use crate::scale::{
    self, local_date, month_end, month_id, month_start, shift_months, week_end, week_id,
    week_start_for, year_id, year_start, TimelineScale,
};

// ---------------------------------------------------------------------------
// TimelineBucket
// ---------------------------------------------------------------------------

/// One time window at one scale, with its aggregated metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineBucket {
    /// Stable key: `2025-W42`, `2025-07` or `2023`.
    pub id: String,
    pub scale: TimelineScale,
    /// Inclusive first local day.
    pub start_date: NaiveDate,
    /// Exclusive end; always after `start_date`.
    pub end_date: NaiveDate,
    /// Holds no events; rendered only because interpolation filled it.
    pub bridge: bool,
    pub metrics: MetricsSnapshot,
}

impl TimelineBucket {
    /// A bucket with its window set and every metric missing.
    pub fn shell(
        id: String,
        scale: TimelineScale,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Self {
        Self {
            id,
            scale,
            start_date,
            end_date,
            bridge: false,
            metrics: MetricsSnapshot::empty(),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date < self.end_date
    }

    pub fn midpoint(&self) -> NaiveDateTime {
        scale::window_midpoint(self.start_date, self.end_date)
    }

    /// Days between `date` and this window; zero when inside it.
    pub fn distance_days(&self, date: NaiveDate) -> i64 {
        if date < self.start_date {
            (self.start_date - date).num_days()
        } else if date >= self.end_date {
            (date - self.end_date).num_days() + 1
        } else {
            0
        }
    }
}

// ---------------------------------------------------------------------------
// Week shells
// ---------------------------------------------------------------------------

fn week_shell(start: NaiveDate) -> TimelineBucket {
    TimelineBucket::shell(week_id(start), TimelineScale::Week, start, week_end(start))
}

/// Every week containing at least one event, oldest first.
pub fn all_week_shells(events: &[HealthEvent], config: &TimelineConfig) -> Vec<TimelineBucket> {
    let offset = config.offset();
    let starts: BTreeSet<NaiveDate> = events
        .iter()
        .map(|e| week_start_for(local_date(e.timestamp, offset), config.week_start))
        .collect();
    starts.into_iter().map(week_shell).collect()
}

/// The most recent `recent_weeks` data-bearing weeks, oldest first.
pub fn build_week_shells(events: &[HealthEvent], config: &TimelineConfig) -> Vec<TimelineBucket> {
    recent_weeks(&all_week_shells(events, config), config.recent_weeks).to_vec()
}

/// Tail of an oldest-first week list holding at most `count` weeks.
pub fn recent_weeks(weeks: &[TimelineBucket], count: usize) -> &[TimelineBucket] {
    &weeks[weeks.len().saturating_sub(count)..]
}

// ---------------------------------------------------------------------------
// Month shells
// ---------------------------------------------------------------------------

fn month_shell(start: NaiveDate) -> Option<TimelineBucket> {
    let end = month_end(start)?;
    Some(TimelineBucket::shell(
        month_id(start),
        TimelineScale::Month,
        start,
        end,
    ))
}

/// The trailing month window that precedes the oldest rendered week.
///
/// Emits `trailing_months` consecutive months, the last being the month
/// before the one containing `oldest_week_start`. All months are emitted
/// even if empty. `None` (no weeks, i.e. no data) yields no months.
pub fn build_month_shells(
    oldest_week_start: Option<NaiveDate>,
    config: &TimelineConfig,
) -> Vec<TimelineBucket> {
    let Some(anchor) = oldest_week_start.map(month_start) else {
        return Vec::new();
    };
    let count = config.trailing_months as i32;
    (1..=count)
        .rev()
        .filter_map(|back| shift_months(anchor, -back))
        .filter_map(month_shell)
        .collect()
}

/// Every month from the month of `first` through the month of `last`.
pub fn month_shells_between(first: NaiveDate, last: NaiveDate) -> Vec<TimelineBucket> {
    let mut shells = Vec::new();
    let mut cursor = month_start(first);
    let last = month_start(last);
    while cursor <= last {
        let Some(shell) = month_shell(cursor) else {
            break;
        };
        cursor = shell.end_date;
        shells.push(shell);
    }
    shells
}

// ---------------------------------------------------------------------------
// Year shells
// ---------------------------------------------------------------------------

/// Every year from `first_year` through `last_year`.
pub fn year_shells_between(first_year: i32, last_year: i32) -> Vec<TimelineBucket> {
    (first_year..=last_year)
        .filter_map(|year| {
            let start = year_start(year)?;
            let end = year_start(year + 1)?;
            Some(TimelineBucket::shell(
                year_id(year),
                TimelineScale::Year,
                start,
                end,
            ))
        })
        .collect()
}

/// Candidate years from the earliest event's year through `today`'s year.
///
/// Years before the first event are never emitted. Which candidates are
/// finally rendered is decided after interpolation by [`retain_rendered_years`].
pub fn build_year_shells(
    events: &[HealthEvent],
    today: NaiveDate,
    config: &TimelineConfig,
) -> Vec<TimelineBucket> {
    let offset = config.offset();
    let Some(first_year) = events
        .iter()
        .map(|e| local_date(e.timestamp, offset).year())
        .min()
    else {
        return Vec::new();
    };
    year_shells_between(first_year, today.year().max(first_year))
}

/// Keep every year holding a valid event, plus event-free years that
/// interpolation filled, which are flagged as bridges.
///
/// `observed` is the same year sequence before interpolation.
pub fn retain_rendered_years(
    years: &mut Vec<TimelineBucket>,
    observed: &[TimelineBucket],
    events: &[HealthEvent],
    config: &TimelineConfig,
) {
    let offset = config.offset();
    let event_years: BTreeSet<i32> = events
        .iter()
        .map(|e| local_date(e.timestamp, offset).year())
        .collect();

    for (year, before) in years.iter_mut().zip(observed) {
        year.bridge = !event_years.contains(&year.start_date.year())
            && MetricKind::ALL.into_iter().any(|metric| {
                before.metrics.get(metric).is_missing() && !year.metrics.get(metric).is_missing()
            });
    }
    years.retain(|year| year.bridge || event_years.contains(&year.start_date.year()));
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
