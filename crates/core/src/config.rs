//! Timeline engine configuration.
//!
//! Every tunable policy of the engine lives here so deployments can adjust
//! bucket counts, interpolation caps and freshness bounds in one place.
//! All fields have defaults; [`TimelineConfig::from_env`] overrides them
//! from `TIMELINE_*` environment variables.

use std::fmt::Display;
use std::str::FromStr;

use chrono::{FixedOffset, Offset, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::metrics::MetricKind;
use crate::validation::{validate_count_range, validate_unit_range};

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Number of data-bearing weeks rendered in the recent zone.
pub const DEFAULT_RECENT_WEEKS: usize = 4;

/// Number of calendar months rendered in the medium zone.
pub const DEFAULT_TRAILING_MONTHS: usize = 6;

/// Longest run of consecutive missing months/years that interpolation may
/// bridge. Longer runs stay missing.
pub const DEFAULT_MAX_INTERPOLATION_GAP: usize = 2;

/// Minimum confidence for an estimated value to count as usable.
pub const DEFAULT_HIGH_CONFIDENCE_THRESHOLD: f64 = 0.5;

/// Days of step data needed in a week for a `present` step average.
pub const DEFAULT_STEPS_FULL_COVERAGE_DAYS: u32 = 5;

/// Carry-forward bound for weight readings, in days.
pub const DEFAULT_WEIGHT_FRESHNESS_DAYS: i64 = 14;

/// Carry-forward bound for body-fat readings, in days.
pub const DEFAULT_BODY_FAT_FRESHNESS_DAYS: i64 = 28;

/// Carry-forward bound for DEXA-derived metrics, in days.
pub const DEFAULT_DEXA_FRESHNESS_DAYS: i64 = 120;

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

const MAX_RECENT_WEEKS: usize = 52;
const MAX_TRAILING_MONTHS: usize = 24;
const MAX_INTERPOLATION_GAP: usize = 12;
const MIN_UTC_OFFSET_MINUTES: i32 = -12 * 60;
const MAX_UTC_OFFSET_MINUTES: i32 = 14 * 60;
const MAX_FRESHNESS_DAYS: i64 = 366;

// ---------------------------------------------------------------------------
// FreshnessBounds
// ---------------------------------------------------------------------------

/// Per-stream carry-forward bounds for weekly scalar metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FreshnessBounds {
    pub weight_days: i64,
    pub body_fat_days: i64,
    pub dexa_days: i64,
}

impl Default for FreshnessBounds {
    fn default() -> Self {
        Self {
            weight_days: DEFAULT_WEIGHT_FRESHNESS_DAYS,
            body_fat_days: DEFAULT_BODY_FAT_FRESHNESS_DAYS,
            dexa_days: DEFAULT_DEXA_FRESHNESS_DAYS,
        }
    }
}

impl FreshnessBounds {
    /// Carry-forward bound for a metric, or `None` if the metric is never
    /// carried forward (steps).
    pub fn days_for(&self, metric: MetricKind) -> Option<i64> {
        match metric {
            MetricKind::Weight => Some(self.weight_days),
            MetricKind::BodyFat => Some(self.body_fat_days),
            MetricKind::Ffmi | MetricKind::LeanMass | MetricKind::FatMass => Some(self.dexa_days),
            MetricKind::Steps => None,
        }
    }
}

// ---------------------------------------------------------------------------
// TimelineConfig
// ---------------------------------------------------------------------------

/// Policy knobs for bucket building, aggregation and interpolation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    /// First day of a week bucket.
    pub week_start: Weekday,
    /// Local offset used to map UTC timestamps onto calendar days.
    pub utc_offset_minutes: i32,
    pub recent_weeks: usize,
    pub trailing_months: usize,
    pub max_interpolation_gap: usize,
    pub high_confidence_threshold: f64,
    pub steps_full_coverage_days: u32,
    pub freshness: FreshnessBounds,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            week_start: Weekday::Mon,
            utc_offset_minutes: 0,
            recent_weeks: DEFAULT_RECENT_WEEKS,
            trailing_months: DEFAULT_TRAILING_MONTHS,
            max_interpolation_gap: DEFAULT_MAX_INTERPOLATION_GAP,
            high_confidence_threshold: DEFAULT_HIGH_CONFIDENCE_THRESHOLD,
            steps_full_coverage_days: DEFAULT_STEPS_FULL_COVERAGE_DAYS,
            freshness: FreshnessBounds::default(),
        }
    }
}

impl TimelineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                               | Default |
    /// |---------------------------------------|---------|
    /// | `TIMELINE_WEEK_START`                 | `Mon`   |
    /// | `TIMELINE_UTC_OFFSET_MINUTES`         | `0`     |
    /// | `TIMELINE_RECENT_WEEKS`               | `4`     |
    /// | `TIMELINE_TRAILING_MONTHS`            | `6`     |
    /// | `TIMELINE_MAX_INTERPOLATION_GAP`      | `2`     |
    /// | `TIMELINE_HIGH_CONFIDENCE_THRESHOLD`  | `0.5`   |
    /// | `TIMELINE_STEPS_FULL_COVERAGE_DAYS`   | `5`     |
    /// | `TIMELINE_WEIGHT_FRESHNESS_DAYS`      | `14`    |
    /// | `TIMELINE_BODY_FAT_FRESHNESS_DAYS`    | `28`    |
    /// | `TIMELINE_DEXA_FRESHNESS_DAYS`        | `120`   |
    ///
    /// The loaded configuration is validated before it is returned.
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    ///
    /// [`from_env`](Self::from_env) delegates here; tests pass a map.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let config = Self {
            week_start: parse_var(&lookup, "TIMELINE_WEEK_START")?.unwrap_or(defaults.week_start),
            utc_offset_minutes: parse_var(&lookup, "TIMELINE_UTC_OFFSET_MINUTES")?
                .unwrap_or(defaults.utc_offset_minutes),
            recent_weeks: parse_var(&lookup, "TIMELINE_RECENT_WEEKS")?
                .unwrap_or(defaults.recent_weeks),
            trailing_months: parse_var(&lookup, "TIMELINE_TRAILING_MONTHS")?
                .unwrap_or(defaults.trailing_months),
            max_interpolation_gap: parse_var(&lookup, "TIMELINE_MAX_INTERPOLATION_GAP")?
                .unwrap_or(defaults.max_interpolation_gap),
            high_confidence_threshold: parse_var(&lookup, "TIMELINE_HIGH_CONFIDENCE_THRESHOLD")?
                .unwrap_or(defaults.high_confidence_threshold),
            steps_full_coverage_days: parse_var(&lookup, "TIMELINE_STEPS_FULL_COVERAGE_DAYS")?
                .unwrap_or(defaults.steps_full_coverage_days),
            freshness: FreshnessBounds {
                weight_days: parse_var(&lookup, "TIMELINE_WEIGHT_FRESHNESS_DAYS")?
                    .unwrap_or(defaults.freshness.weight_days),
                body_fat_days: parse_var(&lookup, "TIMELINE_BODY_FAT_FRESHNESS_DAYS")?
                    .unwrap_or(defaults.freshness.body_fat_days),
                dexa_days: parse_var(&lookup, "TIMELINE_DEXA_FRESHNESS_DAYS")?
                    .unwrap_or(defaults.freshness.dexa_days),
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// Check every field against its allowed range.
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_count_range(self.recent_weeks, 1, MAX_RECENT_WEEKS, "recent_weeks")?;
        validate_count_range(self.trailing_months, 1, MAX_TRAILING_MONTHS, "trailing_months")?;
        validate_count_range(
            self.max_interpolation_gap,
            0,
            MAX_INTERPOLATION_GAP,
            "max_interpolation_gap",
        )?;
        validate_count_range(
            self.steps_full_coverage_days as usize,
            1,
            7,
            "steps_full_coverage_days",
        )?;
        validate_unit_range(self.high_confidence_threshold, "high_confidence_threshold")?;

        if !(MIN_UTC_OFFSET_MINUTES..=MAX_UTC_OFFSET_MINUTES).contains(&self.utc_offset_minutes) {
            return Err(CoreError::Validation(format!(
                "utc_offset_minutes must be between {MIN_UTC_OFFSET_MINUTES} and \
                 {MAX_UTC_OFFSET_MINUTES}, got {}",
                self.utc_offset_minutes
            )));
        }

        for (name, days) in [
            ("weight_freshness_days", self.freshness.weight_days),
            ("body_fat_freshness_days", self.freshness.body_fat_days),
            ("dexa_freshness_days", self.freshness.dexa_days),
        ] {
            if !(1..=MAX_FRESHNESS_DAYS).contains(&days) {
                return Err(CoreError::Validation(format!(
                    "{name} must be between 1 and {MAX_FRESHNESS_DAYS}, got {days}"
                )));
            }
        }
        Ok(())
    }

    /// The configured local offset. Falls back to UTC for out-of-range
    /// values, which [`validate`](Self::validate) rejects anyway.
    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }
}

/// Parse an optional variable, mapping parse failures to a validation error.
fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>, CoreError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| CoreError::Validation(format!("{key} is invalid ({raw}): {e}"))),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
