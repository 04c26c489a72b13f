//! Health events: the immutable, timestamped inputs of the timeline.
//!
//! Events arrive from an external source. Individual malformed or
//! out-of-range events are skipped (and logged) by [`partition_valid`]
//! rather than aborting the rest of the set.

use std::collections::BTreeSet;

use chrono::{Datelike, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::metrics::MetricKind;
use crate::scale::local_date;
use crate::types::Timestamp;
use crate::validation::validate_measurement;

// ---------------------------------------------------------------------------
// Plausibility bounds
// ---------------------------------------------------------------------------

/// Accepted body weight range in kilograms.
pub const WEIGHT_KG_RANGE: std::ops::RangeInclusive<f64> = 20.0..=400.0;
/// Accepted body-fat range in percent.
pub const BODY_FAT_PERCENT_RANGE: std::ops::RangeInclusive<f64> = 2.0..=75.0;
/// Accepted fat-free mass index range.
pub const FFMI_RANGE: std::ops::RangeInclusive<f64> = 5.0..=40.0;
/// Accepted DEXA lean/fat mass range in kilograms.
pub const MASS_KG_RANGE: std::ops::RangeInclusive<f64> = 0.5..=300.0;
/// Largest step count a single event may carry.
pub const MAX_STEPS_PER_EVENT: u32 = 200_000;
/// Events dated before this year are rejected.
pub const MIN_EVENT_YEAR: i32 = 1900;

// ---------------------------------------------------------------------------
// StreamType / EventPayload
// ---------------------------------------------------------------------------

/// The stream an event belongs to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum StreamType {
    Weight,
    BodyFat,
    Dexa,
    Steps,
    Photo,
}

/// Stream-specific event data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stream", rename_all = "snake_case")]
pub enum EventPayload {
    Weight {
        kg: f64,
    },
    BodyFat {
        percent: f64,
    },
    /// A DEXA scan bundle; any subset of the measurements may be reported.
    Dexa {
        #[serde(default)]
        ffmi: Option<f64>,
        #[serde(default)]
        lean_mass_kg: Option<f64>,
        #[serde(default)]
        fat_mass_kg: Option<f64>,
    },
    Steps {
        count: u32,
    },
    Photo {
        photo_id: String,
    },
}

// ---------------------------------------------------------------------------
// HealthEvent
// ---------------------------------------------------------------------------

/// A single immutable health reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthEvent {
    /// Stable identifier assigned by the event source.
    pub id: String,
    pub timestamp: Timestamp,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl HealthEvent {
    pub fn new(id: impl Into<String>, timestamp: Timestamp, payload: EventPayload) -> Self {
        Self {
            id: id.into(),
            timestamp,
            payload,
        }
    }

    pub fn stream(&self) -> StreamType {
        match self.payload {
            EventPayload::Weight { .. } => StreamType::Weight,
            EventPayload::BodyFat { .. } => StreamType::BodyFat,
            EventPayload::Dexa { .. } => StreamType::Dexa,
            EventPayload::Steps { .. } => StreamType::Steps,
            EventPayload::Photo { .. } => StreamType::Photo,
        }
    }

    /// The value this event observes for `metric`, if any.
    pub fn value_for(&self, metric: MetricKind) -> Option<f64> {
        match (&self.payload, metric) {
            (EventPayload::Weight { kg }, MetricKind::Weight) => Some(*kg),
            (EventPayload::BodyFat { percent }, MetricKind::BodyFat) => Some(*percent),
            (EventPayload::Dexa { ffmi, .. }, MetricKind::Ffmi) => *ffmi,
            (EventPayload::Dexa { lean_mass_kg, .. }, MetricKind::LeanMass) => *lean_mass_kg,
            (EventPayload::Dexa { fat_mass_kg, .. }, MetricKind::FatMass) => *fat_mass_kg,
            (EventPayload::Steps { count }, MetricKind::Steps) => Some(f64::from(*count)),
            _ => None,
        }
    }

    pub fn photo_id(&self) -> Option<&str> {
        match &self.payload {
            EventPayload::Photo { photo_id } => Some(photo_id.as_str()),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Check a single event for malformed or implausible content.
///
/// `latest_date` is the last local calendar day an event may fall on;
/// anything later is treated as out of range.
pub fn validate_event(
    event: &HealthEvent,
    latest_date: NaiveDate,
    offset: FixedOffset,
) -> Result<(), CoreError> {
    if event.id.trim().is_empty() {
        return Err(CoreError::Validation("event id must not be empty".into()));
    }

    let date = local_date(event.timestamp, offset);
    if date.year() < MIN_EVENT_YEAR {
        return Err(CoreError::Validation(format!(
            "event date {date} is before {MIN_EVENT_YEAR}"
        )));
    }
    if date > latest_date {
        return Err(CoreError::Validation(format!(
            "event date {date} is after {latest_date}"
        )));
    }

    match &event.payload {
        EventPayload::Weight { kg } => validate_measurement(*kg, WEIGHT_KG_RANGE, "weight kg"),
        EventPayload::BodyFat { percent } => {
            validate_measurement(*percent, BODY_FAT_PERCENT_RANGE, "body fat percent")
        }
        EventPayload::Dexa {
            ffmi,
            lean_mass_kg,
            fat_mass_kg,
        } => {
            if ffmi.is_none() && lean_mass_kg.is_none() && fat_mass_kg.is_none() {
                return Err(CoreError::Validation(
                    "DEXA event carries no measurements".into(),
                ));
            }
            if let Some(v) = ffmi {
                validate_measurement(*v, FFMI_RANGE, "ffmi")?;
            }
            if let Some(v) = lean_mass_kg {
                validate_measurement(*v, MASS_KG_RANGE, "lean mass kg")?;
            }
            if let Some(v) = fat_mass_kg {
                validate_measurement(*v, MASS_KG_RANGE, "fat mass kg")?;
            }
            Ok(())
        }
        EventPayload::Steps { count } => {
            if *count > MAX_STEPS_PER_EVENT {
                return Err(CoreError::Validation(format!(
                    "step count {count} exceeds {MAX_STEPS_PER_EVENT}"
                )));
            }
            Ok(())
        }
        EventPayload::Photo { photo_id } => {
            if photo_id.trim().is_empty() {
                return Err(CoreError::Validation("photo id must not be empty".into()));
            }
            Ok(())
        }
    }
}

/// Valid events in canonical order plus the number that were skipped.
#[derive(Debug, Clone, Default)]
pub struct ValidatedEvents {
    /// Sorted by `(timestamp, id, payload)`; ids are unique.
    pub events: Vec<HealthEvent>,
    pub skipped: usize,
}

/// Drop malformed, out-of-range and duplicate-id events.
///
/// The result is independent of input order: events are sorted by
/// `(timestamp, id, payload)` and for duplicate ids the first occurrence in
/// that order wins. Every skipped event is logged.
pub fn partition_valid(
    events: &[HealthEvent],
    latest_date: NaiveDate,
    offset: FixedOffset,
) -> ValidatedEvents {
    let mut sorted: Vec<&HealthEvent> = events.iter().collect();
    // Serialized payload breaks ties between same-instant duplicates.
    sorted.sort_by_cached_key(|e| {
        (
            e.timestamp,
            e.id.clone(),
            serde_json::to_vec(&e.payload).unwrap_or_default(),
        )
    });

    let mut seen: BTreeSet<&str> = BTreeSet::new();
    let mut valid = Vec::with_capacity(sorted.len());
    let mut skipped = 0;

    for event in sorted {
        if let Err(e) = validate_event(event, latest_date, offset) {
            tracing::warn!(
                event_id = %event.id,
                stream = ?event.stream(),
                error = %e,
                "Skipping malformed health event"
            );
            skipped += 1;
            continue;
        }
        if !seen.insert(event.id.as_str()) {
            tracing::warn!(event_id = %event.id, "Skipping duplicate health event id");
            skipped += 1;
            continue;
        }
        valid.push(event.clone());
    }

    ValidatedEvents {
        events: valid,
        skipped,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
