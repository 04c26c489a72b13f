//! Metric aggregation: reduce events (or finer buckets) to one value per
//! metric per bucket.
//!
//! - Weekly scalars use the median of in-window observations, falling back
//!   to a confidence-weighted carry-forward within the metric's freshness
//!   bound.
//! - Weekly steps average daily totals and grade presence by day coverage.
//! - Month and year values are the median of the usable values of the next
//!   finer scale.
//!
//! Every function is pure: the result depends only on the events, the
//! configuration and the window bounds.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, NaiveDateTime};

use crate::bucket::TimelineBucket;
use crate::config::TimelineConfig;
use crate::event::HealthEvent;
use crate::metrics::{MetricKind, MetricPresence, MetricValue, MetricsSnapshot};
use crate::scale::{local_date, local_datetime, week_anchor};

/// Days in a week bucket, the denominator for step coverage.
pub const DAYS_PER_WEEK: u32 = 7;

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

/// Median of `values`; `None` when empty. Sorts the slice in place.
pub fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

/// Arithmetic mean; `None` when empty.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

// ---------------------------------------------------------------------------
// Weekly scalars
// ---------------------------------------------------------------------------

/// Aggregate one scalar metric for the week `[start, end)`.
///
/// `events` must be the validated event set; order does not matter.
pub fn aggregate_week_scalar(
    events: &[HealthEvent],
    start: NaiveDate,
    end: NaiveDate,
    metric: MetricKind,
    config: &TimelineConfig,
) -> MetricValue {
    let offset = config.offset();
    let mut in_window = Vec::new();
    let mut latest_before: Option<(NaiveDateTime, &str, f64)> = None;

    for event in events {
        let Some(value) = event.value_for(metric) else {
            continue;
        };
        let at = local_datetime(event.timestamp, offset);
        let day = at.date();
        if start <= day && day < end {
            in_window.push(value);
        } else if day < start {
            let newer = match latest_before {
                None => true,
                Some((best_at, best_id, _)) => (at, event.id.as_str()) > (best_at, best_id),
            };
            if newer {
                latest_before = Some((at, event.id.as_str(), value));
            }
        }
    }

    if let Some(value) = median(&mut in_window) {
        return MetricValue::present(value);
    }

    let (Some(bound), Some((at, _, value))) = (config.freshness.days_for(metric), latest_before)
    else {
        return MetricValue::missing();
    };
    let age = (start - at.date()).num_days();
    if age > bound {
        return MetricValue::missing();
    }
    MetricValue::estimated(value, carry_forward_confidence(age, bound))
}

/// Confidence of a value carried forward `age_days` into a window.
///
/// Decays linearly from just under 1 (one day old) towards 0 at the bound.
pub fn carry_forward_confidence(age_days: i64, bound_days: i64) -> f64 {
    1.0 - age_days as f64 / (bound_days as f64 + 1.0)
}

// ---------------------------------------------------------------------------
// Weekly steps
// ---------------------------------------------------------------------------

/// Mean of daily step totals inside the week `[start, end)`.
///
/// Present with at least `steps_full_coverage_days` covered days, estimated
/// (confidence = covered / 7) with fewer, missing with none.
pub fn aggregate_week_steps(
    events: &[HealthEvent],
    start: NaiveDate,
    end: NaiveDate,
    config: &TimelineConfig,
) -> MetricValue {
    let offset = config.offset();
    let mut daily: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for event in events {
        let Some(count) = event.value_for(MetricKind::Steps) else {
            continue;
        };
        let day = local_date(event.timestamp, offset);
        if start <= day && day < end {
            *daily.entry(day).or_insert(0.0) += count;
        }
    }

    let totals: Vec<f64> = daily.into_values().collect();
    let covered = totals.len() as u32;
    let Some(value) = mean(&totals) else {
        return MetricValue::missing();
    };
    if covered >= config.steps_full_coverage_days {
        MetricValue::present(value)
    } else {
        MetricValue::estimated(value, f64::from(covered) / f64::from(DAYS_PER_WEEK))
    }
}

// ---------------------------------------------------------------------------
// Photos
// ---------------------------------------------------------------------------

/// Photo presence and the canonical photo for a window.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PhotoSummary {
    pub has_photos: bool,
    pub canonical_photo_id: Option<String>,
}

/// Pick the photo nearest the window midpoint.
///
/// Ties are broken by the lexicographically smallest photo id so the choice
/// never depends on input order.
pub fn summarize_photos(
    events: &[HealthEvent],
    start: NaiveDate,
    end: NaiveDate,
    midpoint: NaiveDateTime,
    config: &TimelineConfig,
) -> PhotoSummary {
    let offset = config.offset();
    let best = events
        .iter()
        .filter_map(|event| {
            let photo_id = event.photo_id()?;
            let at = local_datetime(event.timestamp, offset);
            let day = at.date();
            (start <= day && day < end).then(|| {
                let distance = (at - midpoint).num_seconds().unsigned_abs();
                (distance, photo_id)
            })
        })
        .min();

    match best {
        Some((_, photo_id)) => PhotoSummary {
            has_photos: true,
            canonical_photo_id: Some(photo_id.to_string()),
        },
        None => PhotoSummary::default(),
    }
}

fn apply_photos(snapshot: &mut MetricsSnapshot, summary: PhotoSummary) {
    snapshot.has_photos_in_range = summary.has_photos;
    snapshot.canonical_photo_id = summary.canonical_photo_id;
}

// ---------------------------------------------------------------------------
// Bucket-level aggregation
// ---------------------------------------------------------------------------

/// Fill a week bucket's snapshot from raw events.
pub fn aggregate_week(bucket: &mut TimelineBucket, events: &[HealthEvent], config: &TimelineConfig) {
    let (start, end) = (bucket.start_date, bucket.end_date);
    for metric in MetricKind::ALL {
        let value = match metric {
            MetricKind::Steps => aggregate_week_steps(events, start, end, config),
            scalar => aggregate_week_scalar(events, start, end, scalar, config),
        };
        bucket.metrics.set(metric, value);
    }
    let photos = summarize_photos(events, start, end, bucket.midpoint(), config);
    apply_photos(&mut bucket.metrics, photos);
}

/// Combine finer-scale values into one parent value.
///
/// Median of usable children. Present if any contributing child is present,
/// otherwise estimated at the best contributing confidence; missing when no
/// child is usable.
pub fn aggregate_children(children: &[MetricValue], threshold: f64) -> MetricValue {
    let usable: Vec<&MetricValue> = children.iter().filter(|v| v.is_usable(threshold)).collect();
    let mut values: Vec<f64> = usable.iter().filter_map(|v| v.value).collect();
    let Some(value) = median(&mut values) else {
        return MetricValue::missing();
    };
    if usable.iter().any(|v| v.presence == MetricPresence::Present) {
        MetricValue::present(value)
    } else {
        let confidence = usable.iter().map(|v| v.confidence).fold(0.0, f64::max);
        MetricValue::estimated(value, confidence)
    }
}

/// Fill a month or year bucket from the finer buckets it contains.
///
/// `children` are the already-aggregated buckets of the next finer scale;
/// each is attributed to the parent containing its anchor day (a week's
/// fourth day, a month's first day). Photos are summarised directly from
/// `events`.
pub fn aggregate_parent(
    bucket: &mut TimelineBucket,
    children: &[TimelineBucket],
    events: &[HealthEvent],
    config: &TimelineConfig,
) {
    let members: Vec<&TimelineBucket> = children
        .iter()
        .filter(|child| bucket.contains(child_anchor(child)))
        .collect();

    for metric in MetricKind::ALL {
        let values: Vec<MetricValue> = members.iter().map(|c| c.metrics.get(metric)).collect();
        let value = aggregate_children(&values, config.high_confidence_threshold);
        bucket.metrics.set(metric, value);
    }

    let photos = summarize_photos(
        events,
        bucket.start_date,
        bucket.end_date,
        bucket.midpoint(),
        config,
    );
    apply_photos(&mut bucket.metrics, photos);
}

/// The day a finer bucket is attributed to when rolled up.
fn child_anchor(child: &TimelineBucket) -> NaiveDate {
    match child.scale {
        crate::scale::TimelineScale::Week => week_anchor(child.start_date),
        _ => child
            .start_date
            .with_day(1)
            .unwrap_or(child.start_date),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
