//! Bounded linear interpolation across month and year buckets.
//!
//! A run of consecutive missing buckets is filled only when it is bounded on
//! both sides by non-missing buckets and its length does not exceed the
//! configured cap. Runs longer than the cap stay missing in full; leading
//! and trailing runs are never filled.

use crate::bucket::TimelineBucket;
use crate::metrics::{MetricKind, MetricValue};
use crate::scale::TimelineScale;

/// Confidence of an interpolated entry `distance` steps from real data.
pub fn interpolation_confidence(distance: usize) -> f64 {
    1.0 / (1.0 + distance as f64)
}

/// Fill bounded gaps in one metric's ordered series.
///
/// Returns the input unchanged for the week scale.
pub fn interpolate_series(
    values: &[MetricValue],
    scale: TimelineScale,
    max_gap: usize,
) -> Vec<MetricValue> {
    let mut out = values.to_vec();
    if !scale.interpolates() || max_gap == 0 {
        return out;
    }

    let mut left: Option<usize> = None;
    let mut i = 0;
    while i < out.len() {
        if !out[i].is_missing() {
            left = Some(i);
            i += 1;
            continue;
        }

        let run_start = i;
        while i < out.len() && out[i].is_missing() {
            i += 1;
        }
        let run_len = i - run_start;

        let (Some(l), true) = (left, i < out.len()) else {
            continue;
        };
        if run_len > max_gap {
            continue;
        }
        let (Some(lv), Some(rv)) = (out[l].value, out[i].value) else {
            continue;
        };

        let span = (i - l) as f64;
        for (k, slot) in out.iter_mut().enumerate().take(i).skip(run_start) {
            let t = (k - l) as f64 / span;
            let distance = (k - l).min(i - k);
            *slot = MetricValue::estimated(lv + (rv - lv) * t, interpolation_confidence(distance));
        }
    }
    out
}

/// Interpolate every metric across an ordered, contiguous bucket sequence.
///
/// Returns the number of metric values that were filled.
pub fn interpolate_buckets(buckets: &mut [TimelineBucket], max_gap: usize) -> usize {
    let Some(scale) = buckets.first().map(|b| b.scale) else {
        return 0;
    };
    let mut filled = 0;
    for metric in MetricKind::ALL {
        let series: Vec<MetricValue> = buckets.iter().map(|b| b.metrics.get(metric)).collect();
        let result = interpolate_series(&series, scale, max_gap);
        for (bucket, (before, after)) in buckets.iter_mut().zip(series.iter().zip(result)) {
            if before.is_missing() && !after.is_missing() {
                filled += 1;
                bucket.metrics.set(metric, after);
            }
        }
    }
    filled
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
