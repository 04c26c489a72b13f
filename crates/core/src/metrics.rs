//! Metric identifiers, presence classification and per-bucket snapshots.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::event::StreamType;

// ---------------------------------------------------------------------------
// MetricKind
// ---------------------------------------------------------------------------

/// A numeric metric tracked per bucket.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Weight,
    BodyFat,
    Ffmi,
    LeanMass,
    FatMass,
    Steps,
}

impl MetricKind {
    /// Every metric, in snapshot order.
    pub const ALL: [MetricKind; 6] = [
        MetricKind::Weight,
        MetricKind::BodyFat,
        MetricKind::Ffmi,
        MetricKind::LeanMass,
        MetricKind::FatMass,
        MetricKind::Steps,
    ];

    /// Stable metric name for logging and serialization.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Weight => "weight",
            Self::BodyFat => "body_fat",
            Self::Ffmi => "ffmi",
            Self::LeanMass => "lean_mass",
            Self::FatMass => "fat_mass",
            Self::Steps => "steps",
        }
    }

    /// The event stream that observes this metric.
    pub fn stream(self) -> StreamType {
        match self {
            Self::Weight => StreamType::Weight,
            Self::BodyFat => StreamType::BodyFat,
            Self::Ffmi | Self::LeanMass | Self::FatMass => StreamType::Dexa,
            Self::Steps => StreamType::Steps,
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// MetricPresence / MetricValue
// ---------------------------------------------------------------------------

/// Whether a bucket's value was observed, estimated or is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricPresence {
    /// Derived from at least one direct observation in the window.
    Present,
    /// Derived via carry-forward, partial coverage or interpolation.
    Estimated,
    Missing,
}

/// One metric's value within a bucket.
///
/// Constructed only through [`present`](Self::present),
/// [`estimated`](Self::estimated) and [`missing`](Self::missing) so that
/// `missing` never carries a value and the others always do.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricValue {
    pub value: Option<f64>,
    pub presence: MetricPresence,
    /// `1.0` for present values, `0.0` for missing ones.
    pub confidence: f64,
}

impl MetricValue {
    pub fn present(value: f64) -> Self {
        Self {
            value: Some(value),
            presence: MetricPresence::Present,
            confidence: 1.0,
        }
    }

    /// An estimate; confidence is clamped to `[0.0, 1.0]`.
    pub fn estimated(value: f64, confidence: f64) -> Self {
        Self {
            value: Some(value),
            presence: MetricPresence::Estimated,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    pub fn missing() -> Self {
        Self {
            value: None,
            presence: MetricPresence::Missing,
            confidence: 0.0,
        }
    }

    pub fn is_missing(&self) -> bool {
        self.presence == MetricPresence::Missing
    }

    /// Present, or an estimate at or above `threshold` confidence.
    pub fn is_usable(&self, threshold: f64) -> bool {
        match self.presence {
            MetricPresence::Present => true,
            MetricPresence::Estimated => self.confidence >= threshold,
            MetricPresence::Missing => false,
        }
    }
}

impl Default for MetricValue {
    fn default() -> Self {
        Self::missing()
    }
}

// ---------------------------------------------------------------------------
// BodyScoreCompleteness
// ---------------------------------------------------------------------------

/// How much usable data backed a bucket's body score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyScoreCompleteness {
    Full,
    Partial,
    None,
}

// ---------------------------------------------------------------------------
// MetricsSnapshot
// ---------------------------------------------------------------------------

/// Aggregated metrics for one bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Always holds an entry for every [`MetricKind`].
    pub metrics: BTreeMap<MetricKind, MetricValue>,
    pub canonical_photo_id: Option<String>,
    pub has_photos_in_range: bool,
    pub body_score: Option<f64>,
    pub body_score_completeness: BodyScoreCompleteness,
    /// Version tag of the score function that produced `body_score`.
    pub body_score_version: Option<String>,
    pub core_fields_used: Vec<MetricKind>,
}

impl MetricsSnapshot {
    /// A snapshot with every metric missing and no score.
    pub fn empty() -> Self {
        Self {
            metrics: MetricKind::ALL
                .iter()
                .map(|kind| (*kind, MetricValue::missing()))
                .collect(),
            canonical_photo_id: None,
            has_photos_in_range: false,
            body_score: None,
            body_score_completeness: BodyScoreCompleteness::None,
            body_score_version: None,
            core_fields_used: Vec::new(),
        }
    }

    pub fn get(&self, kind: MetricKind) -> MetricValue {
        self.metrics.get(&kind).copied().unwrap_or_default()
    }

    pub fn set(&mut self, kind: MetricKind, value: MetricValue) {
        self.metrics.insert(kind, value);
    }

    /// True if any metric was directly observed or any photo falls in range.
    pub fn has_observations(&self) -> bool {
        self.has_photos_in_range
            || self
                .metrics
                .values()
                .any(|v| v.presence == MetricPresence::Present)
    }

    /// True if any metric carries a value, observed or estimated.
    pub fn has_any_value(&self) -> bool {
        self.metrics.values().any(|v| !v.is_missing())
    }
}

impl Default for MetricsSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
