//! Adapter around the externally supplied body-score function.
//!
//! The scoring formula is opaque. The engine only knows the function's
//! version tag and the set of "core" metrics its contract declares, and
//! derives a completeness classification from which of those metrics are
//! usable in a bucket. Failures inside the function (errors, panics,
//! non-finite results) are contained per bucket.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::metrics::{BodyScoreCompleteness, MetricKind, MetricsSnapshot};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Result of one score function invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreOutput {
    pub score: f64,
    /// Core metrics the function actually consumed.
    pub core_fields_used: Vec<MetricKind>,
}

#[derive(Debug, thiserror::Error)]
pub enum ScoreError {
    #[error("Score function failed: {0}")]
    Failed(String),

    #[error("Score function panicked")]
    Panicked,

    #[error("Score function returned a non-finite score: {0}")]
    NonFinite(f64),
}

type ComputeFn = dyn Fn(&MetricsSnapshot, &str) -> Result<ScoreOutput, ScoreError> + Send + Sync;

/// A versioned reference to the external scoring function.
#[derive(Clone)]
pub struct ScoreFunction {
    version: String,
    core_metrics: Vec<MetricKind>,
    compute: Arc<ComputeFn>,
}

impl ScoreFunction {
    /// Wrap `compute` with its version tag and declared core metrics.
    pub fn new<F>(version: impl Into<String>, core_metrics: Vec<MetricKind>, compute: F) -> Self
    where
        F: Fn(&MetricsSnapshot, &str) -> Result<ScoreOutput, ScoreError> + Send + Sync + 'static,
    {
        let mut core_metrics = core_metrics;
        core_metrics.sort();
        core_metrics.dedup();
        Self {
            version: version.into(),
            core_metrics,
            compute: Arc::new(compute),
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn core_metrics(&self) -> &[MetricKind] {
        &self.core_metrics
    }

    /// Invoke the function, converting panics and non-finite scores into
    /// [`ScoreError`]s.
    pub fn call(&self, snapshot: &MetricsSnapshot) -> Result<ScoreOutput, ScoreError> {
        let output = catch_unwind(AssertUnwindSafe(|| (self.compute)(snapshot, &self.version)))
            .unwrap_or(Err(ScoreError::Panicked))?;
        if !output.score.is_finite() {
            return Err(ScoreError::NonFinite(output.score));
        }
        Ok(output)
    }
}

impl fmt::Debug for ScoreFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScoreFunction")
            .field("version", &self.version)
            .field("core_metrics", &self.core_metrics)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Completeness
// ---------------------------------------------------------------------------

/// Classify how many declared core metrics are usable in `snapshot`.
///
/// - `Full`    -- every core metric is usable
/// - `Partial` -- at least one, but not all
/// - `None`    -- no core metric is usable (or none are declared)
pub fn classify_completeness(
    snapshot: &MetricsSnapshot,
    core_metrics: &[MetricKind],
    threshold: f64,
) -> BodyScoreCompleteness {
    let usable = core_metrics
        .iter()
        .filter(|m| snapshot.get(**m).is_usable(threshold))
        .count();
    if usable == 0 {
        BodyScoreCompleteness::None
    } else if usable == core_metrics.len() {
        BodyScoreCompleteness::Full
    } else {
        BodyScoreCompleteness::Partial
    }
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

/// Score one bucket's snapshot in place.
///
/// Without a score function, or without any usable core metric, the bucket
/// gets completeness `None` and no score; the function is not invoked in
/// the latter case. Any failure of the function is logged and likewise
/// yields `None`. The version tag is recorded whenever a function is
/// configured.
pub fn apply_score(
    snapshot: &mut MetricsSnapshot,
    score_fn: Option<&ScoreFunction>,
    threshold: f64,
    bucket_id: &str,
) {
    snapshot.body_score = None;
    snapshot.body_score_completeness = BodyScoreCompleteness::None;
    snapshot.core_fields_used.clear();
    snapshot.body_score_version = None;

    let Some(score_fn) = score_fn else {
        return;
    };
    snapshot.body_score_version = Some(score_fn.version().to_string());

    let completeness = classify_completeness(snapshot, score_fn.core_metrics(), threshold);
    if completeness == BodyScoreCompleteness::None {
        return;
    }

    match score_fn.call(snapshot) {
        Ok(output) => {
            let mut used = output.core_fields_used;
            used.sort();
            used.dedup();
            snapshot.body_score = Some(output.score);
            snapshot.body_score_completeness = completeness;
            snapshot.core_fields_used = used;
        }
        Err(e) => {
            tracing::warn!(
                bucket_id,
                score_version = score_fn.version(),
                error = %e,
                "Body score function failed, bucket left unscored"
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
