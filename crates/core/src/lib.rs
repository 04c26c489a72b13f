//! Bodyline timeline domain logic.
//!
//! Pure, synchronous building blocks of the global timeline: nothing in
//! this crate performs I/O or owns shared state.
//!
//! - [`event`] - immutable health events and their validation.
//! - [`bucket`] - week, month and year windows.
//! - [`aggregation`] - per-bucket metric values from raw events.
//! - [`interpolation`] - bounded gap filling for months and years.
//! - [`score`] - adapter around the versioned body-score function.
//! - [`view`] - one published generation and the pipeline producing it.
//! - [`cursor`] - the shared timeline position.

pub mod aggregation;
pub mod bucket;
pub mod clock;
pub mod config;
pub mod cursor;
pub mod error;
pub mod event;
pub mod interpolation;
pub mod metrics;
pub mod scale;
pub mod score;
pub mod types;
pub mod validation;
pub mod view;

pub use bucket::TimelineBucket;
pub use config::TimelineConfig;
pub use cursor::{CursorController, CursorState, TimelineCursor};
pub use error::CoreError;
pub use event::{EventPayload, HealthEvent};
pub use metrics::{BodyScoreCompleteness, MetricKind, MetricPresence, MetricValue, MetricsSnapshot};
pub use scale::TimelineScale;
pub use score::{ScoreError, ScoreFunction, ScoreOutput};
pub use view::{build_timeline_view, build_weeks_before, TimelineView};
