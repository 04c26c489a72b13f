//! The shared timeline service.
//!
//! - [`TimelineService`] - single-writer cache of the current
//!   [`TimelineView`](bodyline_core::view::TimelineView) plus the shared
//!   cursor, published through a `tokio::sync::watch` channel.
//! - [`Surface`] - per-surface projections of the shared selection.
//! - [`TimelineWorker`] - background task turning bus notices into
//!   recomputations.

pub mod service;
pub mod surface;
pub mod worker;

pub use service::{TimelineFrame, TimelineService, UpdateOutcome};
pub use surface::{Surface, SurfaceFrame, SurfaceSubscription};
pub use worker::TimelineWorker;
