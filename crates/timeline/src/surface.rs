//! Consuming surfaces and what each of them reads from the shared frame.
//!
//! Every surface observes the same cursor; none of them owns navigation
//! state. A [`SurfaceSubscription`] turns published frames into the
//! `(cursor, bucket)` pair its surface renders.

use std::fmt;
use std::str::FromStr;

use bodyline_core::bucket::TimelineBucket;
use bodyline_core::cursor::TimelineCursor;
use bodyline_core::error::CoreError;
use bodyline_core::metrics::MetricKind;
use serde::Serialize;
use tokio::sync::watch;

use crate::service::TimelineFrame;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Surface {
    HomeDashboard,
    PhotoGallery,
    MetricsTab,
}

impl Surface {
    pub const ALL: [Surface; 3] = [
        Surface::HomeDashboard,
        Surface::PhotoGallery,
        Surface::MetricsTab,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Surface::HomeDashboard => "home_dashboard",
            Surface::PhotoGallery => "photo_gallery",
            Surface::MetricsTab => "metrics_tab",
        }
    }

    /// Metrics this surface displays for the selected bucket.
    pub fn metrics(self) -> &'static [MetricKind] {
        match self {
            Surface::HomeDashboard => &[MetricKind::Weight, MetricKind::BodyFat, MetricKind::Steps],
            Surface::PhotoGallery => &[],
            Surface::MetricsTab => &MetricKind::ALL,
        }
    }
}

impl fmt::Display for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Surface {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Surface::ALL
            .into_iter()
            .find(|surface| surface.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("Unknown surface '{s}'")))
    }
}

/// One surface's view of the shared selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SurfaceFrame {
    pub surface: Surface,
    pub generation: u64,
    pub cursor: TimelineCursor,
    pub bucket: TimelineBucket,
}

impl SurfaceFrame {
    /// Project `frame` for `surface`; `None` while the cursor is unset.
    pub fn project(surface: Surface, frame: &TimelineFrame) -> Option<Self> {
        let (cursor, bucket) = frame.selection()?;
        Some(Self {
            surface,
            generation: frame.view.generation,
            cursor: cursor.clone(),
            bucket: bucket.clone(),
        })
    }

    /// Photo to show, if the selected bucket has any.
    pub fn photo_id(&self) -> Option<&str> {
        self.bucket.metrics.canonical_photo_id.as_deref()
    }
}

/// A surface's handle on the service's frame channel.
#[derive(Debug)]
pub struct SurfaceSubscription {
    surface: Surface,
    frames: watch::Receiver<TimelineFrame>,
}

impl SurfaceSubscription {
    pub fn new(surface: Surface, frames: watch::Receiver<TimelineFrame>) -> Self {
        Self { surface, frames }
    }

    pub fn surface(&self) -> Surface {
        self.surface
    }

    /// What the surface should render right now.
    pub fn current(&mut self) -> Option<SurfaceFrame> {
        let frame = self.frames.borrow_and_update();
        SurfaceFrame::project(self.surface, &frame)
    }

    /// Wait for the next published frame. Returns `None` once the service
    /// is gone.
    pub async fn next(&mut self) -> Option<Option<SurfaceFrame>> {
        self.frames.changed().await.ok()?;
        Some(self.current())
    }
}
