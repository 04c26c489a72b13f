//! The single shared "where am I" pointer across timeline surfaces.
//!
//! The controller only ever reads an already-published [`TimelineView`];
//! it never triggers recomputation. Every committed position refers to a
//! bucket that exists in the view it was resolved against.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::bucket::TimelineBucket;
use crate::error::CoreError;
use crate::scale::TimelineScale;
use crate::view::TimelineView;

/// A committed timeline position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineCursor {
    pub date: NaiveDate,
    pub scale: TimelineScale,
    pub bucket_id: String,
}

impl TimelineCursor {
    /// Position on `bucket`, dated at its first day.
    pub fn on(bucket: &TimelineBucket) -> Self {
        Self::on_date(bucket, bucket.start_date)
    }

    fn on_date(bucket: &TimelineBucket, date: NaiveDate) -> Self {
        Self {
            date,
            scale: bucket.scale,
            bucket_id: bucket.id.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CursorState {
    /// No data has been loaded yet.
    #[default]
    Unset,
    Positioned(TimelineCursor),
}

impl CursorState {
    pub fn cursor(&self) -> Option<&TimelineCursor> {
        match self {
            CursorState::Unset => None,
            CursorState::Positioned(cursor) => Some(cursor),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
enum DragState {
    #[default]
    Idle,
    /// Dragging; holds the bucket the pointer currently snaps to.
    Active { preview: Option<TimelineCursor> },
}

// ---------------------------------------------------------------------------
// CursorController
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct CursorController {
    state: CursorState,
    drag: DragState,
}

impl CursorController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &CursorState {
        &self.state
    }

    pub fn cursor(&self) -> Option<&TimelineCursor> {
        self.state.cursor()
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.drag, DragState::Active { .. })
    }

    /// The uncommitted drag position, if a drag is in progress.
    pub fn drag_preview(&self) -> Option<&TimelineCursor> {
        match &self.drag {
            DragState::Active { preview } => preview.as_ref(),
            DragState::Idle => None,
        }
    }

    /// Re-anchor the cursor after a new view has been published.
    pub fn resolve(&mut self, view: &TimelineView) -> &CursorState {
        // A preview may point at a bucket the new view no longer has.
        if let DragState::Active { preview } = &mut self.drag {
            *preview = None;
        }

        let next = match &self.state {
            CursorState::Positioned(cursor) => {
                if view.find(cursor.scale, &cursor.bucket_id).is_some() {
                    Some(cursor.clone())
                } else {
                    view.nearest(cursor.scale, cursor.date)
                        .map(TimelineCursor::on)
                        .or_else(|| view.newest_week().map(TimelineCursor::on))
                }
            }
            CursorState::Unset => view.newest_week().map(TimelineCursor::on),
        };

        if let Some(cursor) = self.state.cursor() {
            if next.as_ref() != Some(cursor) {
                tracing::debug!(
                    from = %cursor.bucket_id,
                    to = next.as_ref().map(|c| c.bucket_id.as_str()),
                    "Cursor re-resolved against new view"
                );
            }
        }
        self.state = next.map_or(CursorState::Unset, CursorState::Positioned);
        &self.state
    }

    /// Jump directly to the bucket `id` at `scale`.
    pub fn select_bucket(
        &mut self,
        view: &TimelineView,
        scale: TimelineScale,
        id: &str,
    ) -> Result<TimelineCursor, CoreError> {
        let bucket = view.find(scale, id).ok_or_else(|| CoreError::NotFound {
            entity: "TimelineBucket",
            id: format!("{scale}/{id}"),
        })?;
        Ok(self.commit(TimelineCursor::on(bucket)))
    }

    /// Move to `scale`, snapping to the bucket containing (or nearest to)
    /// the current cursor date. Without a cursor, snaps relative to the
    /// newest week.
    pub fn set_scale(
        &mut self,
        view: &TimelineView,
        scale: TimelineScale,
    ) -> Result<TimelineCursor, CoreError> {
        let date = self
            .cursor()
            .map(|c| c.date)
            .or_else(|| view.newest_week().map(|w| w.start_date))
            .ok_or_else(|| no_buckets(scale))?;
        let bucket = view.nearest(scale, date).ok_or_else(|| no_buckets(scale))?;
        // Keep the date when it still falls inside the snapped bucket so a
        // round trip week -> year -> week returns to the same week.
        let cursor = if bucket.contains(date) {
            TimelineCursor::on_date(bucket, date)
        } else {
            TimelineCursor::on(bucket)
        };
        Ok(self.commit(cursor))
    }

    /// Reset to the most recent week.
    pub fn select_today(&mut self, view: &TimelineView) -> Result<TimelineCursor, CoreError> {
        let bucket = view
            .newest_week()
            .ok_or_else(|| no_buckets(TimelineScale::Week))?;
        Ok(self.commit(TimelineCursor::on(bucket)))
    }

    // -- drag -------------------------------------------------------------

    pub fn begin_drag(&mut self) {
        self.drag = DragState::Active { preview: None };
    }

    /// Update the drag preview for a pointer at `fraction` (0.0 = oldest
    /// edge, 1.0 = newest edge) of the current scale. Nothing is committed.
    pub fn drag_to(
        &mut self,
        view: &TimelineView,
        fraction: f64,
    ) -> Result<TimelineCursor, CoreError> {
        if !self.is_dragging() {
            return Err(CoreError::Validation("No drag in progress".into()));
        }
        if !fraction.is_finite() {
            return Err(CoreError::Validation(format!(
                "Drag position must be finite, got {fraction}"
            )));
        }
        let scale = self.cursor().map_or(TimelineScale::Week, |c| c.scale);
        let target = snap_to_fraction(view.buckets(scale), fraction.clamp(0.0, 1.0))
            .ok_or_else(|| no_buckets(scale))?;

        let preview = TimelineCursor::on(target);
        self.drag = DragState::Active {
            preview: Some(preview.clone()),
        };
        Ok(preview)
    }

    /// End the drag, committing the snapped bucket if the pointer moved.
    ///
    /// Returns the committed cursor, or `None` when there was nothing to
    /// commit.
    pub fn release_drag(&mut self, view: &TimelineView) -> Option<TimelineCursor> {
        let preview = match std::mem::take(&mut self.drag) {
            DragState::Active { preview } => preview,
            DragState::Idle => None,
        }?;
        // The view may have been republished mid-drag.
        let bucket = view.find(preview.scale, &preview.bucket_id)?;
        Some(self.commit(TimelineCursor::on(bucket)))
    }

    pub fn cancel_drag(&mut self) {
        self.drag = DragState::Idle;
    }

    fn commit(&mut self, cursor: TimelineCursor) -> TimelineCursor {
        self.state = CursorState::Positioned(cursor.clone());
        cursor
    }
}

fn no_buckets(scale: TimelineScale) -> CoreError {
    CoreError::NotFound {
        entity: "TimelineBucket",
        id: format!("{scale}/*"),
    }
}

/// The bucket nearest to the date at `fraction` of the span covered by
/// `buckets`.
fn snap_to_fraction(buckets: &[TimelineBucket], fraction: f64) -> Option<&TimelineBucket> {
    let first = buckets.first()?;
    let last = buckets.last()?;
    let span_days = (last.end_date - first.start_date).num_days().max(1) - 1;
    let offset = (span_days as f64 * fraction).round() as u64;
    let date = first.start_date.checked_add_days(Days::new(offset))?;
    buckets
        .iter()
        .min_by_key(|b| (b.distance_days(date), b.start_date))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::config::TimelineConfig;
    use crate::event::{EventPayload, HealthEvent};
    use crate::view::build_timeline_view;

    fn weight(id: &str, y: i32, m: u32, d: u32) -> HealthEvent {
        HealthEvent::new(
            id,
            Utc.with_ymd_and_hms(y, m, d, 9, 0, 0).unwrap(),
            EventPayload::Weight { kg: 80.0 },
        )
    }

    fn view_of(events: &[HealthEvent], generation: u64) -> TimelineView {
        build_timeline_view(
            events,
            &TimelineConfig::default(),
            None,
            NaiveDate::from_ymd_opt(2025, 10, 17).unwrap(),
            generation,
        )
    }

    fn sample_view() -> TimelineView {
        view_of(
            &[
                weight("y22", 2022, 3, 1),
                weight("m1", 2025, 6, 10),
                weight("a", 2025, 9, 22),
                weight("b", 2025, 9, 29),
                weight("c", 2025, 10, 6),
                weight("d", 2025, 10, 15),
            ],
            1,
        )
    }

    #[test]
    fn unset_resolves_to_newest_week() {
        let mut cursor = CursorController::new();
        cursor.resolve(&sample_view());
        assert_eq!(cursor.cursor().unwrap().bucket_id, "2025-W42");
    }

    #[test]
    fn empty_view_keeps_cursor_unset() {
        let mut cursor = CursorController::new();
        assert_eq!(cursor.resolve(&TimelineView::empty(0)), &CursorState::Unset);
    }

    #[test]
    fn existing_bucket_survives_recomputation() {
        let view = sample_view();
        let mut cursor = CursorController::new();
        cursor.select_bucket(&view, TimelineScale::Week, "2025-W40").unwrap();
        cursor.resolve(&view);
        assert_eq!(cursor.cursor().unwrap().bucket_id, "2025-W40");
    }

    #[test]
    fn vanished_bucket_snaps_to_nearest() {
        let mut cursor = CursorController::new();
        cursor
            .select_bucket(&sample_view(), TimelineScale::Week, "2025-W39")
            .unwrap();

        let smaller = view_of(&[weight("c", 2025, 10, 6), weight("d", 2025, 10, 15)], 2);
        cursor.resolve(&smaller);
        assert_eq!(cursor.cursor().unwrap().bucket_id, "2025-W41");
    }

    #[test]
    fn select_unknown_bucket_is_not_found() {
        let mut cursor = CursorController::new();
        let result = cursor.select_bucket(&sample_view(), TimelineScale::Month, "1999-01");
        assert_matches!(result, Err(CoreError::NotFound { .. }));
        assert_eq!(cursor.state(), &CursorState::Unset);
    }

    #[test]
    fn scale_change_snaps_to_containing_bucket() {
        let view = sample_view();
        let mut cursor = CursorController::new();
        cursor.select_bucket(&view, TimelineScale::Week, "2025-W42").unwrap();
        let year = cursor.set_scale(&view, TimelineScale::Year).unwrap();
        assert_eq!(year.bucket_id, "2025");
        let back = cursor.set_scale(&view, TimelineScale::Week).unwrap();
        assert_eq!(back.bucket_id, "2025-W42");
    }

    #[test]
    fn scale_change_to_month_picks_nearest_window_month() {
        let view = sample_view();
        let mut cursor = CursorController::new();
        cursor.select_bucket(&view, TimelineScale::Week, "2025-W42").unwrap();
        let month = cursor.set_scale(&view, TimelineScale::Month).unwrap();
        assert_eq!(month.bucket_id, "2025-08");
    }

    #[test]
    fn drag_commits_only_on_release() {
        let view = sample_view();
        let mut cursor = CursorController::new();
        cursor.resolve(&view);
        cursor.begin_drag();

        let preview = cursor.drag_to(&view, 0.0).unwrap().bucket_id;
        assert_eq!(preview, "2025-W39");
        assert_eq!(
            cursor.drag_preview().map(|c| c.bucket_id.as_str()),
            Some("2025-W39")
        );
        assert_eq!(cursor.cursor().unwrap().bucket_id, "2025-W42");

        let committed = cursor.release_drag(&view).unwrap();
        assert_eq!(committed.bucket_id, "2025-W39");
        assert!(!cursor.is_dragging());
    }

    #[test]
    fn cancelled_drag_leaves_cursor_untouched() {
        let view = sample_view();
        let mut cursor = CursorController::new();
        cursor.resolve(&view);
        cursor.begin_drag();
        cursor.drag_to(&view, 0.3).unwrap();
        cursor.cancel_drag();
        assert!(cursor.release_drag(&view).is_none());
        assert_eq!(cursor.cursor().unwrap().bucket_id, "2025-W42");
    }

    #[test]
    fn drag_without_begin_is_rejected() {
        let mut cursor = CursorController::new();
        assert_matches!(
            cursor.drag_to(&sample_view(), 0.5),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn drag_fraction_is_clamped() {
        let view = sample_view();
        let mut cursor = CursorController::new();
        cursor.resolve(&view);
        cursor.begin_drag();
        assert_eq!(cursor.drag_to(&view, 7.0).unwrap().bucket_id, "2025-W42");
        assert_matches!(cursor.drag_to(&view, f64::NAN), Err(CoreError::Validation(_)));
    }

    #[test]
    fn select_today_returns_to_newest_week() {
        let view = sample_view();
        let mut cursor = CursorController::new();
        cursor.select_bucket(&view, TimelineScale::Year, "2022").unwrap();
        assert_eq!(cursor.select_today(&view).unwrap().bucket_id, "2025-W42");
        assert_matches!(
            CursorController::new().select_today(&TimelineView::empty(0)),
            Err(CoreError::NotFound { .. })
        );
    }
}
