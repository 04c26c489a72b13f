//! Single-writer timeline cache shared by every surface of a session.
//!
//! [`TimelineService`] owns the latest event set, the published
//! [`TimelineView`] and the [`CursorController`]. Recomputation runs on one
//! caller at a time; overlapping [`update_metrics`](TimelineService::update_metrics)
//! calls hand their event set to the caller already recomputing and return
//! [`UpdateOutcome::Coalesced`]. Readers and cursor operations only touch
//! the last published frame, so they never wait for a recomputation.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use bodyline_core::bucket::TimelineBucket;
use bodyline_core::clock::Clock;
use bodyline_core::config::TimelineConfig;
use bodyline_core::cursor::{CursorController, CursorState, TimelineCursor};
use bodyline_core::error::CoreError;
use bodyline_core::event::HealthEvent;
use bodyline_core::scale::TimelineScale;
use bodyline_core::score::ScoreFunction;
use bodyline_core::types::UserId;
use bodyline_core::view::{build_timeline_view, build_weeks_before, TimelineView};
use bodyline_events::source::{EventSource, SourceError};
use chrono::NaiveDate;
use serde::Serialize;
use tokio::sync::{watch, Mutex, RwLock};

// ---------------------------------------------------------------------------
// Published state
// ---------------------------------------------------------------------------

/// What subscribers observe: one view generation and the cursor resolved
/// against it.
#[derive(Debug, Clone)]
pub struct TimelineFrame {
    pub view: Arc<TimelineView>,
    pub cursor: CursorState,
}

impl TimelineFrame {
    /// The cursor together with the bucket it points at.
    pub fn selection(&self) -> Option<(&TimelineCursor, &TimelineBucket)> {
        let cursor = self.cursor.cursor()?;
        let bucket = self.view.find(cursor.scale, &cursor.bucket_id)?;
        Some((cursor, bucket))
    }
}

/// Result of an [`update_metrics`](TimelineService::update_metrics) call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UpdateOutcome {
    /// This caller recomputed; `generation` is the last one it published.
    Published { generation: u64 },
    /// A recomputation was already running and absorbed this event set.
    Coalesced,
}

// ---------------------------------------------------------------------------
// TimelineService
// ---------------------------------------------------------------------------

pub struct TimelineService {
    config: TimelineConfig,
    clock: Arc<dyn Clock>,
    score_fn: RwLock<Option<ScoreFunction>>,
    /// Event set of the most recent recomputation.
    latest_events: RwLock<Arc<Vec<HealthEvent>>>,
    /// Newest event set not yet picked up by the writer.
    pending: Mutex<Option<Arc<Vec<HealthEvent>>>>,
    in_flight: AtomicBool,
    generation: AtomicU64,
    cursor: Mutex<CursorController>,
    frames: watch::Sender<TimelineFrame>,
}

impl TimelineService {
    /// Create a service with an empty view (generation 0) and an unset
    /// cursor.
    pub fn new(
        config: TimelineConfig,
        score_fn: Option<ScoreFunction>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (frames, _) = watch::channel(TimelineFrame {
            view: Arc::new(TimelineView::empty(0)),
            cursor: CursorState::Unset,
        });
        Self {
            config,
            clock,
            score_fn: RwLock::new(score_fn),
            latest_events: RwLock::new(Arc::new(Vec::new())),
            pending: Mutex::new(None),
            in_flight: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            cursor: Mutex::new(CursorController::new()),
            frames,
        }
    }

    pub fn config(&self) -> &TimelineConfig {
        &self.config
    }

    /// Today's local date per the service clock.
    pub fn today(&self) -> NaiveDate {
        self.clock.today(self.config.offset())
    }

    // -- reads --------------------------------------------------------------

    /// The last published frame.
    pub fn frame(&self) -> TimelineFrame {
        self.frames.borrow().clone()
    }

    /// The last published view.
    pub fn view(&self) -> Arc<TimelineView> {
        Arc::clone(&self.frames.borrow().view)
    }

    /// Ordered buckets of `scale` from the last published view.
    pub fn buckets(&self, scale: TimelineScale) -> Vec<TimelineBucket> {
        self.view().buckets(scale).to_vec()
    }

    /// The bucket `cursor` refers to, if it exists in the published view.
    pub fn bucket(&self, cursor: &TimelineCursor) -> Option<TimelineBucket> {
        self.view().find(cursor.scale, &cursor.bucket_id).cloned()
    }

    /// The committed cursor and its bucket.
    pub fn current_selection(&self) -> Option<(TimelineCursor, TimelineBucket)> {
        let frame = self.frame();
        frame
            .selection()
            .map(|(cursor, bucket)| (cursor.clone(), bucket.clone()))
    }

    /// Observe every published frame.
    pub fn subscribe(&self) -> watch::Receiver<TimelineFrame> {
        self.frames.subscribe()
    }

    /// Up to `limit` data-bearing weeks older than `before`, oldest first,
    /// computed from the event set of the last recomputation.
    pub async fn weeks_before(&self, before: NaiveDate, limit: usize) -> Vec<TimelineBucket> {
        let events = Arc::clone(&*self.latest_events.read().await);
        let score_fn = self.score_fn.read().await.clone();
        build_weeks_before(
            &events,
            &self.config,
            score_fn.as_ref(),
            self.today(),
            before,
            limit,
        )
    }

    // -- writes -------------------------------------------------------------

    /// Replace the event set and recompute every scale.
    pub async fn update_metrics(&self, events: Vec<HealthEvent>) -> UpdateOutcome {
        self.submit(Arc::new(events)).await
    }

    /// Pull the full event set for `user_id` from `source` and recompute.
    ///
    /// Source errors are returned unchanged and leave the published view
    /// untouched.
    pub async fn refresh<S>(&self, source: &S, user_id: UserId) -> Result<UpdateOutcome, SourceError>
    where
        S: EventSource,
    {
        let events = source.fetch_events(user_id).await?;
        tracing::debug!(%user_id, events = events.len(), "Fetched health events");
        Ok(self.update_metrics(events).await)
    }

    /// Swap the body-score function and recompute with the current events.
    pub async fn set_score_function(&self, score_fn: Option<ScoreFunction>) -> UpdateOutcome {
        tracing::info!(
            score_version = score_fn.as_ref().map(|f| f.version()),
            "Body score function replaced"
        );
        *self.score_fn.write().await = score_fn;
        let events = Arc::clone(&*self.latest_events.read().await);
        self.submit(events).await
    }

    async fn submit(&self, events: Arc<Vec<HealthEvent>>) -> UpdateOutcome {
        *self.pending.lock().await = Some(events);
        if self.in_flight.swap(true, Ordering::AcqRel) {
            tracing::debug!("Recomputation in flight, update coalesced");
            return UpdateOutcome::Coalesced;
        }

        loop {
            let next = self.pending.lock().await.take();
            if let Some(events) = next {
                self.recompute(events).await;
                continue;
            }

            self.in_flight.store(false, Ordering::Release);
            // A caller may have queued work after our last take but before
            // the flag was cleared; it returned Coalesced, so pick it up.
            if self.pending.lock().await.is_none() || self.in_flight.swap(true, Ordering::AcqRel)
            {
                break;
            }
        }

        UpdateOutcome::Published {
            generation: self.generation.load(Ordering::Acquire),
        }
    }

    async fn recompute(&self, events: Arc<Vec<HealthEvent>>) {
        let score_fn = self.score_fn.read().await.clone();
        let today = self.today();
        let generation = self.generation.load(Ordering::Acquire) + 1;

        let view = Arc::new(build_timeline_view(
            &events,
            &self.config,
            score_fn.as_ref(),
            today,
            generation,
        ));
        *self.latest_events.write().await = events;

        let mut cursor = self.cursor.lock().await;
        cursor.resolve(&view);
        self.generation.store(generation, Ordering::Release);
        tracing::info!(
            generation,
            events = view.event_count,
            skipped = view.skipped_events,
            weeks = view.weeks.len(),
            months = view.months.len(),
            years = view.years.len(),
            "Timeline recomputed"
        );
        self.frames.send_replace(TimelineFrame {
            view,
            cursor: cursor.state().clone(),
        });
    }

    // -- cursor -------------------------------------------------------------

    pub async fn select_bucket(
        &self,
        scale: TimelineScale,
        id: &str,
    ) -> Result<TimelineCursor, CoreError> {
        self.with_cursor(|cursor, view| cursor.select_bucket(view, scale, id))
            .await
    }

    pub async fn set_scale(&self, scale: TimelineScale) -> Result<TimelineCursor, CoreError> {
        self.with_cursor(|cursor, view| cursor.set_scale(view, scale))
            .await
    }

    pub async fn select_today(&self) -> Result<TimelineCursor, CoreError> {
        self.with_cursor(|cursor, view| cursor.select_today(view))
            .await
    }

    pub async fn begin_drag(&self) {
        self.cursor.lock().await.begin_drag();
    }

    /// Preview the bucket under a drag position; nothing is published.
    pub async fn drag_to(&self, fraction: f64) -> Result<TimelineCursor, CoreError> {
        let view = self.view();
        self.cursor.lock().await.drag_to(&view, fraction)
    }

    /// Commit the previewed bucket and publish it.
    pub async fn release_drag(&self) -> Option<TimelineCursor> {
        self.with_cursor(|cursor, view| cursor.release_drag(view))
            .await
    }

    pub async fn cancel_drag(&self) {
        self.cursor.lock().await.cancel_drag();
    }

    /// Run a cursor operation against the published view and publish the
    /// result if the cursor moved.
    async fn with_cursor<T>(
        &self,
        op: impl FnOnce(&mut CursorController, &TimelineView) -> T,
    ) -> T {
        let mut cursor = self.cursor.lock().await;
        // Recomputation publishes while holding the cursor lock, so this is
        // the newest view.
        let view = self.view();
        let out = op(&mut cursor, &view);
        let state = cursor.state().clone();
        self.frames.send_if_modified(|frame| {
            if frame.cursor == state {
                return false;
            }
            frame.cursor = state;
            true
        });
        out
    }
}

impl std::fmt::Debug for TimelineService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimelineService")
            .field("config", &self.config)
            .field("generation", &self.generation.load(Ordering::Relaxed))
            .field("in_flight", &self.in_flight.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
