//! Handlers for reading and moving the shared timeline cursor.
//!
//! All surfaces share one cursor; these endpoints are how a remote surface
//! navigates it.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use bodyline_core::bucket::TimelineBucket;
use bodyline_core::cursor::{CursorState, TimelineCursor};
use bodyline_core::scale::TimelineScale;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct SelectBucketRequest {
    pub scale: TimelineScale,
    pub bucket_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SetScaleRequest {
    pub scale: TimelineScale,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum DragRequest {
    Begin,
    /// `fraction` runs from 0.0 (oldest edge) to 1.0 (newest edge).
    Move { fraction: f64 },
    Release,
    Cancel,
}

/// The committed cursor with the bucket it points at.
#[derive(Debug, Serialize)]
pub struct CursorResponse {
    pub generation: u64,
    pub cursor: CursorState,
    pub bucket: Option<TimelineBucket>,
}

#[derive(Debug, Serialize)]
pub struct DragResponse {
    /// Uncommitted snap target while moving.
    pub preview: Option<TimelineCursor>,
    #[serde(flatten)]
    pub committed: CursorResponse,
}

fn current(state: &AppState) -> CursorResponse {
    let frame = state.timeline.frame();
    let bucket = frame.selection().map(|(_, bucket)| bucket.clone());
    CursorResponse {
        generation: frame.view.generation,
        cursor: frame.cursor,
        bucket,
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /cursor
pub async fn get_cursor(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    Ok(Json(DataResponse {
        data: current(&state),
    }))
}

/// POST /cursor/select
///
/// 404 when the bucket does not exist at that scale.
pub async fn select_bucket(
    State(state): State<AppState>,
    Json(input): Json<SelectBucketRequest>,
) -> AppResult<impl IntoResponse> {
    state
        .timeline
        .select_bucket(input.scale, &input.bucket_id)
        .await?;
    Ok(Json(DataResponse {
        data: current(&state),
    }))
}

/// POST /cursor/scale
pub async fn set_scale(
    State(state): State<AppState>,
    Json(input): Json<SetScaleRequest>,
) -> AppResult<impl IntoResponse> {
    state.timeline.set_scale(input.scale).await?;
    Ok(Json(DataResponse {
        data: current(&state),
    }))
}

/// POST /cursor/today
pub async fn select_today(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    state.timeline.select_today().await?;
    Ok(Json(DataResponse {
        data: current(&state),
    }))
}

/// POST /cursor/drag
///
/// `move` only previews; the cursor changes on `release`.
pub async fn drag(
    State(state): State<AppState>,
    Json(input): Json<DragRequest>,
) -> AppResult<impl IntoResponse> {
    let preview = match input {
        DragRequest::Begin => {
            state.timeline.begin_drag().await;
            None
        }
        DragRequest::Move { fraction } => {
            if !(0.0..=1.0).contains(&fraction) {
                return Err(AppError::BadRequest(format!(
                    "fraction must be between 0 and 1, got {fraction}"
                )));
            }
            Some(state.timeline.drag_to(fraction).await?)
        }
        DragRequest::Release => {
            state.timeline.release_drag().await;
            None
        }
        DragRequest::Cancel => {
            state.timeline.cancel_drag().await;
            None
        }
    };

    Ok(Json(DataResponse {
        data: DragResponse {
            preview,
            committed: current(&state),
        },
    }))
}
