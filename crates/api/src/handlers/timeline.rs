//! Handlers for reading bucket collections.

use std::str::FromStr;

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use bodyline_core::bucket::TimelineBucket;
use bodyline_core::scale::{TimelineScale, TimelineZone};
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Upper bound on `limit` for week history pages.
const MAX_HISTORY_WEEKS: usize = 52;

/// One scale of the published view.
#[derive(Debug, Serialize)]
pub struct ScaleResponse {
    pub scale: TimelineScale,
    pub zone: TimelineZone,
    pub generation: u64,
    pub score_version: Option<String>,
    pub skipped_events: usize,
    pub buckets: Vec<TimelineBucket>,
}

/// GET /timeline/{scale}
///
/// Returns the ordered buckets of `week`, `month` or `year`. An unknown
/// scale is a validation error.
pub async fn get_scale(
    State(state): State<AppState>,
    Path(scale): Path<String>,
) -> AppResult<impl IntoResponse> {
    let scale = TimelineScale::from_str(&scale)?;
    let view = state.timeline.view();

    Ok(Json(DataResponse {
        data: ScaleResponse {
            scale,
            zone: scale.zone(),
            generation: view.generation,
            score_version: view.score_version.clone(),
            skipped_events: view.skipped_events,
            buckets: view.buckets(scale).to_vec(),
        },
    }))
}

#[derive(Debug, Deserialize)]
pub struct WeekHistoryQuery {
    /// Only weeks starting before this date; defaults to the oldest
    /// rendered week.
    pub before: Option<NaiveDate>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct WeekHistoryResponse {
    pub generation: u64,
    pub before: NaiveDate,
    pub buckets: Vec<TimelineBucket>,
}

/// GET /timeline/week/history
///
/// Pages back through weeks older than the rendered zone. Page with the
/// `start_date` of the first returned bucket as the next `before`.
pub async fn week_history(
    State(state): State<AppState>,
    Query(query): Query<WeekHistoryQuery>,
) -> AppResult<impl IntoResponse> {
    let limit = query.limit.unwrap_or(state.timeline.config().recent_weeks);
    if limit == 0 || limit > MAX_HISTORY_WEEKS {
        return Err(AppError::BadRequest(format!(
            "limit must be between 1 and {MAX_HISTORY_WEEKS}, got {limit}"
        )));
    }

    let view = state.timeline.view();
    let before = match query.before {
        Some(date) => date,
        None => match view.weeks.first() {
            Some(oldest) => oldest.start_date,
            None => state
                .timeline
                .today()
                .checked_add_days(Days::new(1))
                .ok_or_else(|| AppError::InternalError("date out of range".into()))?,
        },
    };
    let buckets = state.timeline.weeks_before(before, limit).await;

    Ok(Json(DataResponse {
        data: WeekHistoryResponse {
            generation: view.generation,
            before,
            buckets,
        },
    }))
}
