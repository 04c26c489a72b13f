//! Handler for pulling fresh events into the timeline.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use bodyline_core::event::HealthEvent;
use bodyline_timeline::UpdateOutcome;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::source::ServerEventSource;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct AppendResponse {
    pub accepted: usize,
    pub stored: usize,
}

#[derive(Debug, Serialize)]
pub struct ReloadResponse {
    #[serde(flatten)]
    pub outcome: UpdateOutcome,
    pub event_count: usize,
    pub skipped_events: usize,
}

/// POST /events/reload
///
/// Refetches the full event set and recomputes. Source failures leave the
/// published view untouched and map to 503/502.
pub async fn reload(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let outcome = state
        .timeline
        .refresh(state.source.as_ref(), state.user_id)
        .await?;
    let view = state.timeline.view();

    tracing::info!(
        user_id = %state.user_id,
        ?outcome,
        events = view.event_count,
        "Events reloaded via API"
    );

    Ok(Json(DataResponse {
        data: ReloadResponse {
            outcome,
            event_count: view.event_count,
            skipped_events: view.skipped_events,
        },
    }))
}

/// POST /events
///
/// Appends events to the in-memory store. The store announces the change
/// on the event bus and the timeline worker recomputes asynchronously, so
/// the response is 202. File-backed servers reject ingestion.
pub async fn append(
    State(state): State<AppState>,
    Json(events): Json<Vec<HealthEvent>>,
) -> AppResult<impl IntoResponse> {
    let ServerEventSource::Memory(store) = state.source.as_ref() else {
        return Err(AppError::BadRequest(
            "Event ingestion is only available with the in-memory source".into(),
        ));
    };

    let accepted = events.len();
    store.append(state.user_id, events).await;
    let stored = store.len(state.user_id).await;
    tracing::info!(user_id = %state.user_id, accepted, stored, "Events appended via API");

    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: AppendResponse { accepted, stored },
        }),
    ))
}
