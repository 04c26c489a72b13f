//! Handler for per-surface projections of the shared selection.

use std::collections::BTreeMap;
use std::str::FromStr;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use bodyline_core::cursor::TimelineCursor;
use bodyline_core::metrics::{MetricKind, MetricValue};
use bodyline_timeline::{Surface, SurfaceFrame};
use serde::Serialize;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// What one surface renders right now. Only the metrics the surface
/// displays are included.
#[derive(Debug, Serialize)]
pub struct SurfaceResponse {
    pub surface: Surface,
    pub generation: u64,
    pub cursor: Option<TimelineCursor>,
    pub bucket_id: Option<String>,
    pub photo_id: Option<String>,
    pub metrics: BTreeMap<MetricKind, MetricValue>,
}

/// GET /surfaces/{surface}
pub async fn get_surface(
    State(state): State<AppState>,
    Path(surface): Path<String>,
) -> AppResult<impl IntoResponse> {
    let surface = Surface::from_str(&surface)?;
    let frame = state.timeline.frame();

    let data = match SurfaceFrame::project(surface, &frame) {
        Some(projected) => SurfaceResponse {
            surface,
            generation: projected.generation,
            photo_id: projected.photo_id().map(str::to_owned),
            metrics: surface
                .metrics()
                .iter()
                .filter_map(|kind| {
                    projected
                        .bucket
                        .metrics
                        .metrics
                        .get(kind)
                        .map(|value| (*kind, *value))
                })
                .collect(),
            bucket_id: Some(projected.bucket.id),
            cursor: Some(projected.cursor),
        },
        None => SurfaceResponse {
            surface,
            generation: frame.view.generation,
            cursor: None,
            bucket_id: None,
            photo_id: None,
            metrics: BTreeMap::new(),
        },
    };

    Ok(Json(DataResponse { data }))
}
