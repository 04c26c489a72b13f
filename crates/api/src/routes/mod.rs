pub mod health;

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{cursor, events, surfaces, timeline};
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// GET  /timeline/{scale}      ordered buckets for week, month or year
/// GET  /timeline/week/history weeks older than the rendered zone
/// GET  /cursor                committed cursor and its bucket
/// POST /cursor/select         jump to a bucket
/// POST /cursor/scale          change scale, snapping the cursor
/// POST /cursor/drag           begin / move / release / cancel a drag
/// POST /cursor/today          reset to the newest week
/// GET  /surfaces/{surface}    one surface's projection of the selection
/// POST /events                append events (in-memory source only)
/// POST /events/reload         refetch events and recompute
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/timeline/{scale}", get(timeline::get_scale))
        .route("/timeline/week/history", get(timeline::week_history))
        .route("/cursor", get(cursor::get_cursor))
        .route("/cursor/select", post(cursor::select_bucket))
        .route("/cursor/scale", post(cursor::set_scale))
        .route("/cursor/drag", post(cursor::drag))
        .route("/cursor/today", post(cursor::select_today))
        .route("/surfaces/{surface}", get(surfaces::get_surface))
        .route("/events", post(events::append))
        .route("/events/reload", post(events::reload))
}
