use std::sync::Arc;

use bodyline_core::types::UserId;
use bodyline_events::EventBus;
use bodyline_timeline::TimelineService;

use crate::source::ServerEventSource;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// The one timeline service all surfaces read from.
    pub timeline: Arc<TimelineService>,
    /// Where `events/reload` pulls from.
    pub source: Arc<ServerEventSource>,
    /// Change notices consumed by the timeline worker.
    pub event_bus: Arc<EventBus>,
    pub user_id: UserId,
}
