#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use bodyline_core::clock::FixedClock;
use bodyline_core::config::TimelineConfig;
use bodyline_core::event::{EventPayload, HealthEvent};
use bodyline_events::source::InMemoryEventSource;
use bodyline_events::EventBus;
use bodyline_timeline::TimelineService;
use chrono::{NaiveDate, TimeZone, Utc};
use http_body_util::BodyExt;
use tower::ServiceExt;

use bodyline_api::config::ServerConfig;
use bodyline_api::router::build_app_router;
use bodyline_api::source::ServerEventSource;
use bodyline_api::state::AppState;

/// Fixed "today" for every API test.
pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 10, 17).unwrap()
}

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        events_file: None,
        user_id: uuid::Uuid::nil(),
        timeline: TimelineConfig::default(),
    }
}

/// Build the full application with an in-memory source holding `events`,
/// already loaded into the timeline.
pub async fn build_test_app(events: Vec<HealthEvent>) -> (Router, AppState) {
    let config = test_config();
    let bus = Arc::new(EventBus::default());
    let store = InMemoryEventSource::new().with_bus(Arc::clone(&bus));
    store.replace(config.user_id, events).await;
    let source = Arc::new(ServerEventSource::Memory(store));

    let timeline = Arc::new(TimelineService::new(
        config.timeline.clone(),
        None,
        Arc::new(FixedClock(today())),
    ));
    timeline
        .refresh(source.as_ref(), config.user_id)
        .await
        .unwrap();

    let state = AppState {
        timeline,
        source,
        event_bus: bus,
        user_id: config.user_id,
    };
    (build_app_router(state.clone(), &config), state)
}

/// Four weekly weigh-ins plus a photo, all before `today()`.
pub fn sample_events() -> Vec<HealthEvent> {
    let at = |m, d| Utc.with_ymd_and_hms(2025, m, d, 7, 0, 0).unwrap();
    vec![
        HealthEvent::new("w1", at(9, 22), EventPayload::Weight { kg: 82.0 }),
        HealthEvent::new("w2", at(9, 29), EventPayload::Weight { kg: 81.5 }),
        HealthEvent::new("w3", at(10, 6), EventPayload::Weight { kg: 81.0 }),
        HealthEvent::new("w4", at(10, 15), EventPayload::Weight { kg: 80.2 }),
        HealthEvent::new(
            "p1",
            at(10, 14),
            EventPayload::Photo {
                photo_id: "front-1014".into(),
            },
        ),
    ]
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
