//! Integration tests for the bucket and event endpoints.

mod common;

use axum::http::StatusCode;
use bodyline_core::event::{EventPayload, HealthEvent};
use chrono::{TimeZone, Utc};
use common::{body_json, get, post_json};
use serde_json::json;

fn with_older_weeks() -> Vec<HealthEvent> {
    let mut events = common::sample_events();
    for (id, day) in [("old-1", 4), ("old-2", 11), ("old-3", 18)] {
        events.push(HealthEvent::new(
            id,
            Utc.with_ymd_and_hms(2025, 8, day, 7, 0, 0).unwrap(),
            EventPayload::Weight { kg: 83.0 },
        ));
    }
    events
}

#[tokio::test]
async fn week_scale_lists_recent_buckets_in_order() {
    let (app, _) = common::build_test_app(common::sample_events()).await;
    let response = get(app, "/api/v1/timeline/week").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let data = &json["data"];
    assert_eq!(data["scale"], "week");
    assert_eq!(data["zone"], "recent");
    assert_eq!(data["generation"], 1);

    let ids: Vec<&str> = data["buckets"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["2025-W39", "2025-W40", "2025-W41", "2025-W42"]);

    let newest = &data["buckets"][3]["metrics"];
    assert_eq!(newest["metrics"]["weight"]["presence"], "present");
    assert_eq!(newest["canonical_photo_id"], "front-1014");
    assert_eq!(newest["body_score_completeness"], "none");
}

#[tokio::test]
async fn month_scale_always_has_six_months() {
    let (app, _) = common::build_test_app(common::sample_events()).await;
    let json = body_json(get(app, "/api/v1/timeline/month").await).await;

    let buckets = json["data"]["buckets"].as_array().unwrap();
    assert_eq!(buckets.len(), 6);
    assert_eq!(buckets[0]["id"], "2025-03");
    assert_eq!(buckets[5]["id"], "2025-08");
    assert_eq!(json["data"]["zone"], "medium");
}

#[tokio::test]
async fn empty_timeline_returns_empty_buckets() {
    let (app, _) = common::build_test_app(vec![]).await;
    let json = body_json(get(app, "/api/v1/timeline/year").await).await;

    assert_eq!(json["data"]["buckets"], json!([]));
}

#[tokio::test]
async fn unknown_scale_is_a_validation_error() {
    let (app, _) = common::build_test_app(vec![]).await;
    let response = get(app, "/api/v1/timeline/decade").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn appended_events_appear_after_reload() {
    let (app, _) = common::build_test_app(common::sample_events()).await;

    let response = post_json(
        app.clone(),
        "/api/v1/events",
        json!([
            {"id": "bf1", "timestamp": "2025-10-16T07:00:00Z", "stream": "body_fat", "percent": 18.5}
        ]),
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["accepted"], 1);
    assert_eq!(json["data"]["stored"], 6);

    let response = post_json(app.clone(), "/api/v1/events/reload", json!({})).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["outcome"], "published");
    assert_eq!(json["data"]["generation"], 2);
    assert_eq!(json["data"]["event_count"], 6);

    let json = body_json(get(app, "/api/v1/timeline/week").await).await;
    let newest = &json["data"]["buckets"][3]["metrics"]["metrics"];
    assert_eq!(newest["body_fat"]["presence"], "present");
}

#[tokio::test]
async fn malformed_events_are_counted_not_rejected() {
    let (app, _) = common::build_test_app(common::sample_events()).await;

    post_json(
        app.clone(),
        "/api/v1/events",
        json!([
            {"id": "neg", "timestamp": "2025-10-16T07:00:00Z", "stream": "weight", "kg": -4.0}
        ]),
    )
    .await;
    let json = body_json(post_json(app, "/api/v1/events/reload", json!({})).await).await;

    assert_eq!(json["data"]["event_count"], 5);
    assert_eq!(json["data"]["skipped_events"], 1);
}

#[tokio::test]
async fn week_history_pages_back_from_rendered_zone() {
    let (app, _) = common::build_test_app(with_older_weeks()).await;

    let json = body_json(get(app.clone(), "/api/v1/timeline/week/history?limit=2").await).await;
    assert_eq!(json["data"]["before"], "2025-09-22");
    let ids: Vec<&str> = json["data"]["buckets"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["2025-W33", "2025-W34"]);

    let json = body_json(
        get(app, "/api/v1/timeline/week/history?before=2025-08-11&limit=2").await,
    )
    .await;
    let buckets = json["data"]["buckets"].as_array().unwrap();
    assert_eq!(buckets.len(), 1);
    assert_eq!(buckets[0]["id"], "2025-W32");
}

#[tokio::test]
async fn week_history_rejects_zero_limit() {
    let (app, _) = common::build_test_app(with_older_weeks()).await;
    let response = get(app, "/api/v1/timeline/week/history?limit=0").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "BAD_REQUEST");
}
