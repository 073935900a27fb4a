//! Integration tests for queue statistics, force-clear, and cache stats.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use common::{await_terminal_status, body_json, delete, get, post_json, StubBehavior};
use serde_json::json;

use mediavault_core::normalize_identifier;

async fn await_cached(harness: &common::TestHarness, url: &str) {
    let key = normalize_identifier(url);
    tokio::time::timeout(Duration::from_secs(5), async {
        while harness.state.cache.get(&key).await.is_none() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("result should be cached");
}

// ---------------------------------------------------------------------------
// Test: queue stats reflect completed work
// ---------------------------------------------------------------------------

#[tokio::test]
async fn queue_stats_count_completed_jobs() {
    let harness = common::build_test_app(StubBehavior::Succeed);

    for i in 0..3 {
        let response = post_json(
            harness.app.clone(),
            "/api/v1/downloads",
            json!({ "url": format!("https://example.com/v{i}") }),
        )
        .await;
        let body = body_json(response).await;
        let job_id = body["data"]["job_id"].as_str().unwrap().to_string();
        await_terminal_status(&harness, &job_id).await;
    }

    let response = get(harness.app.clone(), "/api/v1/queue/stats").await;
    assert_eq!(response.status(), StatusCode::OK);
    let stats = body_json(response).await;

    assert_eq!(stats["data"]["completed"], 3);
    assert_eq!(stats["data"]["waiting"], 0);
    assert_eq!(stats["data"]["active"], 0);
    assert_eq!(stats["data"]["failed"], 0);
    assert_eq!(stats["data"]["total"], 3);
}

// ---------------------------------------------------------------------------
// Test: DELETE /queue clears jobs and outcomes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn clear_queue_reports_pre_clear_counts_and_empties_state() {
    let harness = common::build_test_app(StubBehavior::Succeed);

    let response = post_json(
        harness.app.clone(),
        "/api/v1/downloads",
        json!({ "url": "https://example.com/video" }),
    )
    .await;
    let body = body_json(response).await;
    let job_id = body["data"]["job_id"].as_str().unwrap().to_string();
    await_terminal_status(&harness, &job_id).await;

    let response = delete(harness.app.clone(), "/api/v1/queue").await;
    assert_eq!(response.status(), StatusCode::OK);
    let cleared = body_json(response).await;
    assert_eq!(cleared["data"]["cleared"]["total"], 1);

    // Afterwards the queue and tracker know nothing.
    let stats = body_json(get(harness.app.clone(), "/api/v1/queue/stats").await).await;
    assert_eq!(stats["data"]["total"], 0);

    let status = get(harness.app.clone(), &format!("/api/v1/jobs/{job_id}")).await;
    assert_eq!(status.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Test: cache stats list live entries with sizes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cache_stats_list_entries_with_sizes() {
    let harness = common::build_test_app(StubBehavior::Succeed);
    let url = "https://example.com/video";

    let response = post_json(harness.app.clone(), "/api/v1/downloads", json!({ "url": url })).await;
    let body = body_json(response).await;
    let job_id = body["data"]["job_id"].as_str().unwrap().to_string();
    await_terminal_status(&harness, &job_id).await;
    await_cached(&harness, url).await;

    let response = get(harness.app.clone(), "/api/v1/cache/stats").await;
    assert_eq!(response.status(), StatusCode::OK);
    let stats = body_json(response).await;

    assert_eq!(stats["data"]["total_cached"], 1);
    // The stub writes 10 bytes ("test-bytes").
    assert_eq!(stats["data"]["total_size_bytes"], 10);
    assert!(stats["data"]["ttl_days"].as_f64().unwrap() > 0.0);

    let entries = stats["data"]["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["key"], "https://example.com/video");
    assert_eq!(entries[0]["file_name"], "video.mp4");
    assert_eq!(entries[0]["file_size_bytes"], 10);
    assert!(entries[0]["ttl_seconds"].as_i64().unwrap() > 0);
    assert!(entries[0]["expires_at"].is_string());
}

// ---------------------------------------------------------------------------
// Test: empty cache stats
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cache_stats_on_empty_cache() {
    let harness = common::build_test_app(StubBehavior::Succeed);

    let stats = body_json(get(harness.app.clone(), "/api/v1/cache/stats").await).await;
    assert_eq!(stats["data"]["total_cached"], 0);
    assert_eq!(stats["data"]["total_size_bytes"], 0);
    assert!(stats["data"]["entries"].as_array().unwrap().is_empty());
}
