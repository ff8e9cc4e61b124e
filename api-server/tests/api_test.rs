//! Integration tests for the HTTP API.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;

mod common;

use common::{test_app, test_app_with, TestOptions, REMOTE_PEER};

// ============================================================================
// Health & Stats
// ============================================================================

#[tokio::test]
async fn test_health() {
    let app = test_app();

    let (status, json) = app.get("/api/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["active_shares"], 0);
}

#[tokio::test]
async fn test_stats_after_share() {
    let app = test_app();
    let id = app.start_share(3).await;
    app.wait_for_terminal(&id).await;

    let (status, json) = app.get("/api/stats").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["stats"]["total"], 1);
    assert_eq!(json["stats"]["completed"], 1);
    assert_eq!(json["stats"]["total_requested"], 3);
    assert_eq!(json["stats"]["total_success"], 3);
}

// ============================================================================
// Share lifecycle
// ============================================================================

#[tokio::test]
async fn test_share_completes() {
    let app = test_app();

    let (status, json) = app
        .post_json(
            "/api/share",
            json!({"cookie": "c_user=1", "link": "https://example.com/post", "limit": 5}),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], true);
    assert_eq!(json["message"], "Share process started");
    let id = json["share_id"].as_str().unwrap().to_string();

    let share = app.wait_for_terminal(&id).await;
    assert_eq!(share["requested"], 5);
    assert_eq!(share["success"], 5);
    assert_eq!(share["failed"], 0);
    assert_eq!(share["status"], "completed");
    assert_eq!(share["progress"], 100);
    assert!(share["end_time"].is_string());
    assert!(share.get("token").is_none());
    assert_eq!(app.client.calls(), 5);
}

#[tokio::test]
async fn test_share_fails_without_token() {
    let app = test_app_with(TestOptions {
        token: None,
        ..TestOptions::default()
    });

    let id = app.start_share(5).await;
    let share = app.wait_for_terminal(&id).await;

    assert_eq!(share["success"], 0);
    assert_eq!(share["status"], "failed");
    assert_eq!(app.client.calls(), 0);
}

#[tokio::test]
async fn test_progress_route_matches_share_route() {
    let app = test_app();
    let id = app.start_share(2).await;
    app.wait_for_terminal(&id).await;

    let (_, share) = app.get(&format!("/api/share/{id}")).await;
    let (status, progress) = app.get(&format!("/api/share/{id}/progress")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(share, progress);
}

#[tokio::test]
async fn test_running_share_and_cancel() {
    let app = test_app_with(TestOptions {
        hold_at: 2,
        ..TestOptions::default()
    });
    let id = app.start_share(5).await;
    app.client.reached.notified().await;

    let (status, json) = app.get("/api/running-shares").await;
    assert_eq!(status, StatusCode::OK);
    let running = json["running_shares"].as_array().unwrap();
    assert_eq!(running.len(), 1);
    assert_eq!(running[0]["id"], id.as_str());
    assert_eq!(running[0]["status"], "processing");
    assert_eq!(running[0]["progress"], 20);

    let (status, json) = app.post_empty(&format!("/api/share/{id}/cancel")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], true);
    app.client.release.notify_one();

    let share = app.wait_for_terminal(&id).await;
    assert_eq!(share["status"], "cancelled");
    assert_eq!(share["success"], 2);
    assert_eq!(app.client.calls(), 2);

    let (_, json) = app.get("/api/running-shares").await;
    assert_eq!(json["running_shares"], json!([]));
}

#[tokio::test]
async fn test_cancel_unknown_share() {
    let app = test_app();
    let id = app.start_share(1).await;
    app.wait_for_terminal(&id).await;
    let (_, before) = app.get("/api/history").await;

    let (status, json) = app
        .post_empty("/api/share/0190d6a4-9a6e-7cc1-8a2b-3f1e2d3c4b5a/cancel")
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "SHARE_NOT_FOUND");

    let (status, json) = app.post_empty(&format!("/api/share/{id}/cancel")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "SHARE_NOT_FOUND");

    let (_, after) = app.get("/api/history").await;
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_get_share_not_found() {
    let app = test_app();

    let (status, json) = app
        .get("/api/share/0190d6a4-9a6e-7cc1-8a2b-3f1e2d3c4b5a")
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["status"], false);
    assert_eq!(json["code"], "SHARE_NOT_FOUND");

    let (status, json) = app.get("/api/share/not-an-id").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "INVALID_ID");
}

// ============================================================================
// Validation
// ============================================================================

#[tokio::test]
async fn test_validation_codes() {
    let app = test_app();
    let cases = [
        (json!({"link": "https://example.com/post", "limit": 1}), "MISSING_FIELDS"),
        (json!({"cookie": "c_user=1", "limit": 1}), "MISSING_FIELDS"),
        (json!({"cookie": "c_user=1", "link": "https://example.com/post"}), "MISSING_FIELDS"),
        (json!({"cookie": "c_user=1", "link": "https://example.com/post", "limit": 0}), "INVALID_LIMIT"),
        (json!({"cookie": "c_user=1", "link": "https://example.com/post", "limit": 101}), "LIMIT_TOO_HIGH"),
        (json!({"cookie": "c_user=1", "link": "example.com/post", "limit": 1}), "INVALID_LINK"),
        (json!({"cookie": "nonsense", "link": "https://example.com/post", "limit": 1}), "INVALID_COOKIE"),
    ];

    for (body, code) in cases {
        let (status, json) = app.post_json("/api/share", body.clone()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        assert_eq!(json["status"], false);
        assert_eq!(json["code"], code, "{body}");
    }

    let (_, json) = app.get("/api/history").await;
    assert_eq!(json["history"], json!([]));
    assert_eq!(app.client.calls(), 0);
}

#[tokio::test]
async fn test_malformed_json_body() {
    let app = test_app();

    let (status, json) = app
        .send(
            Request::post("/api/share")
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "INVALID_BODY");
}

// ============================================================================
// History
// ============================================================================

#[tokio::test]
async fn test_history_newest_first_with_limit() {
    let app = test_app();
    let mut ids = Vec::new();
    for _ in 0..3 {
        let id = app.start_share(1).await;
        app.wait_for_terminal(&id).await;
        ids.push(id);
    }

    let (status, json) = app.get("/api/history?limit=2").await;

    assert_eq!(status, StatusCode::OK);
    let history = json["history"].as_array().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["id"], ids[2].as_str());
    assert_eq!(history[1]["id"], ids[1].as_str());
}

#[tokio::test]
async fn test_history_respects_capacity() {
    let app = test_app_with(TestOptions {
        capacity: 2,
        ..TestOptions::default()
    });
    let mut newest = String::new();
    for _ in 0..4 {
        newest = app.start_share(1).await;
        app.wait_for_terminal(&newest).await;
    }

    let (_, json) = app.get("/api/history?limit=50").await;
    let history = json["history"].as_array().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["id"], newest.as_str());
}

#[tokio::test]
async fn test_history_bad_limit_uses_error_envelope() {
    let app = test_app();

    for uri in ["/api/history?limit=abc", "/api/history?limit=-1"] {
        let (status, json) = app.get(uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["status"], false);
        assert_eq!(json["code"], "INVALID_QUERY");
    }
}

#[tokio::test]
async fn test_clear_history() {
    let app = test_app();
    let id = app.start_share(1).await;
    app.wait_for_terminal(&id).await;

    let (status, json) = app.post_empty("/api/clear-history").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["cleared"], 1);

    let (_, json) = app.get("/api/history").await;
    assert_eq!(json["history"], json!([]));
}

// ============================================================================
// Authorization
// ============================================================================

#[tokio::test]
async fn test_remote_writes_rejected_without_token() {
    let app = test_app_with(TestOptions {
        peer: REMOTE_PEER,
        ..TestOptions::default()
    });

    let (status, json) = app.post_empty("/api/clear-history").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "UNAUTHORIZED");

    let (status, _) = app
        .post_json(
            "/api/share",
            json!({"cookie": "c_user=1", "link": "https://example.com/post", "limit": 1}),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Reads stay open.
    let (status, _) = app.get("/api/history").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_bearer_token_unlocks_writes() {
    let app = test_app_with(TestOptions {
        peer: REMOTE_PEER,
        api_token: Some("s3cret".to_string()),
        ..TestOptions::default()
    });

    let (status, _) = app
        .send(
            Request::post("/api/clear-history")
                .header("authorization", "Bearer wrong")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, json) = app
        .send(
            Request::post("/api/clear-history")
                .header("authorization", "Bearer s3cret")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["cleared"], 0);
}
