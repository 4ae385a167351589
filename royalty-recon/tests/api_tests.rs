//! HTTP API tests driven through the router with `oneshot`

mod helpers;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use helpers::fixtures::{report_files, seed_catalog};
use helpers::temp_database;
use http_body_util::BodyExt;
use royalty_common::config::TomlConfig;
use royalty_recon::{build_router, AppState};
use serde_json::Value;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::util::ServiceExt;

const BOUNDARY: &str = "royalty-test-boundary";

async fn create_test_app() -> (Router, SqlitePool, TempDir) {
    let (dir, pool) = temp_database().await;
    seed_catalog(&pool).await;
    let state = AppState::new(pool.clone(), Arc::new(TomlConfig::default()));
    (build_router(state), pool, dir)
}

/// Multipart body with text fields followed by file parts
fn multipart_body(fields: &[(&str, &str)], files: &[(&str, &str)]) -> String {
    let mut body = String::new();
    for (name, value) in fields {
        body.push_str(&format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
            BOUNDARY, name, value
        ));
    }
    for (file_name, content) in files {
        body.push_str(&format!(
            "--{}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{}\"\r\nContent-Type: text/csv\r\n\r\n{}\r\n",
            BOUNDARY, file_name, content
        ));
    }
    body.push_str(&format!("--{}--\r\n", BOUNDARY));
    body
}

fn upload_request(body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/reports")
        .header("content-type", format!("multipart/form-data; boundary={}", BOUNDARY))
        .body(Body::from(body))
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

async fn upload_fixture_report(app: &Router) -> String {
    let files: Vec<(String, String)> = report_files().into_iter().map(|f| (f.name, f.content)).collect();
    let file_refs: Vec<(&str, &str)> = files.iter().map(|(n, c)| (n.as_str(), c.as_str())).collect();
    let body = multipart_body(&[("quarter", "q1"), ("year", "2025"), ("delimiter", ";")], &file_refs);

    let (status, json) = send(app, upload_request(body)).await;
    assert_eq!(status, StatusCode::OK, "upload failed: {}", json);
    assert_eq!(json["success"], true);
    assert_eq!(json["message"], "Report processing started");
    json["report_id"].as_str().unwrap().to_string()
}

/// Poll until the background run leaves `processing`
async fn wait_for_terminal(app: &Router, report_id: &str) -> Value {
    for _ in 0..200 {
        let (status, json) = get(app, &format!("/reports/{}", report_id)).await;
        assert_eq!(status, StatusCode::OK);
        if json["status"] != "processing" {
            return json;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("report {} never finished", report_id);
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _pool, _dir) = create_test_app().await;

    let (status, json) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["module"], "royalty-recon");
    assert!(json.get("last_error").is_none());
}

#[tokio::test]
async fn test_upload_and_poll_to_completion() {
    let (app, _pool, _dir) = create_test_app().await;
    let report_id = upload_fixture_report(&app).await;

    let report = wait_for_terminal(&app, &report_id).await;
    assert_eq!(report["status"], "completed");
    assert_eq!(report["quarter"], "Q1");
    assert_eq!(report["year"], 2025);
    assert_eq!(report["total_files"], 3);
    assert_eq!(report["processed_files"], 3);
    assert_eq!(report["total_streams"], 190);
    assert_eq!(report["matched_tracks"], 3);
    assert_eq!(report["unmatched_tracks"], 1);
    assert_eq!(report["processing_progress"], 100);
    assert!((report["total_revenue"].as_f64().unwrap() - 21.0).abs() < 1e-9);
    assert!(report.get("details").is_none());

    let (status, list) = get(&app, "/reports").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_report_details() {
    let (app, _pool, _dir) = create_test_app().await;
    let report_id = upload_fixture_report(&app).await;
    wait_for_terminal(&app, &report_id).await;

    let (status, json) = get(&app, &format!("/reports/{}?details=true", report_id)).await;
    assert_eq!(status, StatusCode::OK);

    let details = &json["details"];
    let releases = details["releases"].as_array().unwrap();
    // rel-basic, rel-exclusive and one unmatched group
    assert_eq!(releases.len(), 3);
    let basic = releases.iter().find(|r| r["release_id"] == "rel-basic").unwrap();
    assert_eq!(basic["is_matched"], true);
    assert_eq!(basic["tracks"].as_array().unwrap().len(), 2);
    assert_eq!(basic["release_title"], "rel-basic title");

    let unmatched = releases.iter().find(|r| r["is_matched"] == false).unwrap();
    assert!(unmatched["release_id"].is_null());

    let payouts = details["payouts"].as_array().unwrap();
    assert_eq!(payouts.len(), 2);
    assert_eq!(payouts[0]["user_id"], "u1");
    assert_eq!(payouts[0]["status"], "credited");

    let platforms = details["platforms"].as_array().unwrap();
    assert_eq!(platforms[0]["name"], "Spotify");
}

#[tokio::test]
async fn test_upload_without_files_is_rejected() {
    let (app, _pool, _dir) = create_test_app().await;

    let body = multipart_body(&[("quarter", "Q1"), ("year", "2025")], &[]);
    let (status, json) = send(&app, upload_request(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["message"], "No files uploaded");
}

#[tokio::test]
async fn test_upload_without_period_is_rejected() {
    let (app, _pool, _dir) = create_test_app().await;

    let body = multipart_body(&[], &[("sales.csv", "ISRC;Quantity\nX;1")]);
    let (status, _) = send(&app, upload_request(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_period_inferred_from_file_name() {
    let (app, _pool, _dir) = create_test_app().await;

    let content = format!(
        "{}\nSpotify;RU;A;R;T;;ZZ0000000001;1;0.10",
        helpers::fixtures::HEADER
    );
    let body = multipart_body(&[("delimiter", ";")], &[("Sales Q3 2024.csv", content.as_str())]);
    let (status, json) = send(&app, upload_request(body)).await;
    assert_eq!(status, StatusCode::OK);

    let report_id = json["report_id"].as_str().unwrap().to_string();
    let report = wait_for_terminal(&app, &report_id).await;
    assert_eq!(report["quarter"], "Q3");
    assert_eq!(report["year"], 2024);
}

#[tokio::test]
async fn test_missing_report_is_not_found() {
    let (app, _pool, _dir) = create_test_app().await;

    let (status, json) = get(&app, "/reports/does-not-exist").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["code"], "NOT_FOUND");

    let (status, _) = send(
        &app,
        Request::builder()
            .method("DELETE")
            .uri("/reports/does-not-exist")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_report_reverses_payouts() {
    let (app, pool, _dir) = create_test_app().await;
    let report_id = upload_fixture_report(&app).await;
    wait_for_terminal(&app, &report_id).await;

    let (status, json) = send(
        &app,
        Request::builder()
            .method("DELETE")
            .uri(format!("/reports/{}", report_id))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["payouts"], 2);
    assert_eq!(json["debited_users"], 2);

    let (status, _) = get(&app, &format!("/reports/{}", report_id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let balance = royalty_common::db::balances::derive_balance(&pool, "u1").await.unwrap();
    assert!(balance.is_zero());
}

#[tokio::test]
async fn test_resume_after_completion_skips_credited() {
    let (app, _pool, _dir) = create_test_app().await;
    let report_id = upload_fixture_report(&app).await;
    wait_for_terminal(&app, &report_id).await;

    let (status, json) = send(
        &app,
        Request::builder()
            .method("POST")
            .uri(format!("/reports/{}/resume", report_id))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["credited"], 0);
    assert_eq!(json["skipped"], 2);
    assert_eq!(json["failed"], 0);
}

#[tokio::test]
async fn test_user_royalty_stats() {
    let (app, _pool, _dir) = create_test_app().await;
    let report_id = upload_fixture_report(&app).await;
    wait_for_terminal(&app, &report_id).await;

    let (status, json) = get(&app, "/users/u1/royalty-stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["totals"]["total_streams"], 150);
    assert_eq!(json["totals"]["matched_tracks"], 2);
    assert!((json["totals"]["total_revenue"].as_f64().unwrap() - 17.0).abs() < 1e-9);
    assert_eq!(json["periods"][0]["name"], "Q1 2025");

    let (status, json) = get(&app, "/users/nobody/royalty-stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["totals"]["total_streams"], 0);
    assert!(json["tracks"].as_array().unwrap().is_empty());
}
