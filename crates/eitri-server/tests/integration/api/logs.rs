/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;

use super::body_json;
use crate::fixtures::TestFixture;

#[tokio::test]
async fn test_get_job_logs_returns_archived_pods() {
    let fixture = TestFixture::new();
    let job_id = Uuid::new_v4();

    let mut writer = fixture.archive.writer(job_id, "report-abc-1").unwrap();
    writer.append_line("step 1").await.unwrap();
    writer.append_line("step 2").await.unwrap();
    writer.finish().await.unwrap();

    let response = fixture
        .create_test_router()
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/jobs/{}/logs", job_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let files = body.as_array().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0]["file"], "report-abc-1");
    assert_eq!(files[0]["file_data"]["logs"], json!(["step 1", "step 2"]));
    assert!(files[0]["file_data"]["path"]
        .as_str()
        .unwrap()
        .ends_with("report-abc-1/logs.log"));
    assert!(files[0]["file_data"]["date_created"].is_string());
}

#[tokio::test]
async fn test_get_logs_for_unknown_job_is_empty() {
    let fixture = TestFixture::new();

    let response = fixture
        .create_test_router()
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/jobs/{}/logs", Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, serde_json::json!([]));
}
