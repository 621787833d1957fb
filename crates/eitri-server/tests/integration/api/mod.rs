/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

mod jobs;
mod logs;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    response::Response,
};
use tower::ServiceExt;

use crate::fixtures::TestFixture;

pub async fn body_json(response: Response) -> serde_json::Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

async fn get(fixture: &TestFixture, uri: &str) -> Response {
    fixture
        .create_test_router()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_healthz_endpoint() {
    let fixture = TestFixture::new();
    let response = get(&fixture, "/healthz").await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"OK");
}

#[tokio::test]
async fn test_readyz_endpoint() {
    let fixture = TestFixture::new();
    let response = get(&fixture, "/readyz").await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"Ready");
}

#[tokio::test]
async fn test_metrics_endpoint_exposes_both_registries() {
    let fixture = TestFixture::new();
    eitri_server::metrics::hub_clients();
    eitri_cluster::metrics::active_tailers();

    let response = get(&fixture, "/metrics").await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("eitri_hub_clients"));
    assert!(text.contains("eitri_active_tailers"));
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let fixture = TestFixture::new();
    let response = get(&fixture, "/api/v1/openapi.json").await;

    assert_eq!(response.status(), StatusCode::OK);
    let doc = body_json(response).await;
    assert!(doc["paths"]["/api/v1/jobs/{id}"].is_object());
}

#[tokio::test]
async fn test_ws_without_id_is_rejected() {
    let fixture = TestFixture::new();

    for uri in ["/ws", "/ws?id="] {
        let response = get(&fixture, uri).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);
        let body = body_json(response).await;
        assert!(body["error"].is_string());
    }
}
