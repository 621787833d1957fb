/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::Response,
};
use eitri_server::store::JobStore;
use serde_json::{json, Value};
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;

use super::body_json;
use crate::fixtures::TestFixture;

fn template(name: &str) -> Value {
    json!({
        "metadata": {"name": name},
        "spec": {
            "backoffLimit": 0,
            "template": {
                "spec": {
                    "restartPolicy": "Never",
                    "containers": [{
                        "name": "main",
                        "image": "busybox",
                        "env": [{"name": "API_KEY", "value": "{{secrets.API_KEY}}"}]
                    }]
                }
            }
        }
    })
}

async fn send(fixture: &TestFixture, method: &str, uri: &str, body: Option<Value>) -> Response {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json");
    let body = match body {
        Some(value) => Body::from(value.to_string()),
        None => Body::empty(),
    };
    fixture
        .create_test_router()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap()
}

async fn submit(fixture: &TestFixture, app: Uuid, name: &str) -> Value {
    let response = send(
        fixture,
        "POST",
        &format!("/api/v1/applications/{}/jobs", app),
        Some(template(name)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await
}

#[tokio::test]
async fn test_submit_job_resolves_secret() {
    let fixture = TestFixture::new();
    let app = Uuid::new_v4();
    fixture.resolver.set(app, "API_KEY", "abc123").unwrap();

    let body = submit(&fixture, app, "report").await;

    assert_eq!(body["job"]["phase"], "Pending");
    assert_eq!(body["job"]["application_id"], app.to_string());
    assert_eq!(
        body["spec"]["template"]["spec"]["containers"][0]["env"][0]["value"],
        "abc123"
    );
    assert_eq!(body["status"]["active"], 1);

    let name = body["job"]["name"].as_str().unwrap();
    assert!(name.starts_with("report-"));
    let cluster_job = fixture.cluster.jobs.lock().unwrap()[name].clone();
    let labels = cluster_job.metadata.labels.unwrap();
    assert_eq!(labels["eitri.io/job-id"], body["job"]["id"].as_str().unwrap());
    assert_eq!(labels["eitri.io/invoked"], "true");

    // Only the cluster ever sees the plaintext
    let id = Uuid::parse_str(body["job"]["id"].as_str().unwrap()).unwrap();
    let stored = JobStore::get(fixture.store.as_ref(), id).unwrap().unwrap();
    assert!(!stored.spec.to_string().contains("abc123"));
}

#[tokio::test]
async fn test_submit_job_with_unknown_secret_blanks_value() {
    let fixture = TestFixture::new();

    let body = submit(&fixture, Uuid::new_v4(), "report").await;

    assert_eq!(
        body["spec"]["template"]["spec"]["containers"][0]["env"][0]["value"],
        ""
    );
}

#[tokio::test]
async fn test_submit_job_without_name_is_bad_request() {
    let fixture = TestFixture::new();
    let mut invalid = template("report");
    invalid["metadata"] = json!({});

    let response = send(
        &fixture,
        "POST",
        &format!("/api/v1/applications/{}/jobs", Uuid::new_v4()),
        Some(invalid),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(fixture.cluster.jobs.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_cluster_rejection_is_surfaced_verbatim() {
    let fixture = TestFixture::new();
    *fixture.cluster.reject_with.lock().unwrap() =
        Some("exceeded quota: compute-resources".to_string());
    let app = Uuid::new_v4();

    let response = send(
        &fixture,
        "POST",
        &format!("/api/v1/applications/{}/jobs", app),
        Some(template("report")),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = body_json(response).await;
    assert_eq!(body["error"], "exceeded quota: compute-resources");
    assert!(JobStore::list_for_application(fixture.store.as_ref(), app)
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_list_and_get_jobs() {
    let fixture = TestFixture::new();
    let app = Uuid::new_v4();
    let first = submit(&fixture, app, "first").await;
    tokio::time::sleep(Duration::from_millis(5)).await;
    let second = submit(&fixture, app, "second").await;
    submit(&fixture, Uuid::new_v4(), "elsewhere").await;

    let response = send(&fixture, "GET", &format!("/api/v1/applications/{}/jobs", app), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let listed = body_json(response).await;
    let listed = listed.as_array().unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0]["id"], second["job"]["id"]);
    assert_eq!(listed[1]["id"], first["job"]["id"]);

    let id = first["job"]["id"].as_str().unwrap();
    let response = send(&fixture, "GET", &format!("/api/v1/jobs/{}", id), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["name"], first["job"]["name"]);
}

#[tokio::test]
async fn test_get_unknown_job_is_not_found() {
    let fixture = TestFixture::new();

    for uri in [
        format!("/api/v1/jobs/{}", Uuid::new_v4()),
        format!("/api/v1/jobs/{}/status", Uuid::new_v4()),
    ] {
        let response = send(&fixture, "GET", &uri, None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", uri);
    }
}

#[tokio::test]
async fn test_job_status_reads_cluster() {
    let fixture = TestFixture::new();
    let submitted = submit(&fixture, Uuid::new_v4(), "report").await;
    let id = submitted["job"]["id"].as_str().unwrap();

    let response = send(&fixture, "GET", &format!("/api/v1/jobs/{}/status", id), None).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["job"]["id"], id);
    assert_eq!(body["status"]["active"], 1);
}

#[tokio::test]
async fn test_delete_job_removes_record_and_cluster_job() {
    let fixture = TestFixture::new();
    let submitted = submit(&fixture, Uuid::new_v4(), "report").await;
    let id = submitted["job"]["id"].as_str().unwrap();
    let name = submitted["job"]["name"].as_str().unwrap().to_string();

    let response = send(&fixture, "DELETE", &format!("/api/v1/jobs/{}", id), None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = send(&fixture, "GET", &format!("/api/v1/jobs/{}", id), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Cluster deletion runs in the background
    let mut deleted = false;
    for _ in 0..50 {
        if fixture.cluster.deleted.lock().unwrap().contains(&name) {
            deleted = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(deleted);

    let response = send(&fixture, "DELETE", &format!("/api/v1/jobs/{}", id), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
