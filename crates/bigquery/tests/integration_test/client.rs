//! `BigQueryClient` against a local HTTP server speaking the REST v2 shapes.

use std::future::{pending, ready};

use quarry_bigquery::*;
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path, path_regex, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

const JOBS_PATH: &str = "/bigquery/v2/projects/my-project/jobs";

fn client_for(server: &MockServer) -> BigQueryClient {
    BigQueryClient::new(BigQueryConfig {
        project_id: "my-project".into(),
        location: Some("US".into()),
        access_token: Some("test-token".into()),
        api_base: format!("{}/bigquery/v2", server.uri()),
        ..BigQueryConfig::default()
    })
    .unwrap()
}

fn spec() -> QuerySpec {
    QuerySpec::new("SELECT url, view_count FROM t", false, 100_000).unwrap()
}

fn job_body(state: &str) -> Value {
    json!({
        "jobReference": { "projectId": "my-project", "location": "US" },
        "status": { "state": state },
    })
}

async fn mount_insert(server: &MockServer, state: &str) {
    Mock::given(method("POST"))
        .and(path(JOBS_PATH))
        .and(header("Authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(job_body(state)))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn full_pipeline_over_http() {
    let server = MockServer::start().await;
    mount_insert(&server, "PENDING").await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/bigquery/v2/projects/my-project/jobs/[^/]+$"))
        .and(query_param("location", "US"))
        .respond_with(ResponseTemplate::new(200).set_body_json(job_body("DONE")))
        .expect(1)
        .mount(&server)
        .await;

    let schema = json!({ "fields": [
        { "name": "url", "type": "STRING", "mode": "NULLABLE" },
        { "name": "view_count", "type": "INTEGER", "mode": "NULLABLE" },
    ]});

    Mock::given(method("GET"))
        .and(path_regex(r"^/bigquery/v2/projects/my-project/queries/[^/]+$"))
        .and(query_param_is_missing("pageToken"))
        .and(query_param("maxResults", "2"))
        .and(query_param("timeoutMs", "0"))
        .and(query_param("location", "US"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jobComplete": true,
            "schema": schema,
            "totalRows": "3",
            "pageToken": "page-2",
            "rows": [
                { "f": [{ "v": "https://x/1" }, { "v": "5" }] },
                { "f": [{ "v": "https://x/2" }, { "v": "7" }] },
            ],
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/bigquery/v2/projects/my-project/queries/[^/]+$"))
        .and(query_param("pageToken", "page-2"))
        .and(query_param("maxResults", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jobComplete": true,
            "schema": schema,
            "totalRows": "3",
            "rows": [{ "f": [{ "v": "https://x/3" }, { "v": null }] }],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let mut handle = submit(&client, spec()).await.unwrap();
    assert_eq!(handle.status(), JobStatus::Pending);
    assert_eq!(handle.location(), Some("US"));

    wait_for(&client, &mut handle, pending()).await.unwrap();
    assert_eq!(handle.status(), JobStatus::Done);

    let mut rows = read_results(&client, &handle, 2, None).unwrap();
    let mut seen = Vec::new();
    while let Some(row) = rows.next_row().await.unwrap() {
        seen.push(row);
    }

    assert_eq!(rows.total_rows(), Some(3));
    assert_eq!(seen.len(), 3);
    assert_eq!(seen[0].get_str("url").unwrap(), "https://x/1");
    assert_eq!(seen[1].get_i64("view_count").unwrap(), 7);
    assert!(seen[2].get("view_count").unwrap().is_null());

    // The job ID sent on insert is the one polled afterwards.
    let requests = server.received_requests().await.unwrap();
    let insert: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(insert["jobReference"]["jobId"], handle.id().as_str());
    assert_eq!(insert["jobReference"]["location"], "US");
    assert_eq!(insert["configuration"]["jobTimeoutMs"], "100000");
    assert_eq!(insert["configuration"]["query"]["useLegacySql"], false);
    assert!(requests[1].url.path().ends_with(handle.id().as_str()));
}

#[tokio::test]
async fn job_missing_during_wait_is_lost() {
    let server = MockServer::start().await;
    mount_insert(&server, "PENDING").await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/bigquery/v2/projects/my-project/jobs/[^/]+$"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": { "code": 404, "message": "Not found: Job my-project:US.x" },
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let mut handle = submit(&client, spec()).await.unwrap();
    let err = wait_for(&client, &mut handle, pending()).await.unwrap_err();

    assert!(matches!(err, WarehouseError::JobHandleLost { .. }));
    assert_eq!(handle.status(), JobStatus::Pending);
}

#[tokio::test]
async fn rejected_credentials_are_auth_errors() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(JOBS_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {
                "code": 401,
                "message": "Request had invalid authentication credentials.",
                "status": "UNAUTHENTICATED",
            },
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = submit(&client, spec()).await.unwrap_err();

    match err {
        WarehouseError::Auth(message) => {
            assert_eq!(message, "Request had invalid authentication credentials.");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn other_statuses_are_api_errors() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(JOBS_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_string("backend unavailable"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = submit(&client, spec()).await.unwrap_err();

    match err {
        WarehouseError::Api { status, message } => {
            assert_eq!(status, 503);
            assert_eq!(message, "backend unavailable");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn failed_job_carries_service_error() {
    let server = MockServer::start().await;
    mount_insert(&server, "RUNNING").await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/bigquery/v2/projects/my-project/jobs/[^/]+$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jobReference": { "projectId": "my-project", "location": "US" },
            "status": {
                "state": "DONE",
                "errorResult": { "reason": "invalidQuery", "message": "Syntax error" },
                "errors": [{ "reason": "invalidQuery", "message": "Syntax error" }],
            },
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let mut handle = submit(&client, spec()).await.unwrap();
    let err = wait_for(&client, &mut handle, pending()).await.unwrap_err();

    match err {
        WarehouseError::JobExecution { message, .. } => {
            assert_eq!(message, "invalidQuery: Syntax error");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(handle.status(), JobStatus::Failed);
    assert_eq!(handle.execution_errors().len(), 1);
}

#[tokio::test]
async fn interrupted_wait_cancels_job() {
    let server = MockServer::start().await;
    mount_insert(&server, "RUNNING").await;

    Mock::given(method("POST"))
        .and(path_regex(r"^/bigquery/v2/projects/my-project/jobs/[^/]+/cancel$"))
        .and(query_param("location", "US"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "job": job_body("RUNNING") })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let mut handle = submit(&client, spec()).await.unwrap();
    let err = wait_for(&client, &mut handle, ready(())).await.unwrap_err();

    assert!(err.is_recoverable());
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    assert!(requests[1]
        .url
        .path()
        .ends_with(&format!("{}/cancel", handle.id())));
}

#[tokio::test]
async fn cancel_addresses_job_location() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("{JOBS_PATH}/job-1/cancel")))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client
        .cancel_job(&JobId::from("job-1"), Some("EU"))
        .await
        .unwrap_err();
    assert!(matches!(err, WarehouseError::Api { status: 500, .. }));

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests[0].url.query(), Some("location=EU"));
}
