//! BigQuery REST (API v2) implementation of [`WarehouseService`].
//!
//! Provides [`BigQueryClient`], which creates query jobs under a
//! caller-chosen job ID, reads job status, pages through
//! `getQueryResults` and decodes rows against the returned schema.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::BigQueryConfig;
use crate::error::{transport_error, WarehouseError};
use crate::job::{JobId, JobSnapshot, JobStatus, QuerySpec, ServiceError};
use crate::row::ResultRow;
use crate::service::{ResultPage, WarehouseService};
use crate::value::{decode_row, FieldSchema};

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Client for running query jobs against BigQuery.
pub struct BigQueryClient {
    config: BigQueryConfig,
    http: reqwest::Client,
    access_token: String,
}

impl BigQueryClient {
    /// Create a new [`BigQueryClient`] from the given configuration.
    ///
    /// Returns [`WarehouseError::NotConfigured`] without a project and
    /// [`WarehouseError::Auth`] without an access token.
    pub fn new(config: BigQueryConfig) -> Result<Self, WarehouseError> {
        if config.project_id.is_empty() {
            return Err(WarehouseError::NotConfigured(
                "no project id (set BIGQUERY_PROJECT)".into(),
            ));
        }
        let access_token = config.access_token.clone().ok_or_else(|| {
            WarehouseError::Auth("no access token (set BIGQUERY_ACCESS_TOKEN)".into())
        })?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(transport_error)?;

        info!(
            project = %config.project_id,
            location = ?config.location,
            api_base = %config.api_base,
            "BigQueryClient initialised"
        );

        Ok(Self {
            config,
            http,
            access_token,
        })
    }

    pub fn config(&self) -> &BigQueryConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // URLs and request bodies
    // -----------------------------------------------------------------------

    fn jobs_url(&self) -> String {
        format!("{}/projects/{}/jobs", self.config.api_base, self.config.project_id)
    }

    fn job_url(&self, id: &JobId) -> String {
        format!("{}/{}", self.jobs_url(), id)
    }

    fn cancel_url(&self, id: &JobId) -> String {
        format!("{}/cancel", self.job_url(id))
    }

    fn query_results_url(&self, id: &JobId) -> String {
        format!(
            "{}/projects/{}/queries/{}",
            self.config.api_base, self.config.project_id, id
        )
    }

    /// Location to address a job in: the job's own, else the configured one.
    fn location<'a>(&'a self, job_location: Option<&'a str>) -> Option<&'a str> {
        job_location.or(self.config.location.as_deref())
    }

    /// Build the `jobs.insert` request body for a query job.
    fn build_insert_body(
        project_id: &str,
        location: Option<&str>,
        id: &JobId,
        spec: &QuerySpec,
    ) -> Value {
        let mut job_reference = json!({
            "projectId": project_id,
            "jobId": id.as_str(),
        });
        if let Some(location) = location {
            job_reference["location"] = json!(location);
        }

        json!({
            "jobReference": job_reference,
            "configuration": {
                // int64 fields travel as strings in the REST API.
                "jobTimeoutMs": spec.timeout_ms().to_string(),
                "query": {
                    "query": spec.sql(),
                    "useLegacySql": spec.use_legacy_sql(),
                },
            },
        })
    }

    // -----------------------------------------------------------------------
    // Transport
    // -----------------------------------------------------------------------

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, WarehouseError> {
        request
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(transport_error)
    }

    async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, WarehouseError> {
        let status = response.status();
        if status.is_success() {
            return response.json::<T>().await.map_err(transport_error);
        }
        let body = response.text().await.unwrap_or_default();
        Err(status_error(status.as_u16(), &body))
    }
}

#[async_trait]
impl WarehouseService for BigQueryClient {
    async fn create_job(&self, id: &JobId, spec: &QuerySpec) -> Result<JobSnapshot, WarehouseError> {
        let body = Self::build_insert_body(
            &self.config.project_id,
            self.config.location.as_deref(),
            id,
            spec,
        );

        debug!(job_id = %id, legacy_sql = spec.use_legacy_sql(), "Inserting query job");

        let response = self.send(self.http.post(self.jobs_url()).json(&body)).await?;
        let job: JobResource = Self::read_json(response).await?;
        let snapshot = job.into_snapshot();

        info!(job_id = %id, status = ?snapshot.status, "Query job created");
        Ok(snapshot)
    }

    async fn job_state(
        &self,
        id: &JobId,
        location: Option<&str>,
    ) -> Result<Option<JobSnapshot>, WarehouseError> {
        let mut request = self.http.get(self.job_url(id));
        if let Some(location) = self.location(location) {
            request = request.query(&[("location", location)]);
        }

        let response = self.send(request).await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            warn!(job_id = %id, "Job not found");
            return Ok(None);
        }

        let job: JobResource = Self::read_json(response).await?;
        Ok(Some(job.into_snapshot()))
    }

    async fn fetch_page(
        &self,
        id: &JobId,
        location: Option<&str>,
        page_token: Option<&str>,
        max_results: u32,
    ) -> Result<ResultPage, WarehouseError> {
        let mut params: Vec<(&str, String)> = vec![
            ("maxResults", max_results.to_string()),
            // The job is already terminal; do not hold the request open.
            ("timeoutMs", "0".to_string()),
        ];
        if let Some(location) = self.location(location) {
            params.push(("location", location.to_string()));
        }
        if let Some(token) = page_token {
            params.push(("pageToken", token.to_string()));
        }

        let response = self
            .send(self.http.get(self.query_results_url(id)).query(&params))
            .await?;
        let resource: QueryResultsResource = Self::read_json(response).await?;
        let page = resource.into_page()?;

        debug!(
            job_id = %id,
            rows = page.rows.len(),
            has_next = page.page_token.is_some(),
            "Fetched result page"
        );
        Ok(page)
    }

    async fn cancel_job(&self, id: &JobId, location: Option<&str>) -> Result<(), WarehouseError> {
        info!(job_id = %id, "Cancelling job");

        let mut request = self.http.post(self.cancel_url(id));
        if let Some(location) = self.location(location) {
            request = request.query(&[("location", location)]);
        }

        let response = self.send(request).await?;
        let _: Value = Self::read_json(response).await?;

        info!(job_id = %id, "Job cancellation requested");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

/// Classify a non-success HTTP response.
fn status_error(status: u16, body: &str) -> WarehouseError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string());

    match status {
        401 | 403 => WarehouseError::Auth(message),
        _ => WarehouseError::Api { status, message },
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobResource {
    #[serde(default)]
    job_reference: Option<JobReference>,
    #[serde(default)]
    status: Option<JobStatusResource>,
}

#[derive(Debug, Deserialize)]
struct JobReference {
    #[serde(default)]
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobStatusResource {
    #[serde(default)]
    state: String,
    #[serde(default)]
    error_result: Option<ServiceError>,
    #[serde(default)]
    errors: Vec<ServiceError>,
}

impl JobResource {
    fn into_snapshot(self) -> JobSnapshot {
        let location = self.job_reference.and_then(|r| r.location);
        match self.status {
            Some(status) => JobSnapshot {
                status: JobStatus::from_service_state(&status.state, status.error_result.is_some()),
                error_result: status.error_result,
                errors: status.errors,
                location,
            },
            None => JobSnapshot {
                location,
                ..JobSnapshot::pending()
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResultsResource {
    #[serde(default)]
    job_complete: bool,
    #[serde(default)]
    schema: Option<TableSchema>,
    #[serde(default)]
    rows: Vec<Value>,
    #[serde(default)]
    page_token: Option<String>,
    #[serde(default)]
    total_rows: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TableSchema {
    #[serde(default)]
    fields: Vec<FieldSchema>,
}

impl QueryResultsResource {
    fn into_page(self) -> Result<ResultPage, WarehouseError> {
        let schema = self.schema.map(|s| s.fields).unwrap_or_default();
        if schema.is_empty() && !self.rows.is_empty() {
            return Err(WarehouseError::Parse("result rows arrived without a schema".into()));
        }

        let rows = self
            .rows
            .iter()
            .map(|raw| decode_row(&schema, raw).map(ResultRow::new))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ResultPage {
            job_complete: self.job_complete,
            schema,
            rows,
            page_token: self.page_token.filter(|t| !t.is_empty()),
            total_rows: self.total_rows.and_then(|n| n.parse().ok()),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests — request building and response parsing only, no network calls
// ---------------------------------------------------------------------------
