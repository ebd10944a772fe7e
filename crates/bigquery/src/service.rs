use async_trait::async_trait;

use crate::error::WarehouseError;
use crate::job::{JobId, JobSnapshot, QuerySpec};
use crate::row::ResultRow;
use crate::value::FieldSchema;

/// One page of query results, already decoded against the schema.
#[derive(Debug, Clone, Default)]
pub struct ResultPage {
    /// `false` when the service has not finished the job yet.
    pub job_complete: bool,
    pub schema: Vec<FieldSchema>,
    pub rows: Vec<ResultRow>,
    /// Token for the next page; `None` on the last page.
    pub page_token: Option<String>,
    pub total_rows: Option<u64>,
}

/// The warehouse operations the job pipeline depends on.
///
/// Authentication and session setup belong to the implementation.
#[async_trait]
pub trait WarehouseService: Send + Sync {
    /// Create a query job under the caller-chosen `id`.
    async fn create_job(&self, id: &JobId, spec: &QuerySpec) -> Result<JobSnapshot, WarehouseError>;

    /// Current job state, or `None` if the service no longer knows the job.
    async fn job_state(
        &self,
        id: &JobId,
        location: Option<&str>,
    ) -> Result<Option<JobSnapshot>, WarehouseError>;

    /// Fetch one page of results for a finished job.
    async fn fetch_page(
        &self,
        id: &JobId,
        location: Option<&str>,
        page_token: Option<&str>,
        max_results: u32,
    ) -> Result<ResultPage, WarehouseError>;

    /// Request cancellation of a running job.
    async fn cancel_job(&self, id: &JobId, location: Option<&str>) -> Result<(), WarehouseError>;
}
