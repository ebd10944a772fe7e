use crate::job::JobId;

/// Errors that can occur while submitting, waiting on, or reading a
/// BigQuery job.
///
/// Only the interrupt variants are recoverable: the caller is expected to
/// report them and exit cleanly. Everything else aborts the run.
#[derive(Debug, thiserror::Error)]
pub enum WarehouseError {
    /// Required connection settings are missing.
    #[error("BigQuery is not configured: {0}")]
    NotConfigured(String),

    /// Credentials are missing or were rejected by the service.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The service could not be reached.
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    /// The service answered with a non-success status.
    #[error("BigQuery API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// A response or cell value could not be decoded.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The query specification violates a local constraint.
    #[error("Invalid query spec: {0}")]
    InvalidSpec(String),

    /// The wait for job completion was interrupted.
    #[error("Wait for job {job_id} was interrupted")]
    WaitInterrupted { job_id: JobId },

    /// Reading the results of a finished job was interrupted.
    #[error("Reading results of job {job_id} was interrupted")]
    ReadInterrupted { job_id: JobId },

    /// The job did not reach a terminal state within the timeout.
    #[error("Job {job_id} did not finish within {timeout_ms} ms")]
    WaitTimeout { job_id: JobId, timeout_ms: u64 },

    /// The job finished with a service-reported execution error.
    #[error("Job {job_id} failed: {message}")]
    JobExecution { job_id: JobId, message: String },

    /// The service no longer knows about the job.
    #[error("Job {job_id} no longer exists")]
    JobHandleLost { job_id: JobId },

    /// Results were requested for a job that has not finished.
    #[error("Job {job_id} is not complete")]
    JobNotComplete { job_id: JobId },

    #[error("Column not found: {column}")]
    ColumnNotFound { column: String },

    #[error("Column {column} is {actual}, expected {expected}")]
    ColumnTypeMismatch {
        column: String,
        expected: &'static str,
        actual: &'static str,
    },
}

impl WarehouseError {
    /// Returns `true` for errors the caller may handle instead of aborting.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            WarehouseError::WaitInterrupted { .. } | WarehouseError::ReadInterrupted { .. }
        )
    }
}

/// Map a transport-level reqwest failure to a [`WarehouseError`].
pub(crate) fn transport_error(err: reqwest::Error) -> WarehouseError {
    if err.is_decode() {
        WarehouseError::Parse(err.to_string())
    } else {
        WarehouseError::Connectivity(err.to_string())
    }
}
