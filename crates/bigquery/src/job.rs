//! Job model: the immutable query spec, the job identifier, and the handle
//! the waiter resolves in place.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::WarehouseError;

// ---------------------------------------------------------------------------
// QuerySpec
// ---------------------------------------------------------------------------

/// What to run: SQL text, dialect flag and job timeout.
///
/// Fields are private so a spec cannot change once validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuerySpec {
    sql: String,
    use_legacy_sql: bool,
    timeout_ms: u64,
}

impl QuerySpec {
    /// Validate and build a spec. SQL must be non-blank and the timeout
    /// strictly positive.
    pub fn new(
        sql: impl Into<String>,
        use_legacy_sql: bool,
        timeout_ms: u64,
    ) -> Result<Self, WarehouseError> {
        let sql = sql.into();
        if sql.trim().is_empty() {
            return Err(WarehouseError::InvalidSpec("SQL text is empty".into()));
        }
        if timeout_ms == 0 {
            return Err(WarehouseError::InvalidSpec(
                "timeout must be greater than zero".into(),
            ));
        }
        Ok(Self {
            sql,
            use_legacy_sql,
            timeout_ms,
        })
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn use_legacy_sql(&self) -> bool {
        self.use_legacy_sql
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }
}

// ---------------------------------------------------------------------------
// JobId
// ---------------------------------------------------------------------------

/// Client-chosen job identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// A fresh random (v4) UUID.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for JobId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Job lifecycle: Pending/Running, then Done or Failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Running,
    Done,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }

    /// Map the service's `status.state` string. `DONE` with an error is
    /// reported as [`JobStatus::Failed`]; unknown states count as pending.
    pub fn from_service_state(state: &str, has_error: bool) -> Self {
        match state {
            "RUNNING" => JobStatus::Running,
            "DONE" if has_error => JobStatus::Failed,
            "DONE" => JobStatus::Done,
            _ => JobStatus::Pending,
        }
    }
}

/// A single error reported by the service (BigQuery `ErrorProto`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceError {
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = self.message.as_deref().unwrap_or("unknown error");
        match &self.reason {
            Some(reason) => write!(f, "{}: {}", reason, message)?,
            None => f.write_str(message)?,
        }
        if let Some(location) = &self.location {
            write!(f, " (at {})", location)?;
        }
        Ok(())
    }
}

/// Job state as reported by the service at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct JobSnapshot {
    pub status: JobStatus,
    /// The error that made the job fail, if any.
    pub error_result: Option<ServiceError>,
    /// Every error encountered during execution, including non-fatal ones.
    pub errors: Vec<ServiceError>,
    /// Location the service placed the job in.
    pub location: Option<String>,
}

impl JobSnapshot {
    pub fn pending() -> Self {
        Self {
            status: JobStatus::Pending,
            error_result: None,
            errors: Vec::new(),
            location: None,
        }
    }

    pub fn running() -> Self {
        Self {
            status: JobStatus::Running,
            ..Self::pending()
        }
    }

    pub fn done() -> Self {
        Self {
            status: JobStatus::Done,
            ..Self::pending()
        }
    }

    pub fn failed(error: ServiceError) -> Self {
        Self {
            status: JobStatus::Failed,
            error_result: Some(error.clone()),
            errors: vec![error],
            location: None,
        }
    }
}

// ---------------------------------------------------------------------------
// JobHandle
// ---------------------------------------------------------------------------

/// The one handle of a run, referencing the remote job.
#[derive(Debug, Clone)]
pub struct JobHandle {
    id: JobId,
    spec: QuerySpec,
    location: Option<String>,
    status: JobStatus,
    error_result: Option<ServiceError>,
    errors: Vec<ServiceError>,
}

impl JobHandle {
    pub fn new(id: JobId, spec: QuerySpec, snapshot: JobSnapshot) -> Self {
        let mut handle = Self {
            id,
            spec,
            location: None,
            status: JobStatus::Pending,
            error_result: None,
            errors: Vec::new(),
        };
        handle.apply(snapshot);
        handle
    }

    /// Overwrite the handle's state with a newer snapshot. A known location
    /// is kept when the snapshot does not report one.
    pub fn apply(&mut self, snapshot: JobSnapshot) {
        self.status = snapshot.status;
        self.error_result = snapshot.error_result;
        self.errors = snapshot.errors;
        if snapshot.location.is_some() {
            self.location = snapshot.location;
        }
    }

    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub fn spec(&self) -> &QuerySpec {
        &self.spec
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    /// The error that failed the job, if it failed.
    pub fn error(&self) -> Option<&ServiceError> {
        self.error_result.as_ref()
    }

    /// All execution errors, not just the latest one.
    pub fn execution_errors(&self) -> &[ServiceError] {
        &self.errors
    }
}
