//! Submit a query job, wait for it to finish, read its rows.
//!
//! The three steps share one [`JobHandle`]: [`submit`] creates it,
//! [`wait_for`] resolves it in place and [`read_results`] pages through the
//! finished job's result set on demand.

use std::collections::VecDeque;
use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures::Stream;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::WarehouseError;
use crate::job::{JobHandle, JobId, JobStatus, QuerySpec};
use crate::row::ResultRow;
use crate::service::WarehouseService;
use crate::value::FieldSchema;

const INITIAL_POLL_DELAY_MS: u64 = 200;
const MAX_POLL_DELAY_MS: u64 = 2000;
const POLL_BACKOFF_FACTOR: f64 = 1.5;

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

/// Create a remote query job under a freshly generated job ID.
///
/// The returned handle reflects whatever the service reported at creation;
/// the job may not have started yet.
pub async fn submit<S>(service: &S, spec: QuerySpec) -> Result<JobHandle, WarehouseError>
where
    S: WarehouseService + ?Sized,
{
    let id = JobId::generate();
    info!(job_id = %id, timeout_ms = spec.timeout_ms(), "Submitting query job");

    let snapshot = service.create_job(&id, &spec).await?;
    Ok(JobHandle::new(id, spec, snapshot))
}

// ---------------------------------------------------------------------------
// Wait
// ---------------------------------------------------------------------------

/// Block until the job is terminal, the spec's timeout elapses, or
/// `interrupt` resolves, whichever comes first.
///
/// On success the handle holds the `Done` state and the elapsed wait time is
/// returned. A service-reported failure becomes
/// [`WarehouseError::JobExecution`]; the handle still carries the errors.
/// Timeout and interrupt both request cancellation of the job before
/// returning, leaving the handle at the last state polled.
pub async fn wait_for<S, F>(
    service: &S,
    handle: &mut JobHandle,
    interrupt: F,
) -> Result<Duration, WarehouseError>
where
    S: WarehouseService + ?Sized,
    F: Future<Output = ()>,
{
    let start = Instant::now();
    let id = handle.id().clone();
    let timeout_ms = handle.spec().timeout_ms();

    let outcome = tokio::select! {
        biased;
        _ = interrupt => None,
        res = tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            poll_until_terminal(service, &mut *handle),
        ) => Some(res),
    };

    let elapsed = start.elapsed();
    let location = handle.location().map(str::to_string);

    let found = match outcome {
        None => {
            warn!(job_id = %id, elapsed_ms = elapsed.as_millis() as u64, "Wait interrupted");
            cancel_quietly(service, &id, location.as_deref()).await;
            return Err(WarehouseError::WaitInterrupted { job_id: id });
        }
        Some(Err(_)) => {
            warn!(job_id = %id, timeout_ms, status = ?handle.status(), "Job timed out, cancelling");
            cancel_quietly(service, &id, location.as_deref()).await;
            return Err(WarehouseError::WaitTimeout {
                job_id: id,
                timeout_ms,
            });
        }
        Some(Ok(res)) => res?,
    };

    info!(job_id = %id, elapsed_ms = elapsed.as_millis() as u64, "Job wait finished");

    // The service only reports a job missing if it was deleted under us.
    if !found {
        return Err(WarehouseError::JobHandleLost { job_id: id });
    }

    if handle.status() == JobStatus::Failed || handle.error().is_some() {
        let message = handle
            .error()
            .map(|e| e.to_string())
            .unwrap_or_else(|| "job failed without an error description".to_string());
        error!(
            job_id = %id,
            error = %message,
            errors = handle.execution_errors().len(),
            "Job failed"
        );
        return Err(WarehouseError::JobExecution { job_id: id, message });
    }

    Ok(elapsed)
}

/// Poll job state with growing delays until it is terminal, applying every
/// observed state to `handle`.
///
/// Returns `Ok(false)` if the service reports the job as gone. Any request
/// error ends the wait.
async fn poll_until_terminal<S>(service: &S, handle: &mut JobHandle) -> Result<bool, WarehouseError>
where
    S: WarehouseService + ?Sized,
{
    let mut delay_ms = INITIAL_POLL_DELAY_MS;

    loop {
        let state = service.job_state(handle.id(), handle.location()).await?;
        let Some(snapshot) = state else {
            return Ok(false);
        };

        debug!(job_id = %handle.id(), status = ?snapshot.status, "Polling job status");
        handle.apply(snapshot);

        if handle.status().is_terminal() {
            return Ok(true);
        }

        tokio::time::sleep(Duration::from_millis(delay_ms + jitter_ms())).await;
        delay_ms = ((delay_ms as f64 * POLL_BACKOFF_FACTOR) as u64).min(MAX_POLL_DELAY_MS);
    }
}

/// Jitter in `[0, 100)` ms without pulling in `rand`: nanosecond fraction
/// of the current time.
fn jitter_ms() -> u64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    (nanos % 100) as u64
}

async fn cancel_quietly<S>(service: &S, id: &JobId, location: Option<&str>)
where
    S: WarehouseService + ?Sized,
{
    if let Err(e) = service.cancel_job(id, location).await {
        warn!(job_id = %id, error = %e, "Job cancellation failed");
    }
}

// ---------------------------------------------------------------------------
// Read
// ---------------------------------------------------------------------------

/// Start reading the result set of a finished job.
///
/// Nothing is fetched until the first [`ResultRows::next_row`] call. Reading
/// again means calling this again.
pub fn read_results<'a, S>(
    service: &'a S,
    handle: &JobHandle,
    page_size: u32,
    max_rows: Option<u64>,
) -> Result<ResultRows<'a, S>, WarehouseError>
where
    S: WarehouseService + ?Sized,
{
    match (handle.status(), handle.error()) {
        (JobStatus::Done, None) => {}
        (JobStatus::Done | JobStatus::Failed, error) => {
            return Err(WarehouseError::JobExecution {
                job_id: handle.id().clone(),
                message: error
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "job failed without an error description".to_string()),
            });
        }
        (JobStatus::Pending | JobStatus::Running, _) => {
            return Err(WarehouseError::JobNotComplete {
                job_id: handle.id().clone(),
            });
        }
    }

    Ok(ResultRows {
        service,
        job_id: handle.id().clone(),
        location: handle.location().map(str::to_string),
        page_size: page_size.max(1),
        remaining: max_rows,
        buffer: VecDeque::new(),
        next_page_token: None,
        exhausted: false,
        schema: Vec::new(),
        total_rows: None,
    })
}

/// Lazy, forward-only cursor over a job's result rows.
///
/// Holds at most one page in memory. Ends when the service has no further
/// page or the row cap is reached, and stays ended after an error.
pub struct ResultRows<'a, S: ?Sized> {
    service: &'a S,
    job_id: JobId,
    location: Option<String>,
    page_size: u32,
    remaining: Option<u64>,
    buffer: VecDeque<ResultRow>,
    next_page_token: Option<String>,
    exhausted: bool,
    schema: Vec<FieldSchema>,
    total_rows: Option<u64>,
}

impl<'a, S> ResultRows<'a, S>
where
    S: WarehouseService + ?Sized,
{
    /// The next row in service order, or `None` once the rows run out.
    pub async fn next_row(&mut self) -> Result<Option<ResultRow>, WarehouseError> {
        loop {
            if self.remaining == Some(0) {
                return Ok(None);
            }
            if let Some(row) = self.buffer.pop_front() {
                if let Some(remaining) = self.remaining.as_mut() {
                    *remaining -= 1;
                }
                return Ok(Some(row));
            }
            if self.exhausted {
                return Ok(None);
            }
            if let Err(e) = self.fetch_next_page().await {
                self.exhausted = true;
                return Err(e);
            }
        }
    }

    async fn fetch_next_page(&mut self) -> Result<(), WarehouseError> {
        let max_results = match self.remaining {
            Some(remaining) => remaining.min(u64::from(self.page_size)) as u32,
            None => self.page_size,
        };

        let page = self
            .service
            .fetch_page(
                &self.job_id,
                self.location.as_deref(),
                self.next_page_token.as_deref(),
                max_results,
            )
            .await?;

        if !page.job_complete {
            return Err(WarehouseError::JobNotComplete {
                job_id: self.job_id.clone(),
            });
        }

        if self.schema.is_empty() {
            self.schema = page.schema;
        }
        self.total_rows = page.total_rows.or(self.total_rows);
        self.buffer.extend(page.rows);
        self.next_page_token = page.page_token;
        self.exhausted = self.next_page_token.is_none();
        Ok(())
    }

    /// Schema of the result set; empty until the first page arrives.
    pub fn schema(&self) -> &[FieldSchema] {
        &self.schema
    }

    /// Total rows the query produced, as reported by the service.
    pub fn total_rows(&self) -> Option<u64> {
        self.total_rows
    }

    /// Adapt the cursor into a [`Stream`] of rows.
    pub fn into_stream(self) -> impl Stream<Item = Result<ResultRow, WarehouseError>> + 'a {
        futures::stream::try_unfold(self, |mut rows| async move {
            let next = rows.next_row().await;
            next.map(|row| row.map(|row| (row, rows)))
        })
    }
}
