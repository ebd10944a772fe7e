//! In-memory [`WarehouseService`] for exercising the job pipeline without
//! network access.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::WarehouseError;
use crate::job::{JobId, JobSnapshot, QuerySpec};
use crate::row::ResultRow;
use crate::service::{ResultPage, WarehouseService};
use crate::value::FieldSchema;

/// A scripted warehouse.
///
/// `job_state` replays the scripted states in order and then keeps
/// returning the last one (by default a single `Done`). Results are served
/// from a flat row list, `max_results` rows at a time, with the row offset
/// as page token.
pub struct MockWarehouse {
    state: Mutex<MockState>,
}

struct MockState {
    creation: JobSnapshot,
    create_error: Option<WarehouseError>,
    states: VecDeque<Option<JobSnapshot>>,
    last_state: Option<JobSnapshot>,
    schema: Vec<FieldSchema>,
    rows: Vec<ResultRow>,
    incomplete_results: bool,
    created: Vec<(JobId, QuerySpec)>,
    state_calls: usize,
    page_requests: Vec<(Option<String>, u32)>,
    cancelled: Vec<JobId>,
}

impl MockWarehouse {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                creation: JobSnapshot::pending(),
                create_error: None,
                states: VecDeque::new(),
                last_state: Some(JobSnapshot::done()),
                schema: Vec::new(),
                rows: Vec::new(),
                incomplete_results: false,
                created: Vec::new(),
                state_calls: 0,
                page_requests: Vec::new(),
                cancelled: Vec::new(),
            }),
        }
    }

    fn inner(&mut self) -> &mut MockState {
        self.state.get_mut().unwrap()
    }

    /// Script the states `job_state` reports; `None` means "job not found".
    pub fn with_states<I>(mut self, states: I) -> Self
    where
        I: IntoIterator<Item = Option<JobSnapshot>>,
    {
        self.inner().states = states.into_iter().collect();
        self
    }

    /// The job stays `Running` forever.
    pub fn never_finishes(self) -> Self {
        self.with_states([Some(JobSnapshot::running())])
    }

    /// The snapshot returned from `create_job`.
    pub fn with_creation_state(mut self, snapshot: JobSnapshot) -> Self {
        self.inner().creation = snapshot;
        self
    }

    /// Fail the next `create_job` call.
    pub fn with_create_error(mut self, error: WarehouseError) -> Self {
        self.inner().create_error = Some(error);
        self
    }

    pub fn with_rows(mut self, schema: Vec<FieldSchema>, rows: Vec<ResultRow>) -> Self {
        let inner = self.inner();
        inner.schema = schema;
        inner.rows = rows;
        self
    }

    /// Every result page reports the job as still running.
    pub fn with_incomplete_results(mut self) -> Self {
        self.inner().incomplete_results = true;
        self
    }

    /// Jobs created so far, in order.
    pub fn created_jobs(&self) -> Vec<(JobId, QuerySpec)> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn state_calls(&self) -> usize {
        self.state.lock().unwrap().state_calls
    }

    /// `(page_token, max_results)` of every `fetch_page` call.
    pub fn page_requests(&self) -> Vec<(Option<String>, u32)> {
        self.state.lock().unwrap().page_requests.clone()
    }

    pub fn cancelled(&self) -> Vec<JobId> {
        self.state.lock().unwrap().cancelled.clone()
    }
}

impl Default for MockWarehouse {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WarehouseService for MockWarehouse {
    async fn create_job(&self, id: &JobId, spec: &QuerySpec) -> Result<JobSnapshot, WarehouseError> {
        let mut state = self.state.lock().unwrap();
        if let Some(error) = state.create_error.take() {
            return Err(error);
        }
        state.created.push((id.clone(), spec.clone()));
        Ok(state.creation.clone())
    }

    async fn job_state(
        &self,
        _id: &JobId,
        _location: Option<&str>,
    ) -> Result<Option<JobSnapshot>, WarehouseError> {
        let mut state = self.state.lock().unwrap();
        state.state_calls += 1;
        if let Some(next) = state.states.pop_front() {
            state.last_state = next;
        }
        Ok(state.last_state.clone())
    }

    async fn fetch_page(
        &self,
        _id: &JobId,
        _location: Option<&str>,
        page_token: Option<&str>,
        max_results: u32,
    ) -> Result<ResultPage, WarehouseError> {
        let mut state = self.state.lock().unwrap();
        state
            .page_requests
            .push((page_token.map(str::to_string), max_results));

        if state.incomplete_results {
            return Ok(ResultPage::default());
        }

        let start = match page_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| WarehouseError::Parse(format!("bad page token {:?}", token)))?,
            None => 0,
        };
        let start = start.min(state.rows.len());
        let end = (start + max_results as usize).min(state.rows.len());

        Ok(ResultPage {
            job_complete: true,
            schema: state.schema.clone(),
            rows: state.rows[start..end].to_vec(),
            page_token: (end < state.rows.len()).then(|| end.to_string()),
            total_rows: Some(state.rows.len() as u64),
        })
    }

    async fn cancel_job(&self, id: &JobId, _location: Option<&str>) -> Result<(), WarehouseError> {
        self.state.lock().unwrap().cancelled.push(id.clone());
        Ok(())
    }
}
