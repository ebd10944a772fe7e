pub mod client;
pub mod config;
pub mod error;
pub mod job;
pub mod pipeline;
pub mod query;
pub mod row;
pub mod service;
pub mod value;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use client::BigQueryClient;
pub use config::BigQueryConfig;
pub use error::WarehouseError;
pub use job::{JobHandle, JobId, JobSnapshot, JobStatus, QuerySpec, ServiceError};
pub use pipeline::{read_results, submit, wait_for, ResultRows};
pub use query::QueryConfig;
pub use row::{ColumnKind, ColumnSpec, ResultRow};
pub use service::{ResultPage, WarehouseService};
pub use value::{FieldSchema, FieldValue};
