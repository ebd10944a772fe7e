use serde::{Deserialize, Serialize};

use crate::error::WarehouseError;
use crate::job::QuerySpec;
use crate::row::{ColumnKind, ColumnSpec};

/// Default job timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 100_000;

/// Default cap on rows read from the result set.
pub const DEFAULT_MAX_ROWS: u64 = 10;

const DEFAULT_DESCRIPTION: &str =
    "Querying BigQuery for StackOverflow questions containing the term 'google-bigquery'...";

const DEFAULT_SQL: &str = "SELECT \
     CONCAT('https://stackoverflow.com/questions/', CAST(id as STRING)) as url, \
     view_count \
     FROM `bigquery-public-data.stackoverflow.posts_questions` \
     WHERE tags like '%google-bigquery%' \
     ORDER BY favorite_count DESC LIMIT 10";

/// Everything that describes one run: the query, how long to wait for it,
/// and which columns to print.
///
/// Missing fields take their defaults when deserialized, so a query file
/// only needs to name what it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Line announced before the query runs.
    pub description: Option<String>,
    pub sql: String,
    /// Use BigQuery's legacy SQL dialect instead of standard SQL.
    pub use_legacy_sql: bool,
    pub timeout_ms: u64,
    /// Upper bound on rows read; `None` reads the whole result set.
    pub max_rows: Option<u64>,
    /// Columns extracted from each row, in output order.
    pub columns: Vec<ColumnSpec>,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            description: Some(DEFAULT_DESCRIPTION.to_string()),
            sql: DEFAULT_SQL.to_string(),
            use_legacy_sql: false,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_rows: Some(DEFAULT_MAX_ROWS),
            columns: vec![
                ColumnSpec::new("url", ColumnKind::String),
                ColumnSpec::labelled("view_count", ColumnKind::Integer, "views"),
            ],
        }
    }
}

impl QueryConfig {
    /// Validate into an immutable [`QuerySpec`].
    pub fn to_spec(&self) -> Result<QuerySpec, WarehouseError> {
        QuerySpec::new(self.sql.clone(), self.use_legacy_sql, self.timeout_ms)
    }

    /// The announcement line, or a generic one.
    pub fn announcement(&self) -> &str {
        self.description.as_deref().unwrap_or("Running query...")
    }
}
