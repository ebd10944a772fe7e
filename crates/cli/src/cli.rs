use std::path::PathBuf;

use clap::Parser;
use quarry_bigquery::ColumnSpec;

/// Run one BigQuery query job and print selected columns of its result.
///
/// Without arguments, runs the built-in StackOverflow example query.
/// Connection settings come from BIGQUERY_* environment variables (or a
/// .env file); flags here override the query description.
#[derive(Parser, Debug)]
#[command(name = "quarry", version, about = "Run one BigQuery query job and print selected columns")]
pub struct CliArgs {
    /// TOML file describing the query (sql, columns, timeout_ms, ...)
    #[arg(long, env = "QUARRY_QUERY_FILE")]
    pub query_file: Option<PathBuf>,

    /// SQL text to run (overrides the query file)
    #[arg(long)]
    pub sql: Option<String>,

    /// Use the legacy SQL dialect instead of standard SQL
    #[arg(long)]
    pub legacy_sql: bool,

    /// Use standard SQL even if the query file asks for legacy SQL
    #[arg(long, conflicts_with = "legacy_sql")]
    pub standard_sql: bool,

    /// Job timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Maximum number of rows to print
    #[arg(long, conflicts_with = "all_rows")]
    pub max_rows: Option<u64>,

    /// Print every row of the result set
    #[arg(long)]
    pub all_rows: bool,

    /// Column to print, as name:kind[:label]; repeat for several columns
    #[arg(long = "column", value_name = "NAME:KIND[:LABEL]")]
    pub columns: Vec<ColumnSpec>,

    /// Line printed before the query runs
    #[arg(long)]
    pub description: Option<String>,

    /// Environment profile prefix (e.g. PROD reads PROD_BIGQUERY_PROJECT first)
    #[arg(long, env = "QUARRY_PROFILE")]
    pub profile: Option<String>,

    /// Project to run the job in (overrides BIGQUERY_PROJECT)
    #[arg(long)]
    pub project: Option<String>,

    /// Job location, e.g. US or EU (overrides BIGQUERY_LOCATION)
    #[arg(long)]
    pub location: Option<String>,
}
