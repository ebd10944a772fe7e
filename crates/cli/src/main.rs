mod cli;
mod config;
mod run;

use std::io;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use quarry_bigquery::BigQueryClient;

use crate::cli::CliArgs;
use crate::config::{resolve_bigquery_config, resolve_query_config};
use crate::run::{is_interrupted, run_query};

/// Resolves on Ctrl+C. If the handler cannot be installed the run is
/// simply not interruptible.
async fn interrupt_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Logs go to stderr; stdout carries only query output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let args = CliArgs::parse();

    let query = resolve_query_config(&args).context("failed to load query configuration")?;
    let bq_config = resolve_bigquery_config(&args);
    let page_size = bq_config.page_size;

    info!(project = %bq_config.project_id, sql = %query.sql, "Starting quarry");

    let client = BigQueryClient::new(bq_config).context("failed to create BigQuery client")?;

    let mut stdout = io::stdout();
    match run_query(&client, &query, page_size, &mut stdout, interrupt_signal()).await {
        Ok(()) => Ok(()),
        Err(e) if is_interrupted(&e) => {
            eprintln!("{:#}", e);
            std::process::exit(1);
        }
        Err(e) => Err(e),
    }
}
