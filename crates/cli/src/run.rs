use std::future::Future;
use std::io::Write;

use anyhow::{Context, Result};
use quarry_bigquery::{read_results, submit, wait_for, QueryConfig, WarehouseError, WarehouseService};
use tracing::{info, warn};

/// Submit the configured query, wait for it, and write one line per row.
///
/// Output: the announcement, `Query completed in <ms> ms`, then the rows.
/// `interrupt` is honoured for the whole run, while waiting and between
/// rows.
pub async fn run_query<S, W, F>(
    service: &S,
    query: &QueryConfig,
    page_size: u32,
    out: &mut W,
    interrupt: F,
) -> Result<()>
where
    S: WarehouseService + ?Sized,
    W: Write,
    F: Future<Output = ()>,
{
    let spec = query.to_spec().context("invalid query configuration")?;

    writeln!(out, "{}", query.announcement())?;
    out.flush()?;

    let mut handle = submit(service, spec)
        .await
        .context("failed to submit query job")?;

    tokio::pin!(interrupt);

    let elapsed = wait_for(service, &mut handle, &mut interrupt).await?;
    writeln!(out, "Query completed in {} ms", elapsed.as_millis())?;

    let mut rows = read_results(service, &handle, page_size, query.max_rows)?;
    let mut printed = 0usize;
    loop {
        let next = tokio::select! {
            biased;
            _ = &mut interrupt => {
                out.flush()?;
                warn!(job_id = %handle.id(), rows = printed, "Result read interrupted");
                return Err(WarehouseError::ReadInterrupted {
                    job_id: handle.id().clone(),
                }
                .into());
            }
            next = rows.next_row() => next?,
        };
        let Some(row) = next else { break };
        writeln!(out, "{}", row.format_line(&query.columns)?)?;
        printed += 1;
    }
    out.flush()?;

    info!(job_id = %handle.id(), rows = printed, "Query finished");
    Ok(())
}

/// `true` when the run stopped because it was interrupted.
pub fn is_interrupted(err: &anyhow::Error) -> bool {
    err.downcast_ref::<WarehouseError>()
        .map_or(false, WarehouseError::is_recoverable)
}
