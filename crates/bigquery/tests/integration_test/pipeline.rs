//! End-to-end pipeline scenarios against the mock warehouse.

use std::future::{pending, ready};
use std::time::Duration;

use quarry_bigquery::mock::MockWarehouse;
use quarry_bigquery::*;

fn url_views_schema() -> Vec<FieldSchema> {
    vec![
        FieldSchema::new("url", "STRING"),
        FieldSchema::new("view_count", "INTEGER"),
    ]
}

fn url_views_row(url: &str, views: i64) -> ResultRow {
    ResultRow::from_pairs([
        ("url", FieldValue::String(url.to_string())),
        ("view_count", FieldValue::Integer(views)),
    ])
}

async fn collect_lines<S: WarehouseService + ?Sized>(
    service: &S,
    handle: &JobHandle,
    config: &QueryConfig,
) -> Result<Vec<String>, WarehouseError> {
    let mut rows = read_results(service, handle, 1000, config.max_rows)?;
    let mut lines = Vec::new();
    while let Some(row) = rows.next_row().await? {
        lines.push(row.format_line(&config.columns)?);
    }
    Ok(lines)
}

#[tokio::test]
async fn single_row_scenario() {
    let config = QueryConfig {
        sql: "SELECT 'https://x/1' as url, 5 as view_count".into(),
        ..QueryConfig::default()
    };
    let service = MockWarehouse::new()
        .with_rows(url_views_schema(), vec![url_views_row("https://x/1", 5)]);

    let mut handle = submit(&service, config.to_spec().unwrap()).await.unwrap();
    wait_for(&service, &mut handle, pending()).await.unwrap();
    let lines = collect_lines(&service, &handle, &config).await.unwrap();

    assert_eq!(lines, vec!["url: https://x/1 views: 5".to_string()]);
    assert_eq!(
        service.created_jobs()[0].1.sql(),
        "SELECT 'https://x/1' as url, 5 as view_count"
    );
}

#[tokio::test]
async fn rows_are_delivered_in_order_and_capped_at_ten() {
    let rows: Vec<ResultRow> = (0..15)
        .map(|i| url_views_row(&format!("https://x/{}", i), 100 - i))
        .collect();
    let service = MockWarehouse::new().with_rows(url_views_schema(), rows);
    let config = QueryConfig::default();

    let mut handle = submit(&service, config.to_spec().unwrap()).await.unwrap();
    wait_for(&service, &mut handle, pending()).await.unwrap();
    let lines = collect_lines(&service, &handle, &config).await.unwrap();

    assert_eq!(lines.len(), 10);
    for (i, line) in lines.iter().enumerate() {
        assert_eq!(line, &format!("url: https://x/{} views: {}", i, 100 - i as i64));
    }
}

#[tokio::test]
async fn execution_error_stops_before_results() {
    let service = MockWarehouse::new()
        .with_states([
            Some(JobSnapshot::running()),
            Some(JobSnapshot::failed(ServiceError {
                reason: Some("accessDenied".into()),
                location: None,
                message: Some("Access Denied: Table posts_questions".into()),
            })),
        ])
        .with_rows(url_views_schema(), vec![url_views_row("https://x/1", 5)]);

    let mut handle = submit(&service, QueryConfig::default().to_spec().unwrap())
        .await
        .unwrap();
    let err = wait_for(&service, &mut handle, pending()).await.unwrap_err();

    assert!(matches!(err, WarehouseError::JobExecution { .. }));
    assert!(err.to_string().contains("Access Denied"));
    assert!(!err.is_recoverable());
    assert!(read_results(&service, &handle, 1000, Some(10)).is_err());
    assert!(service.page_requests().is_empty());
}

#[tokio::test]
async fn interrupted_wait_is_recoverable_and_reads_nothing() {
    let service = MockWarehouse::new()
        .never_finishes()
        .with_rows(url_views_schema(), vec![url_views_row("https://x/1", 5)]);

    let mut handle = submit(&service, QueryConfig::default().to_spec().unwrap())
        .await
        .unwrap();
    let err = wait_for(&service, &mut handle, ready(())).await.unwrap_err();

    assert!(err.is_recoverable());
    assert!(matches!(err, WarehouseError::WaitInterrupted { .. }));
    assert!(read_results(&service, &handle, 1000, Some(10)).is_err());
    assert!(service.page_requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn never_terminal_job_times_out() {
    let service = MockWarehouse::new().never_finishes();
    let spec = QuerySpec::new("SELECT 1", false, 100_000).unwrap();

    let mut handle = submit(&service, spec).await.unwrap();
    let started = tokio::time::Instant::now();
    let err = wait_for(&service, &mut handle, pending()).await.unwrap_err();

    assert!(matches!(
        err,
        WarehouseError::WaitTimeout { timeout_ms: 100_000, .. }
    ));
    assert!(started.elapsed() >= Duration::from_millis(100_000));
    assert!(!handle.status().is_terminal());
}

#[tokio::test]
async fn elapsed_is_bounded_by_outer_measurement() {
    let service = MockWarehouse::new()
        .with_states([Some(JobSnapshot::running()), Some(JobSnapshot::done())]);
    let mut handle = submit(&service, QueryConfig::default().to_spec().unwrap())
        .await
        .unwrap();

    let outer = tokio::time::Instant::now();
    let elapsed = wait_for(&service, &mut handle, pending()).await.unwrap();
    let outer_elapsed = outer.elapsed();

    assert!(elapsed <= outer_elapsed);
    assert_eq!(handle.status(), JobStatus::Done);
}

#[tokio::test]
async fn wrong_column_type_fails_extraction() {
    let service = MockWarehouse::new().with_rows(url_views_schema(), vec![url_views_row("https://x/1", 5)]);
    let config = QueryConfig {
        columns: vec![ColumnSpec::new("url", ColumnKind::Integer)],
        ..QueryConfig::default()
    };

    let mut handle = submit(&service, config.to_spec().unwrap()).await.unwrap();
    wait_for(&service, &mut handle, pending()).await.unwrap();
    let err = collect_lines(&service, &handle, &config).await.unwrap_err();

    assert!(matches!(err, WarehouseError::ColumnTypeMismatch { .. }));
}
