//! QueryConfig behaviour as seen by library users.

use quarry_bigquery::*;

#[test]
fn invalid_configs_never_reach_the_service() {
    let blank = QueryConfig {
        sql: "  ".into(),
        ..QueryConfig::default()
    };
    assert!(matches!(blank.to_spec(), Err(WarehouseError::InvalidSpec(_))));

    let no_timeout = QueryConfig {
        timeout_ms: 0,
        ..QueryConfig::default()
    };
    assert!(matches!(no_timeout.to_spec(), Err(WarehouseError::InvalidSpec(_))));
}

#[test]
fn columns_parse_from_cli_syntax() {
    let columns: Vec<ColumnSpec> = ["url:string", "view_count:integer:views"]
        .iter()
        .map(|s| s.parse().unwrap())
        .collect();
    assert_eq!(columns, QueryConfig::default().columns);
}
