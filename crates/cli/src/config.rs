use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use quarry_bigquery::{BigQueryConfig, QueryConfig};
use tracing::debug;

use crate::cli::CliArgs;

/// Load the query description from a TOML file, or the built-in default
/// query when no file is given.
pub fn load_query_config(path: Option<&Path>) -> Result<QueryConfig> {
    let Some(path) = path else {
        return Ok(QueryConfig::default());
    };

    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read query file: {}", path.display()))?;
    let config = parse_query_config(&raw)
        .with_context(|| format!("failed to parse query file: {}", path.display()))?;

    debug!(path = %path.display(), "Loaded query file");
    Ok(config)
}

pub fn parse_query_config(raw: &str) -> Result<QueryConfig> {
    Ok(toml::from_str(raw)?)
}

/// Apply command-line overrides on top of the file (or default) config.
pub fn apply_query_overrides(config: &mut QueryConfig, args: &CliArgs) {
    if let Some(sql) = &args.sql {
        config.sql = sql.clone();
    }
    if args.legacy_sql {
        config.use_legacy_sql = true;
    } else if args.standard_sql {
        config.use_legacy_sql = false;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config.timeout_ms = timeout_ms;
    }
    if args.all_rows {
        config.max_rows = None;
    } else if let Some(max_rows) = args.max_rows {
        config.max_rows = Some(max_rows);
    }
    if !args.columns.is_empty() {
        config.columns = args.columns.clone();
    }
    if let Some(description) = &args.description {
        config.description = Some(description.clone());
    }
}

/// Resolve the full query config: file first, then flags.
pub fn resolve_query_config(args: &CliArgs) -> Result<QueryConfig> {
    let mut config = load_query_config(args.query_file.as_deref())?;
    apply_query_overrides(&mut config, args);
    Ok(config)
}

/// Connection settings from the environment, with flag overrides.
pub fn resolve_bigquery_config(args: &CliArgs) -> BigQueryConfig {
    let mut config = match &args.profile {
        Some(profile) => BigQueryConfig::from_env_profiled(&profile.to_uppercase()),
        None => BigQueryConfig::from_env(),
    };
    if let Some(project) = &args.project {
        config.project_id = project.clone();
    }
    if let Some(location) = &args.location {
        config.location = Some(location.clone());
    }
    config
}
