use std::env;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Default REST endpoint for BigQuery API v2.
pub const DEFAULT_API_BASE: &str = "https://bigquery.googleapis.com/bigquery/v2";

const DEFAULT_PAGE_SIZE: u32 = 1000;
const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 60;

// ── Env helpers (profile-prefixed key first, then the bare key) ──

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries `{PROFILE}_{KEY}` first, falls back to `{KEY}`.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u32(profile: &str, key: &str, default: u32) -> u32 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── BigQueryConfig ───────────────────────────────────────────────

/// Connection settings for the BigQuery REST API.
///
/// Reads from environment variables with optional profile prefix.
/// When `QUARRY_PROFILE=PROD`, checks `PROD_BIGQUERY_PROJECT` before
/// `BIGQUERY_PROJECT`.
#[derive(Clone, Serialize, Deserialize)]
pub struct BigQueryConfig {
    /// Project that owns (and is billed for) the query job.
    pub project_id: String,
    /// Job location (e.g. "US", "EU"); `None` lets the service decide.
    pub location: Option<String>,
    /// OAuth2 bearer token sent with every request.
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
    /// Base URL for API v2, without trailing slash.
    pub api_base: String,
    /// Maximum rows requested per result page.
    pub page_size: u32,
    /// Per-request HTTP timeout in seconds.
    pub request_timeout_seconds: u64,
}

impl BigQueryConfig {
    /// Build config from environment variables.
    ///
    /// Reads `QUARRY_PROFILE` to determine the profile prefix.
    /// `BIGQUERY_PROJECT` falls back to `GOOGLE_CLOUD_PROJECT`, and
    /// `BIGQUERY_ACCESS_TOKEN` falls back to `GOOGLE_OAUTH_ACCESS_TOKEN`.
    pub fn from_env() -> Self {
        let profile = env_opt("QUARRY_PROFILE")
            .map(|s| s.to_uppercase())
            .unwrap_or_default();
        Self::from_env_profiled(&profile)
    }

    /// Build config for a specific named profile.
    pub fn from_env_profiled(profile: &str) -> Self {
        let project_id = profiled_env_opt(profile, "BIGQUERY_PROJECT")
            .or_else(|| profiled_env_opt(profile, "GOOGLE_CLOUD_PROJECT"))
            .unwrap_or_default();
        let access_token = profiled_env_opt(profile, "BIGQUERY_ACCESS_TOKEN")
            .or_else(|| profiled_env_opt(profile, "GOOGLE_OAUTH_ACCESS_TOKEN"));
        let api_base = profiled_env_or(profile, "BIGQUERY_API_BASE", DEFAULT_API_BASE)
            .trim_end_matches('/')
            .to_string();

        Self {
            project_id,
            location: profiled_env_opt(profile, "BIGQUERY_LOCATION"),
            access_token,
            api_base,
            page_size: profiled_env_u32(profile, "BIGQUERY_PAGE_SIZE", DEFAULT_PAGE_SIZE),
            request_timeout_seconds: profiled_env_u64(
                profile,
                "BIGQUERY_REQUEST_TIMEOUT_SECONDS",
                DEFAULT_REQUEST_TIMEOUT_SECONDS,
            ),
        }
    }

    /// Returns `true` when both a project and an access token are present.
    pub fn is_configured(&self) -> bool {
        !self.project_id.is_empty() && self.access_token.is_some()
    }
}

impl Default for BigQueryConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            location: None,
            access_token: None,
            api_base: DEFAULT_API_BASE.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            request_timeout_seconds: DEFAULT_REQUEST_TIMEOUT_SECONDS,
        }
    }
}

impl fmt::Debug for BigQueryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BigQueryConfig")
            .field("project_id", &self.project_id)
            .field("location", &self.location)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("api_base", &self.api_base)
            .field("page_size", &self.page_size)
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .finish()
    }
}

// ── Tests ────────────────────────────────────────────────────────
