//! Integration tests for the quarry-bigquery crate.
//!
//! The full submit / wait / read pipeline runs against the in-memory
//! `MockWarehouse`, and `BigQueryClient` runs against a local `wiremock`
//! server. No network access or credentials are needed.

mod client;
mod pipeline;
mod query_config;
