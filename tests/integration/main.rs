//! Integration tests for Fetch-Pool
//!
//! These tests run the full pipeline with the reqwest fetcher against
//! wiremock servers.

mod pipeline_tests;
