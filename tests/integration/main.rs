//! Integration tests for Lemma-Search
//!
//! These tests use wiremock to serve the crawled sites and run the full
//! index-then-search cycle against an in-memory database.

mod common;
mod crawl_tests;
mod search_tests;
