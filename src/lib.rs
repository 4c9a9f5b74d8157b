//! Automated translation sync
//!
//! This library keeps localized event titles and tag names in sync with their
//! upstream English source content. A persisted job queue drives the work:
//! discovery scans enqueue jobs for missing or stale translations, time-boxed
//! invocations claim due jobs, batch them into a single provider request, and
//! persist results with retry/backoff on failure.

pub mod app_state;
pub mod config;
pub mod db;
pub mod models;
pub mod routes;
pub mod services;
