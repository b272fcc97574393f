//! Ingestion and aggregation core for the FTTH survey dashboard.
//!
//! [`dashboard::compute_dashboard_state`] runs the whole pipeline: parse the
//! uploaded table, settle on one date column, bucket every dated record,
//! filter by the selected facets and count what is left.

pub mod config;
pub mod dashboard;
pub mod error;
pub mod filter;
pub mod fuzzy;
pub mod ingest;
pub mod models;
pub mod report;
pub mod store;
pub mod summary;
