//! Error type shared by ingestion, configuration and the upload store.
//!
//! Per-cell parse failures never show up here: a date or measurement that
//! cannot be read only leaves that record's attribute absent.

use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The upload could not be read as a table (bad UTF-8, ragged rows, ...).
    #[error("Malformed input: {0}")]
    Malformed(#[from] csv::Error),

    /// The upload looked like a workbook but could not be opened as one.
    #[error("Malformed input: {0}")]
    Workbook(#[from] calamine::Error),

    #[error("Malformed input: the workbook has no worksheet")]
    NoWorksheet,

    #[error("Malformed input: the file has no header row")]
    NoHeader,

    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid filter value: {0}")]
    InvalidFilter(String),
}

pub type DashboardResult<T> = Result<T, DashboardError>;
