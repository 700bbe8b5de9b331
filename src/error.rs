//! Defines the custom error types for the contact-harvester application.

use std::io;
use thiserror::Error;
use url::ParseError as UrlParseError;

/// The primary error type for fetching, job tracking and export.
#[derive(Error, Debug)]
pub enum AppError {
    /// Error occurring during configuration loading or validation.
    #[error("Configuration Error: {0}")]
    Config(String),

    /// Error related to file input/output operations.
    #[error("IO Error: {0}")]
    Io(#[from] io::Error),

    /// Error during JSON serialization or deserialization.
    #[error("JSON Error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error reading or writing CSV data.
    #[error("CSV Error: {0}")]
    Csv(#[from] csv::Error),

    /// Error parsing a URL.
    #[error("URL Parsing Error: {0}")]
    UrlParse(#[from] UrlParseError),

    /// Error making HTTP requests via reqwest.
    #[error("HTTP Request Error: {0}")]
    Request(#[from] reqwest::Error),

    /// The server answered with a non-success status code.
    #[error("HTTP status {status} for {url}")]
    HttpStatus {
        /// The response status code.
        status: u16,
        /// The URL that was requested.
        url: String,
    },

    /// Error driving the headless browser.
    #[error("Browser Error: {0}")]
    Browser(String),

    /// Error writing the result spreadsheet.
    #[error("Export Error: {0}")]
    Export(String),

    /// Error related to concurrency or task execution.
    #[error("Task Execution Error: {0}")]
    Task(String),

    /// A batch was submitted without any usable URL.
    #[error("No valid URLs provided")]
    EmptyBatch,

    /// An uploaded URL list has an extension we cannot parse.
    #[error("Invalid file format '{0}'. Please upload a CSV, XLSX or TXT file")]
    UnsupportedFileType(String),

    /// An uploaded workbook could not be read.
    #[error("Could not read spreadsheet '{file}': {reason}")]
    Spreadsheet { file: String, reason: String },

    /// A batch exceeds the caller's URL limit.
    #[error("Too many URLs ({count}). Maximum allowed is {max} URLs per batch")]
    TooManyUrls {
        /// Number of URLs submitted.
        count: usize,
        /// The caller's limit.
        max: usize,
    },

    /// No job with the given identifier is tracked.
    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// The job exists but has not completed yet.
    #[error("Results not available for job {0}")]
    ResultsNotReady(String),

    /// An underlying error that doesn't fit other categories, using anyhow.
    #[error("Generic Error: {0}")]
    Generic(#[from] anyhow::Error),
}

impl AppError {
    /// Whether the error was caused by caller input rather than by the service.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            AppError::EmptyBatch
                | AppError::UnsupportedFileType(_)
                | AppError::Spreadsheet { .. }
                | AppError::TooManyUrls { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
