// src/utils/error.rs
use chrono::NaiveDate;
use thiserror::Error;

// Define specific error types for different parts of the application
#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("Network request failed: {0}")]
    Network(#[from] reqwest::Error), // Automatically convert reqwest errors

    #[error("HTTP error: {0}")]
    Http(reqwest::StatusCode), // e.g., 404 Not Found, 403 Forbidden

    #[error("Field '{0}' not found on the page")]
    MissingField(&'static str),

    #[error("Field '{0}' is empty")]
    EmptyField(&'static str),

    #[error("Company {0} is not present in the corresponding stocks table")]
    ExcludedCompany(String),

    #[error("Unexpected page layout: {0}")]
    UnexpectedLayout(String),

    #[error("Invalid dispatch: {0}")]
    Dispatch(#[from] DispatchError),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DispatchError {
    #[error("company name is empty")]
    EmptyCompanyName,

    #[error("report content is empty")]
    EmptyContent,
}

#[derive(Error, Debug)]
pub enum PriceError {
    #[error("Network request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP error: {0}")]
    Http(reqwest::StatusCode),

    #[error("Failed to parse price response: {0}")]
    Parse(String),

    /// Zero or several close records for one trading day. Usually a holiday or a delisting.
    #[error("Expected exactly one close for {instrument} on {date}, got {records} (holiday?)")]
    DataUnavailable {
        instrument: String,
        date: NaiveDate,
        records: usize,
    },

    /// A zero previous close makes the return undefined.
    #[error("Closes of {instrument} or the index around {date} give no finite score")]
    NonFiniteScore { instrument: String, date: NaiveDate },
}

#[derive(Error, Debug)]
pub enum AnnotateError {
    #[error("Company {0} not found in the company code table")]
    UnknownCompany(String),

    #[error(transparent)]
    Price(#[from] PriceError),
}

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("No disclosure-site id for company {0}")]
    MissingInfosferaId(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid text encoding: {0}")]
    InvalidEncoding(String),
}

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Malformed row {line} in {path}")]
    MalformedKlejRow { path: String, line: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error), // Automatically convert IO errors

    #[error("Scraping failed: {0}")]
    Scrape(#[from] ScrapeError),

    #[error("Price lookup failed: {0}")]
    Price(#[from] PriceError),

    #[error("Annotation failed: {0}")]
    Annotate(#[from] AnnotateError),

    #[error("Reconciliation failed: {0}")]
    Reconcile(#[from] ReconcileError),

    #[error("Dataset assembly failed: {0}")]
    Dataset(#[from] DatasetError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl AppError {
    /// Configuration problems are detected before any stage runs.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            AppError::Config(_) | AppError::Dataset(DatasetError::Configuration(_))
        )
    }
}
