//! Error types for the statsync pipeline
//!
//! This module defines the domain errors raised by the upstream client and
//! the tabular store backends.

use thiserror::Error;

/// Errors that can occur while talking to the upstream public API
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status code
    #[error("Upstream returned status {0}")]
    Status(u16),

    /// Request timeout
    #[error("Request timeout")]
    Timeout,

    /// Body could not be decoded into the expected shape
    #[error("Decoding error: {0}")]
    Decode(String),

    /// A field the profile cannot be processed without is absent
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
}

impl FetchError {
    /// Transport-level failures may succeed on the next scheduled run
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Http(_) | Self::Timeout => true,
            Self::Status(code) => matches!(code, 429 | 500 | 502 | 503 | 504),
            Self::Decode(_) | Self::MissingField(_) => false,
        }
    }
}

/// Errors raised by a tabular store backend
#[derive(Error, Debug)]
pub enum StoreError {
    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status code with the response body
    #[error("Store returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// The referenced workbook does not exist or is not accessible
    #[error("Workbook not found: {0}")]
    NotFound(String),

    /// The reference could not be turned into a workbook id
    #[error("Invalid workbook reference: {0}")]
    InvalidReference(String),

    /// A named sheet is absent from the workbook
    #[error("Sheet not found: {0}")]
    SheetMissing(String),

    /// Response body did not have the expected shape
    #[error("Decoding error: {0}")]
    Decode(String),

    /// A row with the wrong number of cells was pushed into a fixed-width table
    #[error("Row has {actual} cells, table expects {expected}")]
    RowWidth { expected: usize, actual: usize },

    /// A workbook was created but could not be shared or recorded
    #[error("Created workbook {url} was left unrecorded: {source}")]
    Unrecorded {
        url: String,
        #[source]
        source: Box<StoreError>,
    },
}

impl StoreError {
    /// Whether the error means the workbook cannot be opened at all
    pub fn is_unavailable(&self) -> bool {
        match self {
            Self::NotFound(_) | Self::InvalidReference(_) => true,
            Self::Status { status, .. } => matches!(status, 403 | 404),
            _ => false,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::Status { status, .. } => matches!(status, 429 | 500 | 502 | 503 | 504),
            Self::Unrecorded { source, .. } => source.is_recoverable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_recoverable() {
        assert!(FetchError::Timeout.is_recoverable());
        assert!(FetchError::Status(503).is_recoverable());
        assert!(!FetchError::Status(404).is_recoverable());
        assert!(!FetchError::MissingField("name").is_recoverable());
    }

    #[test]
    fn test_store_error_unavailable() {
        assert!(StoreError::NotFound("abc".into()).is_unavailable());
        assert!(StoreError::Status {
            status: 404,
            body: String::new()
        }
        .is_unavailable());
        assert!(!StoreError::Status {
            status: 500,
            body: String::new()
        }
        .is_unavailable());
        assert!(!StoreError::RowWidth {
            expected: 34,
            actual: 3
        }
        .is_unavailable());
    }

    #[test]
    fn test_error_display() {
        let err = FetchError::MissingField("profileName");
        assert_eq!(err.to_string(), "Missing required field: profileName");
    }
}
