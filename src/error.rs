//! Error handling.

use ndarray::ShapeError;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{event, Level};

/// Query error type
///
/// This type encapsulates the errors that may occur while answering a query.
/// The `Display` text of each variant is the user-facing message.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Error validating a Query (missing or malformed fields)
    #[error("query is not valid: {0}")]
    InvalidQuery(#[from] validator::ValidationErrors),

    /// A date in the time range is not `YYYY-MM-DD`
    #[error("Invalid date format.")]
    InvalidDateFormat,

    /// The start date is after the end date
    #[error("Invalid date range: Start date is after end date.")]
    InvalidDateRange,

    /// Unsupported operation requested
    #[error("Unsupported operation '{operation}'. Please choose mean, median, variance, max, min, range, deviation, or all.")]
    UnsupportedOperation { operation: String },

    /// Location is not in the region registry
    #[error("Invalid location: '{location}'")]
    UnknownRegion { location: String },

    /// The parameter has no dataset directory
    #[error("Parameter '{parameter}' not found.")]
    DatasetNotFound { parameter: String },

    /// The catalog holds no file dated inside the time range
    #[error("No matching data files found.")]
    NoMatchingFiles,

    /// Every matching file was skipped while cropping
    #[error("No valid cropped data found.")]
    NoValidCroppedData,

    /// No frame holds a single non-missing sample
    #[error("No valid data found.")]
    NoValidData,

    /// Cropped frames within one query do not share a shape
    #[error("Inconsistent raster shapes across files.")]
    ShapeMismatch {
        expected: Vec<usize>,
        found: Vec<usize>,
        path: PathBuf,
    },

    /// Error stacking frames into a 3-D array
    #[error("failed to stack raster frames")]
    Stack(#[from] ShapeError),

    /// The query ran past its deadline
    #[error("query exceeded its deadline of {seconds} seconds")]
    DeadlineExceeded { seconds: u64 },

    /// Error reading the dataset catalog
    #[error("error reading dataset catalog")]
    Io(#[from] std::io::Error),
}

/// Broad classification of an error, used to decide how it is reported.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad dates, unknown region, unsupported operation. Never retried.
    Validation,
    /// Data absence: missing dataset, no matching files, nothing left after cropping.
    NotFound,
    /// Inconsistent geometry between files.
    Geometry,
    /// Anything else.
    Internal,
}

impl ErrorKind {
    /// Short label, used for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Geometry => "geometry",
            ErrorKind::Internal => "internal",
        }
    }
}

impl QueryError {
    /// Returns the [ErrorKind] of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            QueryError::InvalidQuery(_)
            | QueryError::InvalidDateFormat
            | QueryError::InvalidDateRange
            | QueryError::UnsupportedOperation { operation: _ }
            | QueryError::UnknownRegion { location: _ } => ErrorKind::Validation,

            QueryError::DatasetNotFound { parameter: _ }
            | QueryError::NoMatchingFiles
            | QueryError::NoValidCroppedData
            | QueryError::NoValidData => ErrorKind::NotFound,

            QueryError::ShapeMismatch { .. } | QueryError::Stack(_) => ErrorKind::Geometry,

            QueryError::DeadlineExceeded { seconds: _ } | QueryError::Io(_) => {
                ErrorKind::Internal
            }
        }
    }
}

/// Body of error response
///
/// Implements serde (de)serialise.
#[derive(Debug, Deserialize, Serialize)]
pub struct ErrorBody {
    /// Main error message
    pub message: String,

    /// Optional list of causes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caused_by: Option<Vec<String>>,
}

impl ErrorBody {
    /// Return a new ErrorBody
    ///
    /// # Arguments
    ///
    /// * `error`: The error that occurred
    fn new<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        let message = error.to_string();
        let mut caused_by = None;
        let mut current = error.source();
        while let Some(source) = current {
            let mut causes: Vec<String> = caused_by.unwrap_or_default();
            causes.push(source.to_string());
            caused_by = Some(causes);
            current = source.source();
        }
        // Remove duplicate entries.
        if let Some(caused_by) = caused_by.as_mut() {
            caused_by.dedup()
        }
        ErrorBody { message, caused_by }
    }
}

/// Error report printed by the binary in place of a result.
///
/// Implements serde (de)serialise.
#[derive(Debug, Deserialize, Serialize)]
pub struct ErrorResponse {
    /// Classification of the error
    pub kind: ErrorKind,

    /// Response body
    pub error: ErrorBody,
}

impl ErrorResponse {
    /// Return a new ErrorResponse
    ///
    /// Internal errors are logged together with their chain of causes.
    ///
    /// # Arguments
    ///
    /// * `kind`: Classification of the error
    /// * `error`: The error that occurred. This will be formatted into a suitable `ErrorBody`
    pub fn new<E>(kind: ErrorKind, error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        if kind == ErrorKind::Internal {
            event!(Level::ERROR, "{}", error.to_string());
            let mut current = error.source();
            while let Some(source) = current {
                event!(Level::ERROR, "Caused by: {}", source.to_string());
                current = source.source();
            }
        }
        ErrorResponse {
            kind,
            error: ErrorBody::new(error),
        }
    }
}

impl From<QueryError> for ErrorResponse {
    /// Convert from a `QueryError` into an `ErrorResponse`.
    fn from(error: QueryError) -> Self {
        Self::new(error.kind(), &error)
    }
}
