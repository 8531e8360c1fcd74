//! Error types for the weir-guard check engine.
//!
//! Every failure the engine can surface is represented by [`WeirError`]. The
//! variants are deliberately discriminable so callers can tell a misconfigured
//! check apart from a structural query problem or a failing metric store.

use thiserror::Error;

/// The main error type for weir-guard.
#[derive(Error, Debug)]
pub enum WeirError {
    /// A check or run is misconfigured (unknown datasource, missing
    /// dimensions, malformed threshold, ...).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A check kind, condition or dialect that the engine does not implement.
    #[error("Operation not supported: {0}")]
    NotSupported(String),

    /// A query returned no rows (or no columns) where one was required.
    ///
    /// This signals a structural problem such as a missing table or bad SQL,
    /// and is never folded into a failed check.
    #[error("Unexpected result executing check '{check}': {message}")]
    UnexpectedResult {
        /// Name of the check being executed
        check: String,
        /// Detailed error message
        message: String,
    },

    /// A measured value could not be compared against its threshold.
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    /// Error raised by a datasource driver.
    #[error("Driver error on datasource '{datasource}': {message}")]
    Driver {
        /// Name of the datasource the driver serves
        datasource: String,
        /// Detailed error message
        message: String,
        /// Optional underlying error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Error raised by the metric store.
    #[error("Metric store error during {operation}: {message}")]
    MetricStore {
        /// The operation that failed (e.g. "insert_results")
        operation: String,
        /// Detailed error message
        message: String,
        /// Optional underlying error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Error from DataFusion operations.
    #[error("DataFusion error: {0}")]
    DataFusion(#[from] datafusion::error::DataFusionError),

    /// Error from Arrow operations.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// A configuration document could not be parsed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Error from serialization/deserialization operations.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic internal error for unexpected conditions.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A type alias for `Result<T, WeirError>`.
pub type Result<T> = std::result::Result<T, WeirError>;

impl WeirError {
    /// Creates a new unexpected-result error for the given check.
    pub fn unexpected_result(check: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UnexpectedResult {
            check: check.into(),
            message: message.into(),
        }
    }

    /// Creates a new driver error with a source error.
    pub fn driver_with_source(
        datasource: impl Into<String>,
        message: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::Driver {
            datasource: datasource.into(),
            message: message.into(),
            source: Some(source),
        }
    }

    /// Creates a new metric store error.
    pub fn metric_store(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MetricStore {
            operation: operation.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new metric store error with a source error.
    pub fn metric_store_with_source(
        operation: impl Into<String>,
        message: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::MetricStore {
            operation: operation.into(),
            message: message.into(),
            source: Some(source),
        }
    }

    /// Returns true when this error must abort the whole run, even when the
    /// runner is configured to continue past per-check failures.
    pub fn aborts_run(&self) -> bool {
        matches!(self, WeirError::MetricStore { .. })
    }
}

impl From<serde_json::Error> for WeirError {
    fn from(err: serde_json::Error) -> Self {
        WeirError::Serialization(err.to_string())
    }
}
