//! Error types for the skew-guard parity engine.
//!
//! All fallible operations return [`SkewError`] through the crate-wide
//! [`Result`] alias. Errors are fatal for a run: the engine never produces a
//! partial verdict, and it never silently skips a value it cannot compare.

use thiserror::Error;

/// The main error type for skew-guard.
#[derive(Error, Debug)]
pub enum SkewError {
    /// A declared key or feature column is absent, or the feature spec is
    /// internally inconsistent.
    #[error("Schema error: {message}")]
    Schema {
        /// Human-readable description of the schema problem
        message: String,
    },

    /// A value cannot be coerced to the type a comparison rule expects.
    #[error("Type error in feature '{feature}': expected {expected}, found {found}")]
    Type {
        /// The feature being compared
        feature: String,
        /// What the rule expected
        expected: String,
        /// What was observed
        found: String,
    },

    /// Error raised by a record source (adapter).
    #[error("Data source error ({source_type}): {message}")]
    DataSource {
        /// Kind of source (e.g. "JSON", "Arrow", "DataFusion")
        source_type: String,
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

    /// Error from I/O operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error related to configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Error from serialization/deserialization operations.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Error when an operation is not supported.
    #[error("Operation not supported: {0}")]
    NotSupported(String),

    /// Generic internal error for unexpected conditions.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A type alias for `Result<T, SkewError>`.
pub type Result<T> = std::result::Result<T, SkewError>;

impl SkewError {
    /// Process exit code for any error raised before a verdict exists.
    pub const EXIT_CODE: i32 = 2;

    /// Creates a new schema error.
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
        }
    }

    /// Creates a new comparison-level type error.
    pub fn type_error(
        feature: impl Into<String>,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        Self::Type {
            feature: feature.into(),
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Creates a new data source error.
    pub fn data_source(source_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DataSource {
            source_type: source_type.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new data source error with a source error.
    pub fn data_source_with_source(
        source_type: impl Into<String>,
        message: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::DataSource {
            source_type: source_type.into(),
            message: message.into(),
            source: Some(source),
        }
    }

    /// Returns true for errors caused by the spec or record layout rather
    /// than by the values themselves.
    pub fn is_schema_error(&self) -> bool {
        matches!(self, SkewError::Schema { .. })
    }
}

impl From<serde_json::Error> for SkewError {
    fn from(err: serde_json::Error) -> Self {
        SkewError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for SkewError {
    fn from(err: toml::de::Error) -> Self {
        SkewError::Serialization(err.to_string())
    }
}

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Adds context to an error.
    fn context(self, msg: &str) -> Result<T>;

    /// Adds context with a lazy message.
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<SkewError>,
{
    fn context(self, msg: &str) -> Result<T> {
        self.map_err(|e| wrap(msg, e.into()))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| wrap(&f(), e.into()))
    }
}

// Schema, type and serialization errors keep their variant; everything else
// collapses into Internal.
fn wrap(msg: &str, err: SkewError) -> SkewError {
    match err {
        SkewError::Schema { message } => SkewError::Schema {
            message: format!("{msg}: {message}"),
        },
        SkewError::Serialization(inner) => SkewError::Serialization(format!("{msg}: {inner}")),
        SkewError::Internal(inner) => SkewError::Internal(format!("{msg}: {inner}")),
        other @ SkewError::Type { .. } => other,
        other => SkewError::Internal(format!("{msg}: {other}")),
    }
}
