//! Error types for the lexiclass library.
//!
//! All fallible operations return [`Result`], whose error side is the
//! [`LexiclassError`] enum. The variants follow the failure taxonomy used
//! across training and serving: configuration problems are fatal at setup,
//! data problems are reported and skipped, model problems abort a training
//! run, and serving problems are caught per request.
//!
//! # Examples
//!
//! ```
//! use lexiclass::error::{LexiclassError, Result};
//!
//! fn lookup(id: &str) -> Result<()> {
//!     Err(LexiclassError::model_not_found(id))
//! }
//!
//! let err = lookup("news").unwrap_err();
//! assert_eq!(err.kind(), "ModelNotFound");
//! ```

use std::io;
use std::sync::Arc;

use thiserror::Error;

/// The main error type for lexiclass operations.
#[derive(Error, Debug)]
pub enum LexiclassError {
    /// I/O errors (file operations, sockets, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid or missing configuration, unknown registry identifiers.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A raw or vectorized record could not be read or decoded.
    #[error("Data error: {0}")]
    Data(String),

    /// The trainable model failed to build, train, save or load.
    #[error("Model error: {0}")]
    Model(String),

    /// No model is registered under the requested identifier.
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// A loaded model failed while producing a prediction.
    #[error("Prediction error: {0}")]
    Prediction(String),

    /// Transport adapter failures (binding, framing, shutdown).
    #[error("Transport error: {0}")]
    Transport(String),

    /// Storage-related errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Binary encoding errors
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid split or exclusion pattern.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// Generic error for other cases
    #[error("Error: {0}")]
    Other(String),
}

/// Result type alias for operations that may fail with LexiclassError.
pub type Result<T> = std::result::Result<T, LexiclassError>;

/// Process-wide callback for errors that are reported rather than propagated.
pub type ErrorHandler = Arc<dyn Fn(&LexiclassError) + Send + Sync>;

/// An [`ErrorHandler`] that writes every reported error to the log.
pub fn logging_error_handler() -> ErrorHandler {
    Arc::new(|err: &LexiclassError| log::error!("{err}"))
}

impl LexiclassError {
    /// Create a new configuration error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        LexiclassError::Config(msg.into())
    }

    /// Create a new data error.
    pub fn data<S: Into<String>>(msg: S) -> Self {
        LexiclassError::Data(msg.into())
    }

    /// Create a new model error.
    pub fn model<S: Into<String>>(msg: S) -> Self {
        LexiclassError::Model(msg.into())
    }

    /// Create a new model-not-found error.
    pub fn model_not_found<S: Into<String>>(id: S) -> Self {
        LexiclassError::ModelNotFound(id.into())
    }

    /// Create a new prediction error.
    pub fn prediction<S: Into<String>>(msg: S) -> Self {
        LexiclassError::Prediction(msg.into())
    }

    /// Create a new transport error.
    pub fn transport<S: Into<String>>(msg: S) -> Self {
        LexiclassError::Transport(msg.into())
    }

    /// Create a new storage error.
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        LexiclassError::Storage(msg.into())
    }

    /// Create a new serialization error.
    pub fn serialization<S: Into<String>>(msg: S) -> Self {
        LexiclassError::SerializationError(msg.into())
    }

    /// Create a new generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        LexiclassError::Other(msg.into())
    }

    /// Short name of the error kind, used in the serving envelope.
    pub fn kind(&self) -> &'static str {
        match self {
            LexiclassError::Io(_) => "IoError",
            LexiclassError::Config(_) => "ConfigError",
            LexiclassError::Data(_) => "DataError",
            LexiclassError::Model(_) => "ModelError",
            LexiclassError::ModelNotFound(_) => "ModelNotFound",
            LexiclassError::Prediction(_) => "PredictionError",
            LexiclassError::Transport(_) => "TransportError",
            LexiclassError::Storage(_) => "StorageError",
            LexiclassError::SerializationError(_) => "SerializationError",
            LexiclassError::Json(_) => "JsonError",
            LexiclassError::Regex(_) => "RegexError",
            LexiclassError::Other(_) => "Error",
        }
    }

    /// The `<Kind>: <message>` string reported to remote callers.
    pub fn envelope_message(&self) -> String {
        let detail = match self {
            LexiclassError::Io(e) => e.to_string(),
            LexiclassError::Json(e) => e.to_string(),
            LexiclassError::Regex(e) => e.to_string(),
            LexiclassError::Config(m)
            | LexiclassError::Data(m)
            | LexiclassError::Model(m)
            | LexiclassError::ModelNotFound(m)
            | LexiclassError::Prediction(m)
            | LexiclassError::Transport(m)
            | LexiclassError::Storage(m)
            | LexiclassError::SerializationError(m)
            | LexiclassError::Other(m) => m.clone(),
        };
        format!("{}: {detail}", self.kind())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_construction() {
        let error = LexiclassError::config("Test config error");
        assert_eq!(error.to_string(), "Configuration error: Test config error");

        let error = LexiclassError::model_not_found("news");
        assert_eq!(error.to_string(), "Model not found: news");

        let error = LexiclassError::data("bad slot");
        assert_eq!(error.to_string(), "Data error: bad slot");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let error = LexiclassError::from(io_error);

        match error {
            LexiclassError::Io(_) => {} // Expected
            _ => panic!("Expected IO error variant"),
        }
    }

    #[test]
    fn test_envelope_message() {
        let error = LexiclassError::model_not_found("missing-model");
        assert_eq!(error.envelope_message(), "ModelNotFound: missing-model");

        let error = LexiclassError::prediction("non-finite output");
        assert_eq!(error.envelope_message(), "PredictionError: non-finite output");
    }
}
