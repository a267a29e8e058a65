//! Error taxonomy for the prediction and classification engine.

use thiserror::Error;

/// Errors raised by the engine. None of them are recovered internally: a
/// failing call leaves the caller's inputs untouched and yields no partial
/// output.
#[derive(Debug, Error)]
pub enum SliperError {
    /// Method selection or threshold table is malformed.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// A required model or configuration attribute is absent.
    #[error("Missing attribute: \"{name}\"")]
    MissingAttribute { name: String },

    /// A sliced scale element is exactly zero.
    #[error("Division by zero: scale element at column {column} is 0")]
    Division { column: usize },

    /// Matrix or vector dimensions disagree.
    #[error("Shape mismatch in {context}: expected {expected}, actual {actual}")]
    ShapeMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    /// No threshold table is configured for the domain.
    #[error("Unknown domain: \"{0}\"")]
    UnknownDomain(String),

    /// A matched band has no style entry.
    #[error("Style not found for band \"{0}\"")]
    StyleNotFound(String),

    /// Internal contract violation (missing carrier object and similar).
    #[error("State error: {message}")]
    State { message: String },

    /// A block size or frequency string is not `<int><unit>` with unit h or d.
    #[error("Invalid time window \"{input}\": {reason}")]
    InvalidTimeWindow { input: String, reason: &'static str },

    /// Training artifacts are inconsistent with each other.
    #[error("Invalid model: {message}")]
    InvalidModel { message: String },

    /// Configuration document could not be parsed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SliperError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn missing_attribute(name: impl Into<String>) -> Self {
        Self::MissingAttribute { name: name.into() }
    }

    pub fn shape_mismatch(context: &'static str, expected: usize, actual: usize) -> Self {
        Self::ShapeMismatch {
            context,
            expected,
            actual,
        }
    }

    pub fn state(message: impl Into<String>) -> Self {
        Self::State {
            message: message.into(),
        }
    }

    pub fn invalid_model(message: impl Into<String>) -> Self {
        Self::InvalidModel {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SliperError>;
