//! Error types for the payjs-rs library.
//!
//! Configuration and signature problems are raised as [`PayJsError`]. Responses that
//! reach the client are never raised: they are classified into a
//! [`PayResult`](crate::result::PayResult) instead.

use thiserror::Error;

/// Code carried by [`PayJsError::InvalidSignature`].
pub const INVALID_SIGNATURE_CODE: i32 = -1001;

/// Main error type for PayJS operations.
#[derive(Error, Debug)]
pub enum PayJsError {
    /// Bad merchant id, key, URL, amount or order id. Always fatal to the call.
    #[error("Invalid configuration ({code}): {message}")]
    InvalidConfiguration {
        /// Numeric code identifying the offending input
        code: i32,
        /// Human-readable description
        message: String,
    },

    /// The recomputed signature does not match the supplied one
    #[error("Invalid signature")]
    InvalidSignature,

    /// A required notification field is absent
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// A notification field could not be converted to its expected type
    #[error("Invalid value for field {field}: {value:?}")]
    InvalidField {
        /// Name of the field
        field: String,
        /// Raw value received
        value: String,
    },

    /// Error during HTTP request/response handling
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Error during JSON serialization/deserialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error parsing URL
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl PayJsError {
    /// Shorthand for building an [`PayJsError::InvalidConfiguration`].
    pub fn config(code: i32, message: impl Into<String>) -> Self {
        PayJsError::InvalidConfiguration {
            code,
            message: message.into(),
        }
    }

    /// Numeric error code, for the kinds that carry one.
    pub fn code(&self) -> Option<i32> {
        match self {
            PayJsError::InvalidConfiguration { code, .. } => Some(*code),
            PayJsError::InvalidSignature => Some(INVALID_SIGNATURE_CODE),
            _ => None,
        }
    }
}

/// Result type alias for PayJS operations.
pub type Result<T> = std::result::Result<T, PayJsError>;
