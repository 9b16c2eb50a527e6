//! Error handling for the specrec library.
//!
//! This module defines the main error type `Error` used throughout the library,
//! along with a convenient `Result` type alias. It uses `thiserror` for easy
//! error handling and implements conversions from common error types.
//!
//! Not every failure is an error value. An endpoint without usable example data
//! is skipped with a warning, a request that could not be sent is recorded as an
//! error-shaped [`FetchedResponse`](crate::http::FetchedResponse), and a payload
//! that differs from its fixture is reported through
//! [`CompareReport`](crate::workflows::compare::CompareReport).
//!
//! # Examples
//!
//! ```
//! use specrec_core::error::{Error, Result};
//!
//! fn might_fail() -> Result<()> {
//!     Err(Error::config("simultaneous_requests must be positive"))
//! }
//! assert!(might_fail().is_err());
//! ```

use thiserror::Error;

/// Result type for specrec operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for specrec operations
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The document could not be read as an OpenAPI document
    #[error("OpenAPI error: {0}")]
    OpenApi(String),

    /// The validator rejected the document
    #[error("One or more errors exist in the OpenAPI definition: {0}")]
    SpecInvalid(String),

    /// A parameter, request body or security value could not be produced
    #[error("Could not resolve {location}: {message}")]
    ParameterResolution { location: String, message: String },

    /// A security scheme required by an operation has no configured value
    #[error("The security scheme \"{0}\" is missing from the list of securitySchemes")]
    SecurityMissing(String),

    /// A construct the request builder deliberately does not handle
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new OpenAPI error
    pub fn openapi<S: Into<String>>(msg: S) -> Self {
        Self::OpenApi(msg.into())
    }

    /// Create a new validation error
    pub fn spec_invalid<S: Into<String>>(msg: S) -> Self {
        Self::SpecInvalid(msg.into())
    }

    /// Create a new resolution error for the given spec location
    pub fn resolution<L: Into<String>, M: Into<String>>(location: L, message: M) -> Self {
        Self::ParameterResolution {
            location: location.into(),
            message: message.into(),
        }
    }

    /// Create a new unsupported-feature error
    pub fn unsupported<S: Into<String>>(msg: S) -> Self {
        Self::Unsupported(msg.into())
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Self::Config(s.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Self::Config(s)
    }
}
