/*
[INPUT]:  Error sources (HTTP, API status, serialization, signing)
[OUTPUT]: Structured error types recorded by the retry loop
[POS]:    Error handling layer - unified error types for entire crate
[UPDATE]: When adding new error sources or improving error messages
*/

use reqwest::StatusCode;
use thiserror::Error;

/// Main error type for exchange access
#[derive(Error, Debug)]
pub enum ExchangeError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned a non-2xx response
    #[error("API error (code {code}): {message}")]
    Api { code: u16, message: String },

    /// Key or signature rejected by the exchange
    #[error("Authentication failed (code {code}): {message}")]
    Authentication { code: u16, message: String },

    /// Rate limit exceeded
    #[error("Rate limit exceeded: {message}")]
    RateLimit { message: String },

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Request signature could not be produced
    #[error("Signature error: {0}")]
    Signature(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ExchangeError {
    /// Classify a non-2xx response
    pub fn from_status(status: StatusCode, body: impl Into<String>) -> Self {
        let message = body.into();
        let code = status.as_u16();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                ExchangeError::Authentication { code, message }
            }
            StatusCode::TOO_MANY_REQUESTS => ExchangeError::RateLimit { message },
            _ => ExchangeError::Api { code, message },
        }
    }

    /// Check if error indicates rejected credentials
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            ExchangeError::Authentication { .. } | ExchangeError::Signature(_)
        )
    }
}

/// Result type alias for exchange operations
pub type Result<T> = std::result::Result<T, ExchangeError>;
