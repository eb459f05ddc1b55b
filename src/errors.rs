//! Error types for quakesense.
//!
//! Uses `thiserror` for library-style error definitions.

use thiserror::Error;

/// Errors that can occur in quakesense operations.
#[derive(Error, Debug)]
pub enum QuakeError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed
    #[error("Failed to parse JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// Backend returned an error status
    #[error("Backend API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// WebSocket transport failed
    #[error("WebSocket transport failed: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Configuration rejected at startup
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Event validation failed
    #[error("Invalid event data: {0}")]
    Validation(String),

    /// I/O failure on a local stream or device surface
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
