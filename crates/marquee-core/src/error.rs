// ── Core error types ──
//
// User-facing errors from marquee-core. These are NOT API-specific --
// consumers never see HTTP status codes or JSON parse failures directly.
// The `From<marquee_api::Error>` impl translates transport-layer errors
// into domain-appropriate variants.

use thiserror::Error;

use crate::config::ConfigError;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot reach content API: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Request timed out")]
    Timeout,

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    // ── Data errors ──────────────────────────────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    #[error("Invalid content payload: {message}")]
    InvalidContent { message: String },

    #[error("Missing reference: {message}")]
    MissingReference { message: String },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Synchronization error: {message}")]
    Sync { message: String },

    #[error("Engine stopped")]
    Stopped,

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<marquee_api::Error> for CoreError {
    fn from(err: marquee_api::Error) -> Self {
        match err {
            marquee_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            marquee_api::Error::InvalidUrl(e) => CoreError::InvalidContent {
                message: format!("invalid URL: {e}"),
            },
            marquee_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                reason: format!("TLS error: {msg}"),
            },
            marquee_api::Error::Api { message, status } => CoreError::Api {
                message,
                status: Some(status),
            },
            marquee_api::Error::Deserialization { message, body: _ } => {
                CoreError::InvalidContent { message }
            }
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::InvalidContent {
            message: err.to_string(),
        }
    }
}
