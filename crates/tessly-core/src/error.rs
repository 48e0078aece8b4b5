// ── Core error types ──
//
// Engine-level errors. Consumers never see HTTP status codes or JSON
// parse failures directly: the `From<tessly_api::Error>` impl translates
// transport-layer errors into domain-appropriate variants.

use thiserror::Error;

use crate::model::DataType;
use crate::store::ObjectId;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot reach Tessie at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Unknown action: {ident}")]
    UnknownAction { ident: String },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Store errors ─────────────────────────────────────────────────
    #[error(transparent)]
    Store(#[from] StoreError),

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failures reported by an object store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Object {id} does not exist")]
    NotFound { id: ObjectId },

    #[error("Parent {parent} does not exist")]
    ParentNotFound { parent: ObjectId },

    #[error("Invalid identifier: {identifier:?}")]
    InvalidIdentifier { identifier: String },

    #[error("Identifier {identifier} already names a {existing}")]
    KindConflict {
        identifier: String,
        existing: &'static str,
    },

    #[error("Object {id} is not a {expected}")]
    WrongKind { id: ObjectId, expected: &'static str },

    #[error("Point {id} stores {stored}, refused a {offered} value")]
    TypeMismatch {
        id: ObjectId,
        stored: DataType,
        offered: DataType,
    },

    #[error("Store rejected the operation: {0}")]
    Rejected(String),
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<tessly_api::Error> for CoreError {
    fn from(err: tessly_api::Error) -> Self {
        match err {
            tessly_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            tessly_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: 0 }
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            tessly_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            tessly_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            tessly_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            tessly_api::Error::Api { status, message } => CoreError::Api {
                message,
                status: Some(status),
            },
            tessly_api::Error::WebSocketConnect(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("Stream connection failed: {reason}"),
            },
            tessly_api::Error::WebSocketClosed { code, reason } => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("Stream closed (code {code}): {reason}"),
            },
            tessly_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_errors_keep_status() {
        let err: CoreError = tessly_api::Error::Api {
            status: 408,
            message: "asleep".into(),
        }
        .into();
        assert!(matches!(err, CoreError::Api { status: Some(408), .. }));
    }

    #[test]
    fn auth_errors_map_to_authentication_failed() {
        let err: CoreError = tessly_api::Error::Authentication {
            message: "HTTP 401".into(),
        }
        .into();
        assert!(matches!(err, CoreError::AuthenticationFailed { .. }));
    }

    #[test]
    fn store_errors_are_transparent() {
        let err: CoreError = StoreError::Rejected("read-only".into()).into();
        assert_eq!(err.to_string(), "Store rejected the operation: read-only");
    }
}
