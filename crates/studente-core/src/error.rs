// ── Core error types ──
//
// User-facing errors from studente-core. Consumers never see raw
// transport errors; the `From<studente_api::Error>` impl translates them
// into domain variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to tracker at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Not connected to the tracker")]
    NotConnected,

    #[error("Tracker connection timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Another instance action is still in progress")]
    ActionInFlight,

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            message: message.into(),
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<studente_api::Error> for CoreError {
    fn from(err: studente_api::Error) -> Self {
        use studente_api::Error as Api;

        match err {
            Api::WebSocketConnect(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("WebSocket connection failed: {reason}"),
            },
            Api::WebSocketClosed { code, reason } => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("WebSocket closed (code {code}): {reason}"),
            },
            Api::HandshakeTimeout { timeout_ms } => CoreError::Timeout { timeout_ms },
            Api::LinkClosed | Api::NotConnected => CoreError::NotConnected,
            Api::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            Api::Serialization(e) => CoreError::Internal(format!("Serialization error: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_map_to_domain_variants() {
        assert!(matches!(
            CoreError::from(studente_api::Error::HandshakeTimeout { timeout_ms: 5000 }),
            CoreError::Timeout { timeout_ms: 5000 }
        ));
        assert!(matches!(
            CoreError::from(studente_api::Error::LinkClosed),
            CoreError::NotConnected
        ));
        let bad_url = url_error();
        assert!(matches!(CoreError::from(bad_url), CoreError::Config { .. }));
    }

    fn url_error() -> studente_api::Error {
        let config = studente_api::ConnectionConfig {
            host: "bad host".into(),
            ..Default::default()
        };
        match config.url() {
            Err(e) => e,
            Ok(url) => panic!("expected invalid url, got {url}"),
        }
    }
}
