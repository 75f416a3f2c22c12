use thiserror::Error;

/// Top-level error type for the `studente-api` crate.
///
/// Covers every failure mode of the tracker link: transport setup,
/// handshake, framing, and serialization. `studente-core` maps these
/// into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// WebSocket connection failed (refused, DNS, protocol error, ...).
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// WebSocket closed by the peer.
    #[error("WebSocket closed (code {code}): {reason}")]
    WebSocketClosed { code: u16, reason: String },

    /// The opening handshake did not complete in time.
    #[error("WebSocket handshake timed out after {timeout_ms}ms")]
    HandshakeTimeout { timeout_ms: u64 },

    /// The link's writer has gone away; the frame was not transmitted.
    #[error("WebSocket link is closed")]
    LinkClosed,

    /// No open connection to send on.
    #[error("Not connected to the tracker")]
    NotConnected,

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON encoding/decoding failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::WebSocketConnect(_)
                | Self::WebSocketClosed { .. }
                | Self::HandshakeTimeout { .. }
                | Self::LinkClosed
                | Self::NotConnected
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_failures_are_transient() {
        assert!(Error::WebSocketConnect("refused".into()).is_transient());
        assert!(Error::HandshakeTimeout { timeout_ms: 5000 }.is_transient());
        assert!(
            Error::WebSocketClosed {
                code: 1011,
                reason: "boom".into()
            }
            .is_transient()
        );
    }

    #[test]
    fn data_errors_are_not_transient() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(!Error::Serialization(err).is_transient());
        let err = url::Url::parse("not a url").unwrap_err();
        assert!(!Error::InvalidUrl(err).is_transient());
    }
}
