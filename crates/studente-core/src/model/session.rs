// ── Dashboard session / authentication ──

use secrecy::SecretString;
use serde::Deserialize;

/// What the dashboard knows about its login session with the tracker.
#[derive(Debug, Clone, Default)]
pub struct AuthState {
    /// The tracker has no password yet and expects `CREATE_PASSWORD`.
    pub initial_setup: bool,
    pub authenticated: bool,
    /// Session key issued by the tracker on a successful login.
    pub auth_key: Option<SecretString>,
    /// Last user-facing error from an auth response.
    pub error: Option<String>,
}

/// `content` of a `PASSWORD_*_RESPONSE` / `VERIFY_AUTH_KEY_RESPONSE`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthResponse {
    pub success: bool,
    pub auth_key: Option<String>,
    pub error: Option<String>,
}

impl AuthResponse {
    /// Cached key from a successful response; empty keys count as absent.
    pub fn key(&self) -> Option<SecretString> {
        self.auth_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .map(|k| SecretString::from(k.to_owned()))
    }
}
