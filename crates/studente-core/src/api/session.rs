// ── Session / password requests ──

use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};

use super::RequestOptions;
use crate::dashboard::Dashboard;
use crate::error::CoreError;

/// Shortest password `create_password` accepts.
pub const MIN_PASSWORD_LEN: usize = 6;

mod kind {
    pub const PASSWORD_STATUS_CHECK: &str = "PASSWORD_STATUS_CHECK";
    pub const VERIFY_PASSWORD: &str = "VERIFY_PASSWORD";
    pub const CREATE_PASSWORD: &str = "CREATE_PASSWORD";
    pub const VERIFY_AUTH_KEY: &str = "VERIFY_AUTH_KEY";
    pub const LOGOUT: &str = "LOGOUT";
}

pub struct SessionApi<'a> {
    dashboard: &'a Dashboard,
}

impl<'a> SessionApi<'a> {
    pub(crate) fn new(dashboard: &'a Dashboard) -> Self {
        Self { dashboard }
    }

    /// Ask whether the tracker still needs an initial password.
    pub fn check_password_status(&self) -> bool {
        if !self.dashboard.is_connected() {
            warn!("Password status check not sent: not connected");
            return false;
        }
        self.send_typed(kind::PASSWORD_STATUS_CHECK, Map::new())
    }

    /// Re-validate the cached session key. `false` when there is none or
    /// the link is down.
    pub fn verify_auth_key(&self) -> bool {
        if !self.dashboard.is_connected() {
            warn!("Auth key check not sent: not connected");
            return false;
        }
        let Some(key) = self.dashboard.store().auth_key() else {
            debug!("No cached auth key to verify");
            return false;
        };
        let mut content = Map::new();
        content.insert("authKey".into(), json!(key.expose_secret()));
        self.send_typed(kind::VERIFY_AUTH_KEY, content)
    }

    /// Send a password check. Returns `false` when not connected.
    pub fn password_verify(&self, password: &str, options: &RequestOptions) -> bool {
        if !self.dashboard.is_connected() {
            warn!("Password check not sent: not connected");
            return false;
        }
        let mut content = Map::new();
        content.insert("password".into(), json!(password));
        options.merge_into(&mut content);
        self.send_typed(kind::VERIFY_PASSWORD, content)
    }

    /// Log in. The outcome arrives as a `PASSWORD_VERIFY_RESPONSE` and
    /// lands in the store's auth state.
    ///
    /// When the link is down a connect is started and the call fails.
    pub fn verify_password(&self, password: &SecretString) -> Result<(), CoreError> {
        let password = password.expose_secret();
        if password.is_empty() {
            return self.reject("Please enter a password");
        }
        if !self.dashboard.is_connected() {
            info!("Not connected; connecting before login");
            self.dashboard.connect();
            return Err(CoreError::NotConnected);
        }
        if self.password_verify(password, &RequestOptions::default()) {
            Ok(())
        } else {
            Err(CoreError::NotConnected)
        }
    }

    /// Set the initial password.
    pub fn create_password(
        &self,
        password: &SecretString,
        confirm: &SecretString,
    ) -> Result<(), CoreError> {
        let password = password.expose_secret();
        if password.is_empty() {
            return self.reject("Please enter a password");
        }
        if password != confirm.expose_secret() {
            return self.reject("Passwords do not match");
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return self.reject(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters"
            ));
        }
        if !self.dashboard.is_connected() {
            return Err(CoreError::NotConnected);
        }

        let mut content = Map::new();
        content.insert("password".into(), json!(password));
        if self.send_typed(kind::CREATE_PASSWORD, content) {
            Ok(())
        } else {
            Err(CoreError::NotConnected)
        }
    }

    /// Forget the session locally and tell the tracker if it is reachable.
    pub fn logout(&self) {
        self.dashboard.store().clear_session();
        if self.dashboard.is_connected() {
            self.send_typed(kind::LOGOUT, Map::new());
        }
        info!("Logged out");
    }

    fn send_typed(&self, msg_type: &str, content: Map<String, Value>) -> bool {
        self.dashboard.send(&json!({
            "type": msg_type,
            "content": Value::Object(content),
        }))
    }

    fn reject(&self, message: impl Into<String>) -> Result<(), CoreError> {
        let message = message.into();
        self.dashboard.store().set_auth_error(message.clone());
        Err(CoreError::validation(message))
    }
}
