//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and a stable exit code.

use miette::Diagnostic;
use thiserror::Error;

use studente_config::ConfigError;
use studente_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to tracker at {url}")]
    #[diagnostic(
        code(studente::connection_failed),
        help(
            "Check that the activity tracker is running and listening.\n\
             URL: {url}\n\
             Override the target with --host / --port."
        )
    )]
    ConnectionFailed {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Connection to the tracker was lost")]
    #[diagnostic(
        code(studente::disconnected),
        help("Run the command again once the tracker is reachable.")
    )]
    Disconnected,

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(studente::auth_failed),
        help(
            "Check the password for profile '{profile}'.\n\
             Run: studente login --save --profile {profile}"
        )
    )]
    AuthFailed { profile: String, message: String },

    #[error("No password configured for profile '{profile}'")]
    #[diagnostic(
        code(studente::no_credentials),
        help(
            "Configure one with: studente config init\n\
             Or set the STUDENTE_PASSWORD environment variable."
        )
    )]
    NoCredentials { profile: String },

    #[error("The tracker has no password yet")]
    #[diagnostic(
        code(studente::initial_setup),
        help("Set one with: studente login --create")
    )]
    InitialSetupRequired,

    // ── Actions ──────────────────────────────────────────────────────
    #[error("Another instance action is still in progress")]
    #[diagnostic(
        code(studente::action_in_flight),
        help("Wait for the tracker to report the previous action, then retry.")
    )]
    ActionInFlight,

    #[error("Tracker reported an {service} error: {message}")]
    #[diagnostic(code(studente::tracker_error))]
    TrackerError { service: String, message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(studente::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(studente::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: studente config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error(transparent)]
    #[diagnostic(code(studente::config))]
    Config(ConfigError),

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("No answer from the tracker after {seconds}s")]
    #[diagnostic(
        code(studente::timeout),
        help("Increase the wait with --timeout or check the tracker's logs.")
    )]
    Timeout { seconds: u64 },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    #[diagnostic(code(studente::json))]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    #[diagnostic(code(studente::internal))]
    Internal(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::Disconnected => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } | Self::InitialSetupRequired => {
                exit_code::AUTH
            }
            Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::ActionInFlight => exit_code::CONFLICT,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } => exit_code::USAGE,
            Self::Config(err) => match err {
                ConfigError::NoCredentials { .. } => exit_code::AUTH,
                ConfigError::UnknownProfile { .. } => exit_code::NOT_FOUND,
                ConfigError::Validation { .. } => exit_code::USAGE,
                _ => exit_code::GENERAL,
            },
            _ => exit_code::GENERAL,
        }
    }
}

/// Map a dialoguer / interactive I/O failure into CliError.
pub fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed {
                url,
                source: reason.into(),
            },

            CoreError::NotConnected => CliError::Disconnected,

            CoreError::Timeout { timeout_ms } => CliError::Timeout {
                seconds: timeout_ms.div_ceil(1000),
            },

            CoreError::ActionInFlight => CliError::ActionInFlight,

            CoreError::ValidationFailed { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },

            CoreError::AuthenticationFailed { message } => CliError::AuthFailed {
                profile: "current".into(),
                message,
            },

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },

            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            other => CliError::Config(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_keep_their_exit_codes() {
        let refused: CliError = CoreError::ConnectionFailed {
            url: "ws://localhost:1/".into(),
            reason: "refused".into(),
        }
        .into();
        assert_eq!(refused.exit_code(), exit_code::CONNECTION);
        assert_eq!(
            CliError::from(CoreError::ActionInFlight).exit_code(),
            exit_code::CONFLICT
        );
        assert_eq!(
            CliError::from(CoreError::Timeout { timeout_ms: 1500 }).exit_code(),
            exit_code::TIMEOUT
        );
        assert!(matches!(
            CliError::from(CoreError::Timeout { timeout_ms: 1500 }),
            CliError::Timeout { seconds: 2 }
        ));
    }

    #[test]
    fn config_errors_map_to_usage_and_auth() {
        let missing: CliError = ConfigError::NoCredentials {
            profile: "lab".into(),
        }
        .into();
        assert_eq!(missing.exit_code(), exit_code::AUTH);

        let unknown: CliError = ConfigError::UnknownProfile { name: "x".into() }.into();
        assert_eq!(unknown.exit_code(), exit_code::NOT_FOUND);

        let bad_port: CliError = ConfigError::Validation {
            field: "port".into(),
            reason: "must be between 1 and 65535".into(),
        }
        .into();
        assert_eq!(bad_port.exit_code(), exit_code::USAGE);
    }
}
