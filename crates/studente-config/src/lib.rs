//! Shared configuration for the Studente dashboard tools.
//!
//! TOML profiles, password resolution (env + keyring + plaintext), and
//! translation to `studente_core::DashboardConfig`. The CLI layers its
//! flag overrides on top.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use studente_core::{ConnectionConfig, DEFAULT_REGION, DashboardConfig, ReconnectConfig};

/// Keyring service name under which profile passwords are stored.
pub const KEYRING_SERVICE: &str = "studente";

/// Environment variable consulted first for the dashboard password.
pub const PASSWORD_ENV: &str = "STUDENTE_PASSWORD";

const ENV_PREFIX: &str = "STUDENTE_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{name}' not found in config")]
    UnknownProfile { name: String },

    #[error("no password configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is named on the command line.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named tracker profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Seconds to wait for the link before a one-shot command gives up.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Heartbeat interval in seconds. 0 disables the heartbeat.
    #[serde(default = "default_heartbeat")]
    pub heartbeat_secs: u64,

    /// Retries after a lost link before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
            heartbeat_secs: default_heartbeat(),
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    10
}
fn default_heartbeat() -> u64 {
    30
}
fn default_max_attempts() -> u32 {
    10
}

/// A named tracker profile.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Profile {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// WebSocket path. Default: `/ws`.
    pub path: Option<String>,

    /// AWS region for instance actions.
    pub region: Option<String>,

    /// Override auto-reconnect (default on).
    pub auto_reconnect: Option<bool>,

    /// Override the heartbeat interval.
    pub heartbeat_secs: Option<u64>,

    /// Override the retry budget.
    pub max_attempts: Option<u32>,

    /// Environment variable holding the password, checked before
    /// `STUDENTE_PASSWORD`.
    pub password_env: Option<String>,

    /// Dashboard password (plaintext, prefer keyring).
    pub password: Option<String>,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            path: None,
            region: None,
            auto_reconnect: None,
            heartbeat_secs: None,
            max_attempts: None,
            password_env: None,
            password: None,
        }
    }
}

fn default_host() -> String {
    "localhost".into()
}
fn default_port() -> u16 {
    ConnectionConfig::default().port
}

impl Config {
    /// Look up a profile by name, falling back to `default_profile`.
    ///
    /// The `default` profile resolves to built-in settings when the file
    /// does not define it, so a fresh install works without any config.
    pub fn profile(&self, name: Option<&str>) -> Result<(String, Profile), ConfigError> {
        let name = name
            .map(str::to_owned)
            .or_else(|| self.default_profile.clone())
            .unwrap_or_else(|| "default".into());

        match self.profiles.get(&name) {
            Some(profile) => Ok((name, profile.clone())),
            None if name == "default" => Ok((name, Profile::default())),
            None => Err(ConfigError::UnknownProfile { name }),
        }
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "studente", "studente").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("studente");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load from an explicit file: defaults, then TOML, then `STUDENTE_*`
/// variables (`__` separates nested keys, e.g.
/// `STUDENTE_DEFAULTS__TIMEOUT=5`). A missing file is not an error.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__").ignore(&["password"]));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Password resolution ─────────────────────────────────────────────

/// Resolve the dashboard password.
///
/// Order: the profile's `password_env` variable, `STUDENTE_PASSWORD`,
/// the system keyring, then the plaintext `password` field.
pub fn resolve_password(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    // 1. Environment
    let env_names = profile.password_env.as_deref().into_iter().chain([PASSWORD_ENV]);
    for name in env_names {
        if let Ok(val) = std::env::var(name) {
            if !val.is_empty() {
                return Ok(SecretString::from(val));
            }
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, &keyring_user(profile_name)) {
        if let Ok(pw) = entry.get_password() {
            return Ok(SecretString::from(pw));
        }
    }

    // 3. Plaintext in config
    if let Some(ref pw) = profile.password {
        return Ok(SecretString::from(pw.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Store a profile password in the system keyring.
pub fn store_password(profile_name: &str, password: &str) -> Result<(), ConfigError> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, &keyring_user(profile_name))?;
    entry.set_password(password)?;
    Ok(())
}

fn keyring_user(profile_name: &str) -> String {
    format!("{profile_name}/password")
}

// ── Translation to runtime config ───────────────────────────────────

/// Build a `DashboardConfig` from a profile and the global defaults.
pub fn profile_to_dashboard_config(
    profile: &Profile,
    defaults: &Defaults,
) -> Result<DashboardConfig, ConfigError> {
    if profile.host.trim().is_empty() {
        return Err(ConfigError::Validation {
            field: "host".into(),
            reason: "must not be empty".into(),
        });
    }
    if profile.port == 0 {
        return Err(ConfigError::Validation {
            field: "port".into(),
            reason: "must be between 1 and 65535".into(),
        });
    }

    let base = ConnectionConfig::default();
    let heartbeat_secs = profile.heartbeat_secs.unwrap_or(defaults.heartbeat_secs);
    let connection = ConnectionConfig {
        host: profile.host.clone(),
        port: profile.port,
        path: profile.path.clone().unwrap_or(base.path),
        heartbeat_interval: (heartbeat_secs > 0).then_some(Duration::from_secs(heartbeat_secs)),
        reconnect: ReconnectConfig {
            max_attempts: Some(profile.max_attempts.unwrap_or(defaults.max_attempts)),
            ..ReconnectConfig::default()
        },
        ..base
    };

    connection.url().map_err(|e| ConfigError::Validation {
        field: "host".into(),
        reason: e.to_string(),
    })?;

    Ok(DashboardConfig {
        connection,
        region: profile
            .region
            .clone()
            .unwrap_or_else(|| DEFAULT_REGION.into()),
        auto_reconnect: profile.auto_reconnect.unwrap_or(true),
        ..DashboardConfig::default()
    })
}
