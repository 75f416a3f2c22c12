//! Profile resolution for the CLI: config file, then flag overrides,
//! translated into a `studente_core::DashboardConfig`.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use studente_config::{Config, ConfigError, Profile};
use studente_core::DashboardConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Everything a tracker-bound command needs.
#[derive(Debug)]
pub struct Resolved {
    pub profile_name: String,
    pub profile: Profile,
    pub dashboard: DashboardConfig,
    /// Budget for connecting and for each awaited reply.
    pub timeout: Duration,
}

impl Resolved {
    /// The profile's password, or `None` when nothing is configured.
    pub fn password(&self) -> Result<Option<SecretString>, CliError> {
        match studente_config::resolve_password(&self.profile, &self.profile_name) {
            Ok(pw) => Ok(Some(pw)),
            Err(ConfigError::NoCredentials { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// `--config` if given, else the platform path.
pub fn config_file(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(studente_config::config_path)
}

pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(studente_config::load_config_from(&config_file(global))?)
}

/// Resolve the active profile and apply `--host` / `--port` / `--region`.
pub fn resolve(global: &GlobalOpts) -> Result<Resolved, CliError> {
    let cfg = load(global)?;
    let (profile_name, mut profile) = cfg
        .profile(global.profile.as_deref())
        .map_err(|e| match e {
            ConfigError::UnknownProfile { name } => CliError::ProfileNotFound {
                name,
                available: available_profiles(&cfg),
            },
            other => other.into(),
        })?;

    if let Some(ref host) = global.host {
        profile.host.clone_from(host);
    }
    if let Some(port) = global.port {
        profile.port = port;
    }
    if let Some(ref region) = global.region {
        profile.region = Some(region.clone());
    }

    let dashboard = studente_config::profile_to_dashboard_config(&profile, &cfg.defaults)?;
    let timeout = Duration::from_secs(global.timeout.unwrap_or(cfg.defaults.timeout).max(1));

    tracing::debug!(
        profile = %profile_name,
        host = %profile.host,
        port = profile.port,
        "resolved profile"
    );

    Ok(Resolved {
        profile_name,
        profile,
        dashboard,
        timeout,
    })
}

/// Comma-separated profile names for help text.
pub fn available_profiles(cfg: &Config) -> String {
    let mut names: Vec<_> = cfg.profiles.keys().cloned().collect();
    if names.is_empty() {
        return "(none)".into();
    }
    names.sort();
    names.join(", ")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Write;

    use clap::Parser;

    use super::*;
    use crate::cli::Cli;

    fn global(args: &[&str]) -> GlobalOpts {
        let mut argv = vec!["studente"];
        argv.extend_from_slice(args);
        argv.push("ping");
        Cli::try_parse_from(argv).unwrap().global
    }

    fn config_file_with(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    #[test]
    fn flags_override_profile_values() {
        let file = config_file_with(
            r#"
            default_profile = "lab"

            [profiles.lab]
            host = "tracker.lab"
            port = 30000
            region = "eu-west-1"
            "#,
        );
        let path = file.path().to_str().unwrap();

        let resolved = resolve(&global(&["--config", path])).unwrap();
        assert_eq!(resolved.profile_name, "lab");
        assert_eq!(resolved.dashboard.connection.host, "tracker.lab");
        assert_eq!(resolved.dashboard.region, "eu-west-1");

        let resolved = resolve(&global(&[
            "--config", path, "--host", "127.0.0.1", "--port", "4000", "--region", "us-east-1",
            "--timeout", "3",
        ]))
        .unwrap();
        assert_eq!(resolved.dashboard.connection.host, "127.0.0.1");
        assert_eq!(resolved.dashboard.connection.port, 4000);
        assert_eq!(resolved.dashboard.region, "us-east-1");
        assert_eq!(resolved.timeout, Duration::from_secs(3));
    }

    #[test]
    fn unknown_profile_lists_available_ones() {
        let file = config_file_with("[profiles.home]\nhost = \"h\"\n[profiles.lab]\nhost = \"l\"\n");
        let path = file.path().to_str().unwrap();

        let err = resolve(&global(&["--config", path, "--profile", "work"])).unwrap_err();
        match err {
            CliError::ProfileNotFound { name, available } => {
                assert_eq!(name, "work");
                assert_eq!(available, "home, lab");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn zero_port_is_a_usage_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");
        let err = resolve(&global(&["--config", path.to_str().unwrap(), "--port", "0"]))
            .unwrap_err();
        assert!(matches!(err, CliError::Validation { ref field, .. } if field == "port"));
    }
}
