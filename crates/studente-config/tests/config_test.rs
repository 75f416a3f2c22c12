// Loading and saving profiles through real files.

use std::time::Duration;

use pretty_assertions::assert_eq;
use studente_config::{
    Config, Profile, load_config_from, profile_to_dashboard_config, save_config_to,
};

const SAMPLE: &str = r#"
default_profile = "lab"

[defaults]
timeout = 4
heartbeat_secs = 15

[profiles.lab]
host = "192.168.0.20"
port = 20202
region = "eu-west-1"
max_attempts = 2

[profiles.local]
"#;

#[test]
fn loads_profiles_and_defaults_from_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, SAMPLE).unwrap();

    let cfg = load_config_from(&path).unwrap();
    assert_eq!(cfg.defaults.timeout, 4);
    assert_eq!(cfg.defaults.output, "table");

    let (name, lab) = cfg.profile(None).unwrap();
    assert_eq!(name, "lab");
    assert_eq!(lab.port, 20202);

    let (_, local) = cfg.profile(Some("local")).unwrap();
    assert_eq!(local, Profile::default());

    let dash = profile_to_dashboard_config(&lab, &cfg.defaults).unwrap();
    assert_eq!(dash.connection.host, "192.168.0.20");
    assert_eq!(dash.connection.heartbeat_interval, Some(Duration::from_secs(15)));
    assert_eq!(dash.connection.reconnect.max_attempts, Some(2));
    assert_eq!(dash.region, "eu-west-1");
}

#[test]
fn missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(cfg.default_profile.as_deref(), Some("default"));
    assert!(cfg.profiles.is_empty());
}

#[test]
fn saved_config_loads_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    let mut cfg = Config::default();
    cfg.profiles.insert(
        "default".into(),
        Profile {
            host: "tracker.local".into(),
            region: Some("ap-northeast-2".into()),
            ..Profile::default()
        },
    );
    save_config_to(&cfg, &path).unwrap();

    let loaded = load_config_from(&path).unwrap();
    assert_eq!(loaded.profiles, cfg.profiles);
}

#[test]
fn malformed_toml_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[profiles.lab]\nport = \"not a number\"\n").unwrap();
    assert!(load_config_from(&path).is_err());
}
