//! Config subcommand handlers.

use dialoguer::{Confirm, Input, Select};

use studente_config::{Config, Profile};
use studente_core::DEFAULT_REGION;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config;
use crate::error::{CliError, prompt_err};
use crate::output;

const REDACTED: &str = "********";

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init => init(global),

        ConfigCommand::Show => {
            let cfg = redacted(config::load(global)?);
            let out = output::render_single(
                global.output,
                &cfg,
                |c| toml::to_string_pretty(c).unwrap_or_else(|e| format!("# {e}")),
                |c| c.default_profile.clone().unwrap_or_else(|| "default".into()),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            println!("{}", config::config_file(global).display());
            Ok(())
        }
    }
}

// ── Init: interactive wizard ────────────────────────────────────────

fn init(global: &GlobalOpts) -> Result<(), CliError> {
    let config_path = config::config_file(global);
    eprintln!("Studente configuration wizard");
    eprintln!("   Config path: {}\n", config_path.display());

    let mut cfg = config::load(global)?;

    let profile_name: String = Input::new()
        .with_prompt("Profile name")
        .default(global.profile.clone().unwrap_or_else(|| "default".into()))
        .interact_text()
        .map_err(prompt_err)?;
    let base = cfg.profiles.get(&profile_name).cloned().unwrap_or_default();

    let host: String = Input::new()
        .with_prompt("Tracker host")
        .default(base.host.clone())
        .interact_text()
        .map_err(prompt_err)?;

    let port: u16 = Input::new()
        .with_prompt("Tracker port")
        .default(base.port)
        .interact_text()
        .map_err(prompt_err)?;

    let region: String = Input::new()
        .with_prompt("AWS region for instance actions")
        .default(base.region.clone().unwrap_or_else(|| DEFAULT_REGION.into()))
        .interact_text()
        .map_err(prompt_err)?;

    let auto_reconnect = Confirm::new()
        .with_prompt("Reconnect automatically when the link drops?")
        .default(base.auto_reconnect.unwrap_or(true))
        .interact()
        .map_err(prompt_err)?;

    let store_choices = &[
        "Store in system keyring (recommended)",
        "Save to config file (plaintext)",
        "Don't store; prompt or use STUDENTE_PASSWORD",
    ];
    let store_selection = Select::new()
        .with_prompt("Where to keep the tracker password?")
        .items(store_choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    let password = match store_selection {
        0 | 1 => {
            let pw = rpassword::prompt_password("Tracker password: ").map_err(prompt_err)?;
            if pw.is_empty() {
                return Err(CliError::Validation {
                    field: "password".into(),
                    reason: "password cannot be empty".into(),
                });
            }
            if store_selection == 0 {
                studente_config::store_password(&profile_name, &pw)?;
                eprintln!("   ✓ Password stored in system keyring");
                None
            } else {
                Some(pw)
            }
        }
        _ => None,
    };

    let profile = Profile {
        host,
        port,
        region: Some(region),
        auto_reconnect: Some(auto_reconnect),
        password,
        ..base
    };
    cfg.profiles.insert(profile_name.clone(), profile);
    if cfg.default_profile.is_none() || cfg.profiles.len() == 1 {
        cfg.default_profile = Some(profile_name.clone());
    }

    studente_config::save_config_to(&cfg, &config_path)?;

    eprintln!("\n✓ Configuration written to {}", config_path.display());
    eprintln!("  Profile: {profile_name}");
    eprintln!("\n  Test it: studente ping --profile {profile_name}");
    Ok(())
}

/// Copy of `cfg` with plaintext passwords masked.
fn redacted(mut cfg: Config) -> Config {
    for profile in cfg.profiles.values_mut() {
        if profile.password.is_some() {
            profile.password = Some(REDACTED.into());
        }
    }
    cfg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn show_masks_plaintext_passwords() {
        let mut cfg = Config::default();
        cfg.profiles.insert(
            "lab".into(),
            Profile {
                password: Some("hunter22".into()),
                ..Profile::default()
            },
        );
        cfg.profiles.insert("home".into(), Profile::default());

        let cfg = redacted(cfg);
        assert_eq!(cfg.profiles["lab"].password.as_deref(), Some(REDACTED));
        assert_eq!(cfg.profiles["home"].password, None);
    }
}
