//! `studente login`: verify (or create) the tracker password.

use secrecy::{ExposeSecret, SecretString};

use studente_core::Dashboard;

use crate::cli::{GlobalOpts, LoginArgs};
use crate::config::Resolved;
use crate::error::{CliError, prompt_err};

use super::util;

pub async fn handle(
    dashboard: &Dashboard,
    resolved: &Resolved,
    args: LoginArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    util::connect(dashboard, resolved.timeout).await?;

    let password = if args.create {
        create(dashboard, resolved).await?
    } else {
        let password = match resolved.password()? {
            Some(pw) => pw,
            None => prompt("Tracker password: ")?,
        };
        util::login(dashboard, &resolved.profile_name, &password, resolved.timeout).await?;
        password
    };

    if args.save {
        studente_config::store_password(&resolved.profile_name, password.expose_secret())?;
        if !global.quiet {
            eprintln!(
                "✓ Password stored in system keyring for profile '{}'",
                resolved.profile_name
            );
        }
    }

    if !global.quiet {
        eprintln!("✓ Logged in to {}", dashboard.connection().url());
    }
    Ok(())
}

/// First-run flow: prompt twice, send `CREATE_PASSWORD`, wait for the reply.
async fn create(dashboard: &Dashboard, resolved: &Resolved) -> Result<SecretString, CliError> {
    let password = prompt("New tracker password: ")?;
    let confirm = prompt("Confirm password: ")?;

    let mut auth = dashboard.store().subscribe_auth();
    auth.borrow_and_update();
    dashboard.session().create_password(&password, &confirm)?;

    let state = util::wait_for(&mut auth, resolved.timeout, |a| {
        a.authenticated || a.error.is_some()
    })
    .await?;
    match state.error {
        Some(message) if !state.authenticated => Err(CliError::AuthFailed {
            profile: resolved.profile_name.clone(),
            message,
        }),
        _ => Ok(password),
    }
}

fn prompt(label: &str) -> Result<SecretString, CliError> {
    rpassword::prompt_password(label)
        .map(SecretString::from)
        .map_err(prompt_err)
}
