//! Command dispatch: resolves the profile, builds a dashboard, hands off.

pub mod config_cmd;
pub mod instance;
pub mod login;
pub mod ping;
pub mod refresh;
pub mod status;
pub mod util;
pub mod watch;

use studente_core::Dashboard;

use crate::cli::{Command, GlobalOpts};
use crate::config;
use crate::error::CliError;

/// Dispatch a tracker-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    let resolved = config::resolve(global)?;
    let dashboard = Dashboard::new(resolved.dashboard.clone())?;

    tracing::debug!(command = ?cmd, url = %dashboard.connection().url(), "dispatching command");

    let result = match cmd {
        Command::Watch(args) => watch::handle(&dashboard, &resolved, args, global).await,
        Command::Refresh(args) => refresh::handle(&dashboard, &resolved, args, global).await,
        Command::Ping => ping::handle(&dashboard, &resolved, global).await,
        Command::Login(args) => login::handle(&dashboard, &resolved, args, global).await,
        Command::Status(args) => status::handle(&dashboard, &resolved, args, global).await,
        Command::Instance(args) => instance::handle(&dashboard, &resolved, args, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => unreachable!(),
    };

    util::finish(&dashboard).await;
    result
}
