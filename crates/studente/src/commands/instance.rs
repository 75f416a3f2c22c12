//! `studente instance start|stop`: guarded EC2 lifecycle requests.

use studente_core::{Dashboard, InstanceAction, RequestOptions};

use crate::cli::{GlobalOpts, InstanceArgs, InstanceCommand};
use crate::config::Resolved;
use crate::error::CliError;
use crate::output;

use super::status::InstanceRow;
use super::util;

pub async fn handle(
    dashboard: &Dashboard,
    resolved: &Resolved,
    args: InstanceArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let (action, id) = match args.command {
        InstanceCommand::Start { id } => (InstanceAction::Start, id),
        InstanceCommand::Stop { id } => (InstanceAction::Stop, id),
    };

    util::connect(dashboard, resolved.timeout).await?;
    util::login_if_configured(dashboard, resolved).await?;

    let store = dashboard.store();
    let mut in_flight = store.subscribe_action_in_flight();
    let mut errors = store.subscribe_last_error();
    errors.borrow_and_update();

    let options = RequestOptions::region(resolved.dashboard.region.clone());
    dashboard.aws().instance_action(action, &id, &options)?;
    if !global.quiet {
        eprintln!("→ {action} requested for {id}");
    }

    util::wait_for(&mut in_flight, resolved.timeout, |busy| !busy).await?;
    if !dashboard.is_connected() {
        return Err(CliError::Disconnected);
    }

    if errors.has_changed().unwrap_or(false) {
        if let Some(err) = store.last_error() {
            return Err(CliError::TrackerError {
                service: err.service.to_string(),
                message: err.message.clone(),
            });
        }
    }

    match store.instance(&id) {
        Some(instance) => {
            let color = output::should_color(global.color);
            let out = output::render_single(
                global.output,
                instance.as_ref(),
                |i| output::render_table(&[InstanceRow::new(i, color)]),
                |i| i.state.to_string(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }
        None if !global.quiet => {
            eprintln!("✓ {action} processed for {id}");
            Ok(())
        }
        None => Ok(()),
    }
}
