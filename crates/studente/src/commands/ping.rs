//! `studente ping`: connect and send a test probe.

use std::time::Instant;

use serde::Serialize;

use studente_core::Dashboard;

use crate::cli::GlobalOpts;
use crate::config::Resolved;
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PingReport {
    url: String,
    connect_ms: u128,
    test_sent: bool,
}

pub async fn handle(
    dashboard: &Dashboard,
    resolved: &Resolved,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let started = Instant::now();
    util::connect(dashboard, resolved.timeout).await?;
    let connect_ms = started.elapsed().as_millis();

    let test_sent = dashboard.activity().send_test();
    if !test_sent {
        return Err(CliError::Disconnected);
    }

    let report = PingReport {
        url: dashboard.connection().url().to_string(),
        connect_ms,
        test_sent,
    };
    let out = output::render_single(
        global.output,
        &report,
        |r| format!("Connected to {} in {} ms; test message sent", r.url, r.connect_ms),
        |r| r.connect_ms.to_string(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
