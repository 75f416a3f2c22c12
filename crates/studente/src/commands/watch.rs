//! `studente watch`: stream normalized updates until Ctrl-C.

use std::sync::Arc;

use chrono::Local;
use tokio::sync::broadcast::error::RecvError;

use studente_core::inbound::{AuthEvent, ContentActivity, ServiceUpdate};
use studente_core::{ConnectionState, Dashboard, Direction, InboundMessage, LogEntry};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::config::Resolved;
use crate::error::CliError;
use crate::output;

use super::util;

pub async fn handle(
    dashboard: &Dashboard,
    resolved: &Resolved,
    args: WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let mut printer = Printer {
        color: output::should_color(global.color),
        quiet: global.quiet,
        json: args.raw || matches!(global.output, OutputFormat::Json | OutputFormat::JsonCompact),
        raw: args.raw,
        last_raw: None,
    };
    let mut updates = dashboard.subscribe_updates();
    let mut states = dashboard.subscribe_state();

    util::connect(dashboard, resolved.timeout).await?;
    if args.no_reconnect {
        dashboard.connection().set_auto_reconnect(false);
    }
    if let Err(e) = util::login_if_configured(dashboard, resolved).await {
        tracing::warn!(error = %e, "login failed, watching unauthenticated");
    }

    if !global.quiet {
        eprintln!("Watching {} (Ctrl-C to stop)", dashboard.connection().url());
    }

    loop {
        tokio::select! {
            biased;

            _ = tokio::signal::ctrl_c() => break,

            state = states.recv() => match state {
                Ok(state) => {
                    printer.state(state);
                    if args.no_reconnect && state == ConnectionState::Disconnected {
                        return Err(CliError::Disconnected);
                    }
                }
                Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => return Err(CliError::Disconnected),
            },

            update = updates.recv() => match update {
                Ok(msg) => printer.update(dashboard, &msg)?,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "output fell behind, updates dropped");
                }
                Err(RecvError::Closed) => return Err(CliError::Disconnected),
            },
        }
    }

    Ok(())
}

struct Printer {
    color: bool,
    quiet: bool,
    json: bool,
    raw: bool,
    /// Newest log entry already printed in raw mode.
    last_raw: Option<Arc<LogEntry>>,
}

impl Printer {
    fn state(&self, state: ConnectionState) {
        let label = state_label(state);
        if self.json {
            let line = serde_json::json!({ "connection": label });
            output::print_output(&line.to_string(), self.quiet);
        } else {
            self.line(&format!("connection {label}"));
        }
    }

    fn update(&mut self, dashboard: &Dashboard, msg: &InboundMessage) -> Result<(), CliError> {
        if self.raw {
            self.print_raw(dashboard)
        } else if self.json {
            let line = serde_json::json!({
                "category": msg.category(),
                "summary": describe(msg),
            });
            output::print_output(&serde_json::to_string(&line)?, self.quiet);
            Ok(())
        } else {
            self.line(&format!("{:<15} {}", msg.category(), describe(msg)));
            Ok(())
        }
    }

    /// Print every inbound log entry newer than the last one printed.
    fn print_raw(&mut self, dashboard: &Dashboard) -> Result<(), CliError> {
        let entries = dashboard.store().messages();
        let start = self
            .last_raw
            .as_ref()
            .and_then(|last| entries.iter().rposition(|e| Arc::ptr_eq(e, last)))
            .map_or(0, |i| i + 1);

        for entry in entries.iter().skip(start) {
            if entry.direction == Direction::Inbound {
                output::print_output(&serde_json::to_string(&entry.payload)?, self.quiet);
            }
        }
        if let Some(newest) = entries.last() {
            self.last_raw = Some(Arc::clone(newest));
        }
        Ok(())
    }

    fn line(&self, text: &str) {
        let stamp = output::dim(&Local::now().format("%H:%M:%S").to_string(), self.color);
        output::print_output(&format!("{stamp} {text}"), self.quiet);
    }
}

fn state_label(state: ConnectionState) -> &'static str {
    match state {
        ConnectionState::Disconnected => "disconnected",
        ConnectionState::Connecting => "connecting",
        ConnectionState::Connected => "connected",
    }
}

/// One-line human summary of a normalized message.
pub fn describe(msg: &InboundMessage) -> String {
    match msg {
        InboundMessage::Auth(event) => match event {
            AuthEvent::PasswordStatus { initial_setup } => {
                if *initial_setup {
                    "tracker needs an initial password".into()
                } else {
                    "password is set".into()
                }
            }
            AuthEvent::PasswordVerified(resp) | AuthEvent::PasswordCreated(resp) => {
                if resp.success {
                    "login accepted".into()
                } else {
                    format!("login rejected: {}", resp.error.as_deref().unwrap_or("-"))
                }
            }
            AuthEvent::AuthKeyVerified(resp) => {
                if resp.success {
                    "session key accepted".into()
                } else {
                    "session key expired".into()
                }
            }
            AuthEvent::LoggedOut => "logged out".into(),
        },
        InboundMessage::Service(update)
        | InboundMessage::ResourceUpdate(update)
        | InboundMessage::Legacy(update) => describe_update(update),
        InboundMessage::Activity(kind) => kind.name().to_owned(),
        InboundMessage::TimerTick(tick) => {
            let remaining = studente_core::TimerState {
                remaining_ms: tick.remaining_ms,
                max_ms: tick.max_ms.unwrap_or_default(),
            };
            format!("{} remaining", remaining.formatted())
        }
        InboundMessage::ResourceError { service, content } => {
            let text = content
                .get("message")
                .or_else(|| content.get("error"))
                .and_then(serde_json::Value::as_str)
                .unwrap_or("unknown error");
            format!("{service}: {text}")
        }
        InboundMessage::Content(update) => {
            let mut parts = Vec::new();
            if let Some(instances) = &update.instances {
                parts.push(format!("{} EC2 instances", instances.len()));
            }
            if let Some(clusters) = &update.ecs_clusters {
                parts.push(format!("{} ECS clusters", clusters.len()));
            }
            if let Some(clusters) = &update.eks_clusters {
                parts.push(format!("{} EKS clusters", clusters.len()));
            }
            match &update.activity {
                Some(ContentActivity::Pulse(kind)) => parts.push(kind.name().to_owned()),
                Some(ContentActivity::Patch(_)) => parts.push("activity status".into()),
                None => {}
            }
            parts.join(", ")
        }
        InboundMessage::Unrecognized(_) => "unrecognized message".into(),
    }
}

fn describe_update(update: &ServiceUpdate) -> String {
    match update {
        ServiceUpdate::Ec2 {
            instances: Some(instances),
            ..
        } => format!("{} EC2 instances", instances.len()),
        ServiceUpdate::Ec2 { instances: None, .. } => "EC2 action processed".into(),
        ServiceUpdate::Ecs(clusters) => format!("{} ECS clusters", clusters.len()),
        ServiceUpdate::Eks(clusters) => format!("{} EKS clusters", clusters.len()),
        ServiceUpdate::ActivityPatch(_) | ServiceUpdate::ActivityReplace(_) => {
            "activity status".into()
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use studente_core::classify;

    use super::*;

    #[test]
    fn summaries_name_what_changed() {
        let list = classify(&json!({
            "service": "ec2",
            "instances": [{"id": "i-1"}, {"id": "i-2"}],
        }));
        assert_eq!(describe(&list), "2 EC2 instances");

        let tick = classify(&json!({"type": "TIMER_TICK", "content": {"nowtime": 61_000}}));
        assert_eq!(describe(&tick), "00:01:01 remaining");

        let err = classify(&json!({"type": "AWS_EC2_ERROR", "content": {"message": "denied"}}));
        assert_eq!(describe(&err), "ec2: denied");

        let status = classify(&json!({"type": "PASSWORD_STATUS", "content": {"isInitialSetup": true}}));
        assert_eq!(describe(&status), "tracker needs an initial password");
    }
}
