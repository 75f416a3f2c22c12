//! `studente refresh`: ask the tracker to re-poll AWS services.

use std::collections::HashSet;

use serde::Serialize;
use tabled::Tabled;

use studente_core::{Dashboard, InboundMessage, RequestOptions, Service};

use crate::cli::{GlobalOpts, OutputFormat, RefreshArgs};
use crate::config::Resolved;
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Debug, Serialize)]
struct RefreshResult {
    service: String,
    /// `updated`, `error` or `requested` (with `--no-wait`).
    outcome: String,
    count: Option<usize>,
    message: Option<String>,
}

#[derive(Tabled)]
struct RefreshRow {
    #[tabled(rename = "Service")]
    service: String,
    #[tabled(rename = "Outcome")]
    outcome: String,
    #[tabled(rename = "Items")]
    count: String,
    #[tabled(rename = "Message")]
    message: String,
}

impl RefreshRow {
    fn new(r: &RefreshResult) -> Self {
        Self {
            service: r.service.clone(),
            outcome: r.outcome.clone(),
            count: r.count.map(|c| c.to_string()).unwrap_or_default(),
            message: r.message.clone().unwrap_or_default(),
        }
    }
}

pub async fn handle(
    dashboard: &Dashboard,
    resolved: &Resolved,
    args: RefreshArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let services = util::services(args.service);
    let mut updates = dashboard.subscribe_updates();

    util::connect(dashboard, resolved.timeout).await?;
    util::login_if_configured(dashboard, resolved).await?;

    let options = RequestOptions::region(resolved.dashboard.region.clone());
    for service in services {
        if !dashboard.aws().refresh_service(*service, &options) {
            return Err(CliError::Disconnected);
        }
    }

    let mut results = Vec::with_capacity(services.len());
    if args.no_wait {
        results.extend(services.iter().map(|s| RefreshResult {
            service: s.to_string(),
            outcome: "requested".into(),
            count: None,
            message: None,
        }));
    } else {
        let mut pending: HashSet<Service> = services.iter().copied().collect();
        while !pending.is_empty() {
            let msg = util::next_update(&mut updates, resolved.timeout, |m| {
                util::services_in(m).iter().any(|s| pending.contains(s))
            })
            .await?;
            for service in util::services_in(&msg) {
                if pending.remove(&service) {
                    results.push(result_for(dashboard, service, &msg));
                }
            }
        }
        results.sort_by_key(|r| r.service.clone());
    }

    output::print_output(&render(global.output, &results), global.quiet);
    Ok(())
}

fn render(format: OutputFormat, results: &[RefreshResult]) -> String {
    output::render_list(format, results, RefreshRow::new, |r| {
        format!("{} {}", r.service, r.outcome)
    })
}

fn result_for(dashboard: &Dashboard, service: Service, msg: &InboundMessage) -> RefreshResult {
    if let InboundMessage::ResourceError { .. } = msg {
        let message = dashboard.store().last_error().map(|e| e.message.clone());
        return RefreshResult {
            service: service.to_string(),
            outcome: "error".into(),
            count: None,
            message,
        };
    }

    let store = dashboard.store();
    let count = match service {
        Service::Ec2 => store.ec2_count(),
        Service::Ecs => store.ecs_count(),
        Service::Eks => store.eks_count(),
    };
    RefreshResult {
        service: service.to_string(),
        outcome: "updated".into(),
        count: Some(count),
        message: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn results() -> Vec<RefreshResult> {
        vec![
            RefreshResult {
                service: "ec2".into(),
                outcome: "updated".into(),
                count: Some(3),
                message: None,
            },
            RefreshResult {
                service: "eks".into(),
                outcome: "error".into(),
                count: None,
                message: Some("AccessDenied".into()),
            },
        ]
    }

    #[test]
    fn table_lists_every_service() {
        let out = render(OutputFormat::Table, &results());
        assert!(out.contains("Outcome"));
        assert!(out.contains("updated"));
        assert!(out.contains("AccessDenied"));
    }

    #[test]
    fn plain_pairs_service_with_outcome() {
        assert_eq!(render(OutputFormat::Plain, &results()), "ec2 updated\neks error");
    }
}
