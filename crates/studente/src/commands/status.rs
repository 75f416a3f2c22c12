//! `studente status`: collect updates for a moment, then print a snapshot.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tabled::Tabled;

use studente_core::{
    ActivityStatus, Dashboard, Ec2Instance, EcsCluster, EksCluster, InstanceFilter, TimerState,
};

use crate::cli::{GlobalOpts, OutputFormat, StatusArgs};
use crate::config::Resolved;
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
pub struct InstanceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Type")]
    instance_type: String,
    #[tabled(rename = "Region")]
    region: String,
    #[tabled(rename = "Public IP")]
    public_ip: String,
    #[tabled(rename = "Private IP")]
    private_ip: String,
}

impl InstanceRow {
    pub fn new(i: &Ec2Instance, color: bool) -> Self {
        Self {
            id: i.id.clone(),
            name: i.name.clone(),
            state: output::paint_state(&i.state, color),
            instance_type: i.instance_type.clone(),
            region: i.region.clone(),
            public_ip: i.public_ip.clone().unwrap_or_default(),
            private_ip: i.private_ip.clone().unwrap_or_default(),
        }
    }
}

#[derive(Tabled)]
struct ClusterRow {
    #[tabled(rename = "Kind")]
    kind: &'static str,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Detail")]
    detail: String,
    #[tabled(rename = "Region")]
    region: String,
}

impl From<&EcsCluster> for ClusterRow {
    fn from(c: &EcsCluster) -> Self {
        Self {
            kind: "ECS",
            name: c.name.clone(),
            status: c.status.clone(),
            detail: format!("{} services, {} tasks", c.service_count, c.task_count),
            region: c.region.clone(),
        }
    }
}

impl From<&EksCluster> for ClusterRow {
    fn from(c: &EksCluster) -> Self {
        Self {
            kind: "EKS",
            name: c.name.clone(),
            status: c.status.clone(),
            detail: format!("v{}, {} nodes", c.version, c.node_count),
            region: c.region.clone(),
        }
    }
}

// ── Snapshot ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Snapshot {
    url: String,
    authenticated: bool,
    instances: Vec<Ec2Instance>,
    ecs_clusters: Vec<EcsCluster>,
    eks_clusters: Vec<EksCluster>,
    activity: ActivityStatus,
    timer: TimerView,
    last_error: Option<String>,
    messages_received: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TimerView {
    remaining_ms: u64,
    max_ms: u64,
    formatted: String,
    level: String,
}

impl From<TimerState> for TimerView {
    fn from(t: TimerState) -> Self {
        Self {
            remaining_ms: t.remaining_ms,
            max_ms: t.max_ms,
            formatted: t.formatted(),
            level: t.level().to_string(),
        }
    }
}

pub async fn handle(
    dashboard: &Dashboard,
    resolved: &Resolved,
    args: StatusArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    util::connect(dashboard, resolved.timeout).await?;
    let authenticated = if args.no_login {
        false
    } else {
        util::login_if_configured(dashboard, resolved).await?
    };

    tokio::time::sleep(Duration::from_secs(args.wait)).await;

    let filter = if args.running {
        InstanceFilter::Running
    } else {
        InstanceFilter::All
    };
    let store = dashboard.store();
    let snapshot = Snapshot {
        url: dashboard.connection().url().to_string(),
        authenticated: authenticated || store.auth().authenticated,
        instances: unwrap_arcs(&filter.apply(&store.ec2_snapshot())),
        ecs_clusters: unwrap_arcs(&store.ecs_snapshot()),
        eks_clusters: unwrap_arcs(&store.eks_snapshot()),
        activity: store.activity(),
        timer: store.timer().into(),
        last_error: store
            .last_error()
            .map(|e| format!("{}: {}", e.service, e.message)),
        messages_received: store.message_count(),
    };

    let out = match global.output {
        OutputFormat::Table => render_tables(&snapshot, store.timer(), global),
        OutputFormat::Json => output::render_json(&snapshot, false),
        OutputFormat::JsonCompact => output::render_json(&snapshot, true),
        OutputFormat::Plain => snapshot
            .instances
            .iter()
            .map(|i| format!("{} {}", i.id, i.state))
            .collect::<Vec<_>>()
            .join("\n"),
    };
    output::print_output(&out, global.quiet);
    Ok(())
}

fn unwrap_arcs<T: Clone>(items: &[Arc<T>]) -> Vec<T> {
    items.iter().map(|item| T::clone(item)).collect()
}

fn render_tables(snapshot: &Snapshot, timer: TimerState, global: &GlobalOpts) -> String {
    let color = output::should_color(global.color);
    let a = &snapshot.activity;
    let mut sections = vec![
        format!(
            "Tracker:  {} ({})",
            snapshot.url,
            if snapshot.authenticated {
                "logged in"
            } else {
                "not logged in"
            }
        ),
        format!(
            "Timer:    {} ({})",
            output::paint_timer(&timer.formatted(), timer.level(), color),
            timer.level()
        ),
        format!(
            "Activity: keyboard {}  mouse {}  click {}  screen {}  audio {}  user {}",
            output::flag(a.keyboard, color),
            output::flag(a.mouse_movement, color),
            output::flag(a.mouse_click, color),
            output::flag(a.screen, color),
            output::flag(a.audio, color),
            output::flag(a.user_active, color),
        ),
    ];
    if !a.active_window.is_empty() {
        sections.push(format!("Window:   {}", a.active_window));
    }
    if let Some(ref err) = snapshot.last_error {
        sections.push(format!("Error:    {err}"));
    }

    if snapshot.instances.is_empty() {
        sections.push(output::dim("No EC2 instances reported.", color));
    } else {
        let rows: Vec<InstanceRow> = snapshot
            .instances
            .iter()
            .map(|i| InstanceRow::new(i, color))
            .collect();
        sections.push(output::render_table(&rows));
    }

    let clusters: Vec<ClusterRow> = snapshot
        .ecs_clusters
        .iter()
        .map(ClusterRow::from)
        .chain(snapshot.eks_clusters.iter().map(ClusterRow::from))
        .collect();
    if !clusters.is_empty() {
        sections.push(output::render_table(&clusters));
    }

    sections.join("\n")
}
