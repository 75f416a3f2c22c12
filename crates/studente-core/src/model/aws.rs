// ── AWS resource snapshots ──
//
// Shapes the tracker relays from its AWS polling. Every field the tracker
// may omit defaults instead of failing the whole list.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// AWS service a payload or request refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum Service {
    Ec2,
    Ecs,
    Eks,
}

/// EC2 lifecycle state. Unknown strings are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(from = "String", into = "String")]
pub enum InstanceState {
    Pending,
    Running,
    Stopping,
    Stopped,
    ShuttingDown,
    Terminated,
    #[strum(default)]
    Other(String),
}

impl InstanceState {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::ShuttingDown => "shutting-down",
            Self::Terminated => "terminated",
            Self::Other(s) => s,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// `pending` / `stopping` / `shutting-down`
    pub fn is_transitioning(&self) -> bool {
        matches!(self, Self::Pending | Self::Stopping | Self::ShuttingDown)
    }
}

impl Default for InstanceState {
    fn default() -> Self {
        Self::Other(String::new())
    }
}

impl std::fmt::Display for InstanceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for InstanceState {
    fn from(s: String) -> Self {
        s.parse().unwrap_or(Self::Other(s))
    }
}

impl From<InstanceState> for String {
    fn from(state: InstanceState) -> Self {
        state.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ec2Instance {
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub state: InstanceState,

    #[serde(rename = "type", default)]
    pub instance_type: String,

    #[serde(default)]
    pub zone: Option<String>,

    #[serde(default)]
    pub region: String,

    #[serde(default)]
    pub public_ip: Option<String>,

    #[serde(default)]
    pub private_ip: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EcsCluster {
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub service_count: u32,
    #[serde(default)]
    pub task_count: u32,
    #[serde(default)]
    pub region: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EksCluster {
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub node_count: u32,
    #[serde(default)]
    pub region: String,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn ec2_instance_from_tracker_payload() {
        let inst: Ec2Instance = serde_json::from_value(json!({
            "id": "i-0e493abf123ebf7c7",
            "type": "t2.nano",
            "state": "stopped",
            "name": "",
            "public_ip": null,
            "private_ip": "172.31.3.229",
            "region": "ap-northeast-2"
        }))
        .unwrap();

        assert_eq!(inst.instance_type, "t2.nano");
        assert_eq!(inst.state, InstanceState::Stopped);
        assert_eq!(inst.public_ip, None);
        assert_eq!(inst.private_ip.as_deref(), Some("172.31.3.229"));
    }

    #[test]
    fn unknown_state_round_trips_verbatim() {
        let state = InstanceState::from("rebooting".to_owned());
        assert_eq!(state, InstanceState::Other("rebooting".into()));
        assert_eq!(state.to_string(), "rebooting");
    }

    #[test]
    fn kebab_case_states() {
        assert_eq!(
            InstanceState::from("shutting-down".to_owned()),
            InstanceState::ShuttingDown
        );
        assert!(InstanceState::ShuttingDown.is_transitioning());
        assert!(!InstanceState::Running.is_transitioning());
    }

    #[test]
    fn cluster_counts_are_camel_case() {
        let ecs: EcsCluster = serde_json::from_value(json!({
            "name": "web", "status": "ACTIVE", "serviceCount": 3, "taskCount": 7
        }))
        .unwrap();
        assert_eq!(ecs.service_count, 3);
        assert_eq!(ecs.task_count, 7);
        assert_eq!(ecs.region, "");

        let eks: EksCluster =
            serde_json::from_value(json!({ "name": "k", "nodeCount": 4 })).unwrap();
        assert_eq!(eks.node_count, 4);
    }

    #[test]
    fn service_names_are_lowercase() {
        assert_eq!(Service::Ec2.as_ref(), "ec2");
        assert_eq!("eks".parse::<Service>().unwrap(), Service::Eks);
    }
}
