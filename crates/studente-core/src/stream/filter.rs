// ── Stream filters ──

use std::sync::Arc;

use crate::model::Ec2Instance;

/// Predicate for narrowing an EC2 snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InstanceFilter {
    #[default]
    All,
    Running,
}

impl InstanceFilter {
    pub fn matches(self, instance: &Ec2Instance) -> bool {
        match self {
            Self::All => true,
            Self::Running => instance.state.is_running(),
        }
    }

    /// Apply to a snapshot, preserving order.
    pub fn apply(self, instances: &[Arc<Ec2Instance>]) -> Vec<Arc<Ec2Instance>> {
        instances
            .iter()
            .filter(|i| self.matches(i))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn instances() -> Vec<Arc<Ec2Instance>> {
        let list: Vec<Ec2Instance> = serde_json::from_value(json!([
            { "id": "a", "state": "running", "region": "us-east-1" },
            { "id": "b", "state": "stopping", "region": "ap-northeast-2" },
            { "id": "c", "state": "stopped", "region": "ap-northeast-2" }
        ]))
        .unwrap();
        list.into_iter().map(Arc::new).collect()
    }

    fn ids(filter: InstanceFilter) -> Vec<String> {
        filter
            .apply(&instances())
            .iter()
            .map(|i| i.id.clone())
            .collect()
    }

    #[test]
    fn filters_select_expected_instances() {
        assert_eq!(ids(InstanceFilter::All), ["a", "b", "c"]);
        assert_eq!(ids(InstanceFilter::Running), ["a"]);
    }
}
