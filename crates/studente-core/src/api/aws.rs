// ── AWS requests ──

use serde_json::{Map, Value, json};
use strum::Display;
use studente_api::message::action;
use tracing::{info, warn};

use super::RequestOptions;
use crate::dashboard::Dashboard;
use crate::error::CoreError;
use crate::inbound::kind;
use crate::model::{InstanceState, Service};

/// EC2 lifecycle actions the dashboard can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum InstanceAction {
    Start,
    Stop,
}

impl InstanceAction {
    /// Legacy action name on the wire.
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Start => action::START_INSTANCE,
            Self::Stop => action::STOP_INSTANCE,
        }
    }

    /// State shown until the tracker reports the real one.
    pub fn optimistic_state(self) -> InstanceState {
        match self {
            Self::Start => InstanceState::Pending,
            Self::Stop => InstanceState::Stopping,
        }
    }
}

pub struct AwsApi<'a> {
    dashboard: &'a Dashboard,
}

impl<'a> AwsApi<'a> {
    pub(crate) fn new(dashboard: &'a Dashboard) -> Self {
        Self { dashboard }
    }

    /// Ask the tracker to re-poll one service.
    pub fn refresh_service(&self, service: Service, options: &RequestOptions) -> bool {
        if !self.dashboard.is_connected() {
            warn!(%service, "Refresh not sent: not connected");
            return false;
        }

        info!(%service, "Requesting refresh");
        let mut request = Map::new();
        request.insert("action".into(), json!(action::REFRESH_SERVICE));
        request.insert("service".into(), json!(service.as_ref()));
        options.merge_into(&mut request);
        self.dashboard.send(&Value::Object(request))
    }

    /// Refresh EC2, ECS and EKS. Returns `true` only if all three went out.
    pub fn refresh_all(&self, options: &RequestOptions) -> bool {
        [Service::Ec2, Service::Ecs, Service::Eks]
            .into_iter()
            .fold(true, |ok, service| self.refresh_service(service, options) && ok)
    }

    pub fn start_instance(&self, instance_id: &str, options: &RequestOptions) -> Result<(), CoreError> {
        self.instance_action(InstanceAction::Start, instance_id, options)
    }

    pub fn stop_instance(&self, instance_id: &str, options: &RequestOptions) -> Result<(), CoreError> {
        self.instance_action(InstanceAction::Stop, instance_id, options)
    }

    /// Request a start/stop.
    ///
    /// Only one action may be pending at a time; the slot is released by
    /// the tracker's `status: "updated"` EC2 payload, an `AWS_EC2_UPDATE`,
    /// an `AWS_*_ERROR`, or a disconnect.
    pub fn instance_action(
        &self,
        action: InstanceAction,
        instance_id: &str,
        options: &RequestOptions,
    ) -> Result<(), CoreError> {
        if instance_id.is_empty() {
            return Err(CoreError::validation("instance id is required"));
        }
        if !self.dashboard.is_connected() {
            warn!(%action, instance_id, "Instance action not sent: not connected");
            return Err(CoreError::NotConnected);
        }

        let store = self.dashboard.store();
        if !store.try_begin_action() {
            return Err(CoreError::ActionInFlight);
        }

        let region = options
            .region
            .clone()
            .unwrap_or_else(|| self.dashboard.config().region.clone());
        let request = json!({
            "action": action.wire_name(),
            "instanceId": instance_id,
            "region": region,
        });

        if !self.dashboard.send(&request) {
            store.end_action();
            return Err(CoreError::NotConnected);
        }

        info!(%action, instance_id, %region, "Instance action requested");
        store.set_instance_state(instance_id, action.optimistic_state());
        store.log_client_action(json!({
            "type": kind::CLIENT_ACTION,
            "content": request,
        }));
        Ok(())
    }
}
