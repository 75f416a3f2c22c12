// ── Inbound message normalization ──
//
// The tracker speaks several generations of message shapes at once. Every
// inbound JSON document is classified by an ordered list of shape rules
// (first match wins) into one `InboundMessage`:
//
//   1. auth / session responses            (`type` = PASSWORD_* / ...)
//   2. service payloads                    (`service` = ec2 | ecs | eks | activity)
//   3. activity events and timer ticks     (`type` = USER_ACTIVITY / TIMER_TICK)
//   4. AWS update / error notifications    (`type` = AWS_{EC2,ECS,EKS}_{UPDATE,ERROR})
//   5. legacy flat payloads                (`type` = activity | *-instances | *-clusters)
//   6. generic `content` on any typed message
//
// Anything else is `Unrecognized`. A payload that matches a rule's shape
// but fails to deserialize is logged and falls through to the next rule.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use studente_api::message::is_truthy;
use tracing::warn;

use crate::model::{
    ActivityKind, ActivityStatus, AuthResponse, Ec2Instance, EcsCluster, EksCluster, Service,
};

/// Wire `type` tags the normalizer understands.
pub mod kind {
    pub const PASSWORD_STATUS: &str = "PASSWORD_STATUS";
    pub const PASSWORD_VERIFY_RESPONSE: &str = "PASSWORD_VERIFY_RESPONSE";
    pub const PASSWORD_CREATE_RESPONSE: &str = "PASSWORD_CREATE_RESPONSE";
    pub const VERIFY_AUTH_KEY_RESPONSE: &str = "VERIFY_AUTH_KEY_RESPONSE";
    pub const LOGOUT_RESPONSE: &str = "LOGOUT_RESPONSE";

    pub const USER_ACTIVITY: &str = "USER_ACTIVITY";
    pub const TIMER_TICK: &str = "TIMER_TICK";

    pub const AWS_EC2_UPDATE: &str = "AWS_EC2_UPDATE";
    pub const AWS_ECS_UPDATE: &str = "AWS_ECS_UPDATE";
    pub const AWS_EKS_UPDATE: &str = "AWS_EKS_UPDATE";
    pub const AWS_EC2_ERROR: &str = "AWS_EC2_ERROR";
    pub const AWS_ECS_ERROR: &str = "AWS_ECS_ERROR";
    pub const AWS_EKS_ERROR: &str = "AWS_EKS_ERROR";

    pub const LEGACY_ACTIVITY: &str = "activity";
    pub const LEGACY_EC2_INSTANCES: &str = "ec2-instances";
    pub const LEGACY_ECS_CLUSTERS: &str = "ecs-clusters";
    pub const LEGACY_EKS_CLUSTERS: &str = "eks-clusters";

    /// Client-side log entry for an EC2 action this dashboard issued.
    pub const CLIENT_ACTION: &str = "CLIENT_ACTION";
}

// ── Classified messages ─────────────────────────────────────────────

/// Session responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    PasswordStatus { initial_setup: bool },
    PasswordVerified(AuthResponse),
    PasswordCreated(AuthResponse),
    AuthKeyVerified(AuthResponse),
    LoggedOut,
}

/// Resource or activity payload delivered whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceUpdate {
    Ec2 {
        /// `None` when an update only acknowledges an action.
        instances: Option<Vec<Ec2Instance>>,
        /// The pending start/stop action has been processed.
        settles_action: bool,
    },
    Ecs(Vec<EcsCluster>),
    Eks(Vec<EksCluster>),
    /// Fields to overlay on the current activity status.
    ActivityPatch(Map<String, Value>),
    /// Full replacement of the activity status.
    ActivityReplace(ActivityStatus),
}

/// Activity carried inside a generic `content`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentActivity {
    Pulse(ActivityKind),
    Patch(Map<String, Value>),
}

/// Everything recognized in a generic `content` block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentUpdate {
    pub instances: Option<Vec<Ec2Instance>>,
    pub ecs_clusters: Option<Vec<EcsCluster>>,
    pub eks_clusters: Option<Vec<EksCluster>>,
    pub activity: Option<ContentActivity>,
}

impl ContentUpdate {
    pub fn is_empty(&self) -> bool {
        self.instances.is_none()
            && self.ecs_clusters.is_none()
            && self.eks_clusters.is_none()
            && self.activity.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerTick {
    pub remaining_ms: u64,
    pub max_ms: Option<u64>,
}

/// One inbound document, normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    Auth(AuthEvent),
    Service(ServiceUpdate),
    Activity(ActivityKind),
    TimerTick(TimerTick),
    ResourceUpdate(ServiceUpdate),
    ResourceError { service: Service, content: Value },
    Legacy(ServiceUpdate),
    Content(ContentUpdate),
    Unrecognized(Value),
}

impl InboundMessage {
    /// Short label for logs and the CLI.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Auth(_) => "auth",
            Self::Service(_) => "service",
            Self::Activity(_) => "activity",
            Self::TimerTick(_) => "timer",
            Self::ResourceUpdate(_) => "resource-update",
            Self::ResourceError { .. } => "resource-error",
            Self::Legacy(_) => "legacy",
            Self::Content(_) => "content",
            Self::Unrecognized(_) => "unrecognized",
        }
    }
}

// ── Classifier ──────────────────────────────────────────────────────

/// Classify one inbound document. Pure.
pub fn classify(raw: &Value) -> InboundMessage {
    let Some(msg) = raw.as_object() else {
        return InboundMessage::Unrecognized(raw.clone());
    };
    let msg_type = str_field(msg, "type");
    let content = msg.get("content").filter(|c| is_truthy(c));

    if let Some(auth) = msg_type.and_then(|t| auth_event(t, content)) {
        return InboundMessage::Auth(auth);
    }

    if let Some(update) = service_payload(msg) {
        return InboundMessage::Service(update);
    }

    if let Some(found) = msg_type.and_then(|t| activity_or_timer(t, content)) {
        return found;
    }

    if let (Some(t), Some(content)) = (msg_type, content) {
        if let Some(found) = aws_notification(t, content) {
            return found;
        }
    }

    if let Some(update) = msg_type.and_then(|t| legacy_payload(t, msg.get("data"))) {
        return InboundMessage::Legacy(update);
    }

    if let (Some(t), Some(content)) = (msg_type, content) {
        let update = content_update(t, content);
        if !update.is_empty() {
            return InboundMessage::Content(update);
        }
    }

    InboundMessage::Unrecognized(raw.clone())
}

// Rule 1
fn auth_event(msg_type: &str, content: Option<&Value>) -> Option<AuthEvent> {
    let event = match msg_type {
        kind::PASSWORD_STATUS => AuthEvent::PasswordStatus {
            initial_setup: content
                .and_then(|c| c.get("isInitialSetup"))
                .is_some_and(is_truthy),
        },
        kind::PASSWORD_VERIFY_RESPONSE => AuthEvent::PasswordVerified(auth_response(content)),
        kind::PASSWORD_CREATE_RESPONSE => AuthEvent::PasswordCreated(auth_response(content)),
        kind::VERIFY_AUTH_KEY_RESPONSE => AuthEvent::AuthKeyVerified(auth_response(content)),
        kind::LOGOUT_RESPONSE => AuthEvent::LoggedOut,
        _ => return None,
    };
    Some(event)
}

fn auth_response(content: Option<&Value>) -> AuthResponse {
    let field = |key: &str| {
        content
            .and_then(|c| c.get(key))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
    };
    AuthResponse {
        success: content.and_then(|c| c.get("success")).is_some_and(is_truthy),
        auth_key: field("authKey"),
        error: field("error"),
    }
}

// Rule 2
fn service_payload(msg: &Map<String, Value>) -> Option<ServiceUpdate> {
    match str_field(msg, "service")? {
        "ec2" => {
            let instances = list_field(msg, "instances")?;
            Some(ServiceUpdate::Ec2 {
                instances: Some(instances),
                settles_action: str_field(msg, "status") == Some("updated"),
            })
        }
        "ecs" => list_field(msg, "clusters").map(ServiceUpdate::Ecs),
        "eks" => list_field(msg, "clusters").map(ServiceUpdate::Eks),
        "activity" => {
            let patch = msg
                .get("data")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            Some(ServiceUpdate::ActivityPatch(patch))
        }
        _ => None,
    }
}

// Rule 3
fn activity_or_timer(msg_type: &str, content: Option<&Value>) -> Option<InboundMessage> {
    let content = content?;
    match msg_type {
        kind::USER_ACTIVITY => {
            let activity = content
                .get("activity")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())?;
            if activity == kind::TIMER_TICK {
                if let Some(tick) = timer_tick(content) {
                    return Some(InboundMessage::TimerTick(tick));
                }
            }
            Some(InboundMessage::Activity(ActivityKind::parse(activity)))
        }
        kind::TIMER_TICK => timer_tick(content).map(InboundMessage::TimerTick),
        _ => None,
    }
}

fn timer_tick(content: &Value) -> Option<TimerTick> {
    let remaining_ms = content
        .get("nowtime")
        .filter(|v| is_truthy(v))
        .and_then(millis)?;
    let max_ms = content
        .get("maxtime")
        .filter(|v| is_truthy(v))
        .and_then(millis);
    Some(TimerTick {
        remaining_ms,
        max_ms,
    })
}

// Rule 4
fn aws_notification(msg_type: &str, content: &Value) -> Option<InboundMessage> {
    let found = match msg_type {
        kind::AWS_EC2_UPDATE => InboundMessage::ResourceUpdate(ServiceUpdate::Ec2 {
            instances: content
                .get("instances")
                .filter(|v| is_truthy(v))
                .and_then(|v| parse_list(v, "instances")),
            settles_action: true,
        }),
        kind::AWS_ECS_UPDATE => {
            InboundMessage::ResourceUpdate(ServiceUpdate::Ecs(content_list(content)?))
        }
        kind::AWS_EKS_UPDATE => {
            InboundMessage::ResourceUpdate(ServiceUpdate::Eks(content_list(content)?))
        }
        kind::AWS_EC2_ERROR => resource_error(Service::Ec2, content),
        kind::AWS_ECS_ERROR => resource_error(Service::Ecs, content),
        kind::AWS_EKS_ERROR => resource_error(Service::Eks, content),
        _ => return None,
    };
    Some(found)
}

fn content_list<T: DeserializeOwned>(content: &Value) -> Option<Vec<T>> {
    content
        .get("clusters")
        .filter(|v| is_truthy(v))
        .and_then(|v| parse_list(v, "clusters"))
}

fn resource_error(service: Service, content: &Value) -> InboundMessage {
    InboundMessage::ResourceError {
        service,
        content: content.clone(),
    }
}

// Rule 5
fn legacy_payload(msg_type: &str, data: Option<&Value>) -> Option<ServiceUpdate> {
    let data = data.filter(|d| is_truthy(d))?;
    match msg_type {
        kind::LEGACY_ACTIVITY => serde_json::from_value(data.clone())
            .map_err(|e| warn!(error = %e, "Malformed legacy activity payload"))
            .ok()
            .map(ServiceUpdate::ActivityReplace),
        kind::LEGACY_EC2_INSTANCES => parse_list(data, "data").map(|instances| ServiceUpdate::Ec2 {
            instances: Some(instances),
            settles_action: false,
        }),
        kind::LEGACY_ECS_CLUSTERS => parse_list(data, "data").map(ServiceUpdate::Ecs),
        kind::LEGACY_EKS_CLUSTERS => parse_list(data, "data").map(ServiceUpdate::Eks),
        _ => None,
    }
}

// Rule 6
fn content_update(msg_type: &str, content: &Value) -> ContentUpdate {
    let present = |key: &str| content.get(key).filter(|v| is_truthy(v));

    let clusters = present("clusters");
    let activity = present("activity").and_then(|a| match a {
        Value::String(name) => Some(ContentActivity::Pulse(ActivityKind::parse(name))),
        Value::Object(patch) => Some(ContentActivity::Patch(patch.clone())),
        _ => None,
    });

    ContentUpdate {
        instances: present("instances").and_then(|v| parse_list(v, "instances")),
        ecs_clusters: clusters
            .filter(|_| msg_type.contains("ECS"))
            .and_then(|v| parse_list(v, "clusters")),
        eks_clusters: clusters
            .filter(|_| msg_type.contains("EKS"))
            .and_then(|v| parse_list(v, "clusters")),
        activity,
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn str_field<'a>(msg: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    msg.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// A truthy list field, deserialized.
fn list_field<T: DeserializeOwned>(msg: &Map<String, Value>, key: &str) -> Option<Vec<T>> {
    msg.get(key)
        .filter(|v| is_truthy(v))
        .and_then(|v| parse_list(v, key))
}

fn parse_list<T: DeserializeOwned>(value: &Value, field: &str) -> Option<Vec<T>> {
    match serde_json::from_value(value.clone()) {
        Ok(list) => Some(list),
        Err(e) => {
            warn!(field, error = %e, "Malformed resource list");
            None
        }
    }
}

/// Non-negative whole milliseconds.
fn millis(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.is_finite() && *f >= 0.0)
            .map(|f| {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::as_conversions)]
                let whole = f.trunc() as u64;
                whole
            })
    })
}
