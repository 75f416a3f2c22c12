// ── Central dashboard store ──
//
// Everything the dashboard renders, held behind `watch` channels so any
// number of consumers can snapshot or await changes. Normalized inbound
// messages are folded in through `apply`.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde_json::{Map, Value};
use tokio::sync::watch;
use tracing::{debug, warn};

use super::collection::{EntityCollection, Snapshot};
use super::message_log::{Direction, LogEntry, MessageLog};
use crate::inbound::{AuthEvent, ContentActivity, ContentUpdate, InboundMessage, ServiceUpdate};
use crate::model::{
    ActivityKind, ActivityStatus, AuthResponse, AuthState, Ec2Instance, EcsCluster, EksCluster,
    InstanceState, Service, TimerState,
};
use crate::stream::EntityStream;

const INVALID_PASSWORD: &str = "Invalid password";
const PASSWORD_CREATE_FAILED: &str = "Failed to set password";

/// Last `AWS_*_ERROR` reported by the tracker.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceError {
    pub service: Service,
    pub message: String,
    pub content: Value,
    pub at: DateTime<Utc>,
}

/// Central reactive store for the dashboard.
pub struct DataStore {
    pub(crate) ec2: EntityCollection<Ec2Instance>,
    pub(crate) ecs: EntityCollection<EcsCluster>,
    pub(crate) eks: EntityCollection<EksCluster>,
    activity: watch::Sender<ActivityStatus>,
    timer: watch::Sender<TimerState>,
    auth: watch::Sender<AuthState>,
    action_in_flight: watch::Sender<bool>,
    last_error: watch::Sender<Option<Arc<ResourceError>>>,
    last_message: watch::Sender<Option<DateTime<Utc>>>,
    log: Mutex<MessageLog>,
}

impl DataStore {
    pub fn new(log_capacity: usize) -> Self {
        let (activity, _) = watch::channel(ActivityStatus::default());
        let (timer, _) = watch::channel(TimerState::default());
        let (auth, _) = watch::channel(AuthState::default());
        let (action_in_flight, _) = watch::channel(false);
        let (last_error, _) = watch::channel(None);
        let (last_message, _) = watch::channel(None);

        Self {
            ec2: EntityCollection::new(),
            ecs: EntityCollection::new(),
            eks: EntityCollection::new(),
            activity,
            timer,
            auth,
            action_in_flight,
            last_error,
            last_message,
            log: Mutex::new(MessageLog::new(log_capacity)),
        }
    }

    // ── Snapshot accessors ───────────────────────────────────────────

    pub fn ec2_snapshot(&self) -> Snapshot<Ec2Instance> {
        self.ec2.snapshot()
    }

    pub fn ecs_snapshot(&self) -> Snapshot<EcsCluster> {
        self.ecs.snapshot()
    }

    pub fn eks_snapshot(&self) -> Snapshot<EksCluster> {
        self.eks.snapshot()
    }

    pub fn activity(&self) -> ActivityStatus {
        self.activity.borrow().clone()
    }

    pub fn timer(&self) -> TimerState {
        *self.timer.borrow()
    }

    pub fn auth(&self) -> AuthState {
        self.auth.borrow().clone()
    }

    pub fn auth_key(&self) -> Option<SecretString> {
        self.auth.borrow().auth_key.clone()
    }

    pub fn is_action_in_flight(&self) -> bool {
        *self.action_in_flight.borrow()
    }

    pub fn last_error(&self) -> Option<Arc<ResourceError>> {
        self.last_error.borrow().clone()
    }

    pub fn last_message_at(&self) -> Option<DateTime<Utc>> {
        *self.last_message.borrow()
    }

    pub fn ec2_count(&self) -> usize {
        self.ec2.len()
    }

    pub fn ecs_count(&self) -> usize {
        self.ecs.len()
    }

    pub fn eks_count(&self) -> usize {
        self.eks.len()
    }

    pub fn instance(&self, id: &str) -> Option<Arc<Ec2Instance>> {
        self.ec2.snapshot().iter().find(|i| i.id == id).cloned()
    }

    // ── Subscriptions ────────────────────────────────────────────────

    pub fn subscribe_ec2(&self) -> EntityStream<Ec2Instance> {
        EntityStream::new(self.ec2.subscribe())
    }

    pub fn subscribe_ecs(&self) -> EntityStream<EcsCluster> {
        EntityStream::new(self.ecs.subscribe())
    }

    pub fn subscribe_eks(&self) -> EntityStream<EksCluster> {
        EntityStream::new(self.eks.subscribe())
    }

    pub fn subscribe_activity(&self) -> watch::Receiver<ActivityStatus> {
        self.activity.subscribe()
    }

    pub fn subscribe_timer(&self) -> watch::Receiver<TimerState> {
        self.timer.subscribe()
    }

    pub fn subscribe_auth(&self) -> watch::Receiver<AuthState> {
        self.auth.subscribe()
    }

    pub fn subscribe_action_in_flight(&self) -> watch::Receiver<bool> {
        self.action_in_flight.subscribe()
    }

    pub fn subscribe_last_error(&self) -> watch::Receiver<Option<Arc<ResourceError>>> {
        self.last_error.subscribe()
    }

    // ── Message log ──────────────────────────────────────────────────

    /// Oldest first.
    pub fn messages(&self) -> Vec<Arc<LogEntry>> {
        self.lock_log().snapshot()
    }

    pub fn message_count(&self) -> usize {
        self.lock_log().len()
    }

    pub fn clear_messages(&self) {
        self.lock_log().clear();
    }

    /// Append a received document verbatim.
    pub(crate) fn log_inbound(&self, payload: Value) {
        let now = Utc::now();
        self.lock_log().push(LogEntry {
            received_at: now,
            direction: Direction::Inbound,
            payload,
        });
        self.last_message.send_replace(Some(now));
    }

    /// Record an action this client issued.
    pub(crate) fn log_client_action(&self, payload: Value) {
        self.lock_log().push(LogEntry {
            received_at: Utc::now(),
            direction: Direction::Client,
            payload,
        });
    }

    fn lock_log(&self) -> std::sync::MutexGuard<'_, MessageLog> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Applying inbound messages ────────────────────────────────────

    /// Fold one normalized message into the store.
    ///
    /// Returns `true` when the message lit an activity pulse, so the
    /// caller can (re)schedule the reset.
    pub fn apply(&self, message: &InboundMessage) -> bool {
        match message {
            InboundMessage::Auth(event) => {
                self.apply_auth(event);
                false
            }
            InboundMessage::Service(update)
            | InboundMessage::ResourceUpdate(update)
            | InboundMessage::Legacy(update) => {
                self.apply_update(update);
                false
            }
            InboundMessage::Activity(kind) => {
                self.pulse(kind);
                true
            }
            InboundMessage::TimerTick(tick) => {
                self.timer.send_modify(|timer| {
                    timer.remaining_ms = tick.remaining_ms;
                    if let Some(max) = tick.max_ms {
                        timer.max_ms = max;
                    }
                });
                false
            }
            InboundMessage::ResourceError { service, content } => {
                let message = error_text(content);
                warn!(%service, %message, "Resource error reported by tracker");
                self.last_error.send_replace(Some(Arc::new(ResourceError {
                    service: *service,
                    message,
                    content: content.clone(),
                    at: Utc::now(),
                })));
                self.action_in_flight.send_replace(false);
                false
            }
            InboundMessage::Content(update) => self.apply_content(update),
            InboundMessage::Unrecognized(_) => false,
        }
    }

    fn apply_auth(&self, event: &AuthEvent) {
        match event {
            AuthEvent::PasswordStatus { initial_setup } => {
                self.auth.send_modify(|auth| auth.initial_setup = *initial_setup);
            }
            AuthEvent::PasswordVerified(resp) => {
                self.auth.send_modify(|auth| login_result(auth, resp, INVALID_PASSWORD));
            }
            AuthEvent::PasswordCreated(resp) => {
                self.auth.send_modify(|auth| {
                    login_result(auth, resp, PASSWORD_CREATE_FAILED);
                    if resp.success {
                        auth.initial_setup = false;
                    }
                });
            }
            AuthEvent::AuthKeyVerified(resp) => {
                self.auth.send_modify(|auth| {
                    if resp.success {
                        auth.authenticated = true;
                        auth.error = None;
                    } else {
                        debug!("Cached auth key rejected");
                        auth.authenticated = false;
                        auth.auth_key = None;
                    }
                });
            }
            AuthEvent::LoggedOut => self.clear_session(),
        }
    }

    fn apply_update(&self, update: &ServiceUpdate) {
        match update {
            ServiceUpdate::Ec2 {
                instances,
                settles_action,
            } => {
                if let Some(instances) = instances {
                    self.ec2.replace(instances.clone());
                }
                if *settles_action {
                    self.action_in_flight.send_replace(false);
                }
            }
            ServiceUpdate::Ecs(clusters) => self.ecs.replace(clusters.clone()),
            ServiceUpdate::Eks(clusters) => self.eks.replace(clusters.clone()),
            ServiceUpdate::ActivityPatch(patch) => self.merge_activity(patch),
            ServiceUpdate::ActivityReplace(status) => {
                self.activity.send_modify(|current| {
                    let user_active = current.user_active;
                    *current = status.clone();
                    current.user_active = user_active;
                });
            }
        }
    }

    fn apply_content(&self, update: &ContentUpdate) -> bool {
        if let Some(instances) = &update.instances {
            self.ec2.replace(instances.clone());
        }
        if let Some(clusters) = &update.ecs_clusters {
            self.ecs.replace(clusters.clone());
        }
        if let Some(clusters) = &update.eks_clusters {
            self.eks.replace(clusters.clone());
        }
        match &update.activity {
            Some(ContentActivity::Pulse(kind)) => {
                self.pulse(kind);
                true
            }
            Some(ContentActivity::Patch(patch)) => {
                self.merge_activity(patch);
                false
            }
            None => false,
        }
    }

    fn pulse(&self, kind: &ActivityKind) {
        self.activity.send_modify(|status| status.pulse(kind));
    }

    fn merge_activity(&self, patch: &Map<String, Value>) {
        self.activity.send_if_modified(|status| match status.merge(patch) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Malformed activity payload dropped");
                false
            }
        });
    }

    // ── Local mutations ──────────────────────────────────────────────

    /// End of the activity pulse window.
    pub(crate) fn clear_pulse(&self) {
        self.activity.send_modify(ActivityStatus::clear_pulse);
    }

    /// Forget everything tied to the live link. Auth state survives so the
    /// cached key can be re-verified on the next open.
    pub(crate) fn reset_on_disconnect(&self) {
        self.ec2.clear();
        self.ecs.clear();
        self.eks.clear();
        self.activity.send_replace(ActivityStatus::default());
        self.timer.send_replace(TimerState::default());
        self.action_in_flight.send_replace(false);
    }

    /// Claim the single in-flight action slot. Returns `false` if an
    /// action is already pending.
    pub(crate) fn try_begin_action(&self) -> bool {
        self.action_in_flight.send_if_modified(|busy| {
            if *busy {
                false
            } else {
                *busy = true;
                true
            }
        })
    }

    pub(crate) fn end_action(&self) {
        self.action_in_flight.send_replace(false);
    }

    /// Optimistically set an instance's state ahead of the tracker.
    pub(crate) fn set_instance_state(&self, id: &str, state: InstanceState) -> bool {
        self.ec2
            .update_first(|i| i.id == id, |i| i.state = state)
    }

    pub(crate) fn clear_session(&self) {
        self.auth.send_modify(|auth| {
            auth.authenticated = false;
            auth.auth_key = None;
        });
    }

    pub(crate) fn set_auth_error(&self, message: impl Into<String>) {
        let message = message.into();
        self.auth.send_modify(|auth| auth.error = Some(message));
    }
}

impl Default for DataStore {
    fn default() -> Self {
        Self::new(super::DEFAULT_LOG_CAPACITY)
    }
}

fn login_result(auth: &mut AuthState, resp: &AuthResponse, fallback: &str) {
    if resp.success {
        auth.authenticated = true;
        auth.error = None;
        if let Some(key) = resp.key() {
            auth.auth_key = Some(key);
        }
    } else {
        auth.authenticated = false;
        auth.error = Some(resp.error.clone().unwrap_or_else(|| fallback.to_owned()));
    }
}

fn error_text(content: &Value) -> String {
    ["message", "error"]
        .iter()
        .find_map(|key| content.get(*key).and_then(Value::as_str))
        .map_or_else(|| content.to_string(), str::to_owned)
}
