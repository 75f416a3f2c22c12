// ── Dashboard ──
//
// Lifecycle owner for one tracker connection. Wires the connection
// manager's callbacks into the normalizer and the DataStore, runs the
// activity pulse timer, and re-establishes the session after every open.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use serde_json::Value;
use studente_api::{
    ConnectionManager, ConnectionState, Connector, DisconnectReason, WsConnector,
};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::api::{ActivityApi, AwsApi, SessionApi};
use crate::config::DashboardConfig;
use crate::error::CoreError;
use crate::inbound::{InboundMessage, classify};
use crate::store::DataStore;

const UPDATE_CHANNEL_SIZE: usize = 256;

// ── Dashboard ────────────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable. Owns the [`ConnectionManager`], the [`DataStore`],
/// and a broadcast of every normalized inbound message.
#[derive(Clone)]
pub struct Dashboard {
    inner: Arc<DashboardInner>,
}

struct DashboardInner {
    config: DashboardConfig,
    connection: ConnectionManager,
    store: Arc<DataStore>,
    updates: broadcast::Sender<Arc<InboundMessage>>,
    pulse: Arc<Mutex<PulseTimer>>,
    cancel: CancellationToken,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

/// The single pending activity reset. `seq` lets a reset that already
/// woke up notice it has been superseded.
#[derive(Default)]
struct PulseTimer {
    seq: u64,
    handle: Option<JoinHandle<()>>,
}

impl PulseTimer {
    fn cancel(&mut self) {
        self.seq = self.seq.wrapping_add(1);
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Dashboard {
    /// Dashboard over a real WebSocket. Does NOT connect: call
    /// [`connect()`](Self::connect).
    pub fn new(config: DashboardConfig) -> Result<Self, CoreError> {
        Self::with_connector(config, WsConnector)
    }

    /// Dashboard over an arbitrary transport.
    pub fn with_connector<C: Connector>(
        config: DashboardConfig,
        connector: C,
    ) -> Result<Self, CoreError> {
        let connection = ConnectionManager::new(config.connection.clone(), connector)?;
        if !config.auto_reconnect {
            connection.set_auto_reconnect(false);
        }

        let store = Arc::new(DataStore::new(config.log_capacity));
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_SIZE);

        let inner = Arc::new(DashboardInner {
            config,
            connection,
            store,
            updates,
            pulse: Arc::new(Mutex::new(PulseTimer::default())),
            cancel: CancellationToken::new(),
            watcher: Mutex::new(None),
        });

        let weak = Arc::downgrade(&inner);
        inner.connection.set_message_handler(move |raw| {
            if let Some(inner) = weak.upgrade() {
                inner.handle_message(raw);
            }
        });

        let weak = Arc::downgrade(&inner);
        inner.connection.set_disconnect_callback(move |reason| {
            if let Some(inner) = weak.upgrade() {
                inner.handle_disconnect(&reason);
            }
        });

        Ok(Self { inner })
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<DataStore> {
        &self.inner.store
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.inner.connection
    }

    // ── Facades ──────────────────────────────────────────────────────

    pub fn aws(&self) -> AwsApi<'_> {
        AwsApi::new(self)
    }

    pub fn activity(&self) -> ActivityApi<'_> {
        ActivityApi::new(self)
    }

    pub fn session(&self) -> SessionApi<'_> {
        SessionApi::new(self)
    }

    // ── Connection lifecycle ─────────────────────────────────────────

    /// Start connecting and keep the session in sync with the link.
    ///
    /// Must be called from within a tokio runtime. Returns immediately;
    /// use [`wait_connected`](Self::wait_connected) or
    /// [`subscribe_state`](Self::subscribe_state) to observe progress.
    pub fn connect(&self) {
        self.ensure_watcher();
        self.inner.connection.connect();
        if self.inner.config.auto_reconnect {
            // An explicit disconnect turns auto-reconnect off.
            self.inner.connection.set_auto_reconnect(true);
        }
    }

    /// Close the link and stay closed until the next `connect()`.
    pub fn disconnect(&self) {
        self.inner.connection.disconnect();
        self.inner.lock_pulse().cancel();
    }

    /// Disconnect and stop every background task. The dashboard cannot be
    /// reconnected afterwards.
    pub fn shutdown(&self) {
        self.inner.cancel.cancel();
        self.disconnect();
        if let Some(handle) = self.inner.lock_watcher().take() {
            handle.abort();
        }
        debug!("Dashboard shut down");
    }

    /// Wait until the link is open, or fail after `timeout`.
    pub async fn wait_connected(&self, timeout: Duration) -> Result<(), CoreError> {
        let mut states = self.inner.connection.subscribe_state();
        if self.inner.connection.is_connected() {
            return Ok(());
        }

        let wait = async {
            loop {
                match states.recv().await {
                    Ok(ConnectionState::Connected) => return Ok(()),
                    Ok(_) | Err(RecvError::Lagged(_)) => {
                        if self.inner.connection.is_connected() {
                            return Ok(());
                        }
                    }
                    Err(RecvError::Closed) => return Err(CoreError::NotConnected),
                }
            }
        };

        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| CoreError::ConnectionFailed {
                url: self.inner.connection.url().to_string(),
                reason: format!("not connected after {}ms", timeout.as_millis()),
            })?
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connection.is_connected()
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.connection.state()
    }

    pub fn subscribe_state(&self) -> broadcast::Receiver<ConnectionState> {
        self.inner.connection.subscribe_state()
    }

    /// Every normalized inbound message, in arrival order.
    pub fn subscribe_updates(&self) -> broadcast::Receiver<Arc<InboundMessage>> {
        self.inner.updates.subscribe()
    }

    pub fn clear_messages(&self) {
        self.inner.store.clear_messages();
    }

    /// Canonicalize and send an arbitrary request.
    pub fn send(&self, data: &Value) -> bool {
        self.inner.connection.send(data)
    }

    // ── Internals ────────────────────────────────────────────────────

    /// Spawn the state watcher once. It sends the session handshake after
    /// every `Connected` transition.
    fn ensure_watcher(&self) {
        let mut watcher = self.inner.lock_watcher();
        if watcher.as_ref().is_some_and(|h| !h.is_finished()) || self.inner.cancel.is_cancelled()
        {
            return;
        }

        let states = self.inner.connection.subscribe_state();
        let cancel = self.inner.cancel.clone();
        let weak = Arc::downgrade(&self.inner);
        *watcher = Some(tokio::spawn(state_watcher_task(weak, states, cancel)));
    }
}

impl DashboardInner {
    fn handle_message(&self, raw: Value) {
        let message = classify(&raw);
        trace!(category = message.category(), "Inbound message");
        if let InboundMessage::Unrecognized(_) = message {
            debug!("Unrecognized message shape, logged verbatim");
        }
        self.store.log_inbound(raw);

        {
            let mut pulse = self.lock_pulse();
            if self.store.apply(&message) {
                self.reschedule_pulse(&mut pulse);
            }
        }

        // No receivers is fine.
        let _ = self.updates.send(Arc::new(message));
    }

    fn handle_disconnect(&self, reason: &DisconnectReason) {
        match reason {
            DisconnectReason::Requested => debug!("Dashboard disconnected by request"),
            DisconnectReason::TransportLost(why) => {
                warn!(reason = %why, "Tracker connection lost");
            }
        }
        self.lock_pulse().cancel();
        self.store.reset_on_disconnect();
    }

    fn reschedule_pulse(&self, pulse: &mut PulseTimer) {
        pulse.cancel();
        let seq = pulse.seq;
        let window = self.config.pulse_window;
        let store = Arc::clone(&self.store);
        let timer = Arc::clone(&self.pulse);

        pulse.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(window).await;
            let mut pulse = timer.lock().unwrap_or_else(PoisonError::into_inner);
            if pulse.seq == seq {
                store.clear_pulse();
                pulse.handle = None;
            }
        }));
    }

    fn lock_pulse(&self) -> MutexGuard<'_, PulseTimer> {
        self.pulse.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_watcher(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.watcher.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Background tasks ─────────────────────────────────────────────────

async fn state_watcher_task(
    inner: Weak<DashboardInner>,
    mut states: broadcast::Receiver<ConnectionState>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            state = states.recv() => match state {
                Ok(ConnectionState::Connected) => {
                    let Some(inner) = inner.upgrade() else { break };
                    let dashboard = Dashboard { inner };
                    dashboard.on_connected();
                }
                Ok(state) => trace!(?state, "Connection state"),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "State watcher lagged");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
    debug!("State watcher stopped");
}

impl Dashboard {
    fn on_connected(&self) {
        info!(url = %self.inner.connection.url(), "Connected to tracker");
        let session = self.session();
        session.check_password_status();
        if self.inner.store.auth_key().is_some() {
            session.verify_auth_key();
        }
    }
}
