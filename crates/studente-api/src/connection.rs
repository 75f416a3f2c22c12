//! Single logical connection to the tracker, with auto-reconnect.
//!
//! [`ConnectionManager`] owns at most one live [`Link`] at a time. It opens
//! the link through a [`Connector`], reconnects with exponential backoff
//! when the link drops, probes liveness with a periodic `PING`, and hands
//! every parsed inbound JSON document to a single message handler.
//!
//! All state lives behind one short, non-async critical section; tasks
//! (session reader, heartbeat, reconnect timer) are `JoinHandle`s the
//! manager aborts on teardown. A per-link epoch lets late events from a
//! torn-down link be ignored.
//!
//! # Example
//!
//! ```rust,ignore
//! use studente_api::{ConnectionConfig, ConnectionManager};
//!
//! let manager = ConnectionManager::websocket(ConnectionConfig::default())?;
//! manager.set_message_handler(|msg| println!("{msg}"));
//! manager.connect();
//!
//! // ...
//! manager.disconnect();
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use serde_json::{Value, json};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};
use url::Url;

use crate::error::Error;
use crate::message::{format_message, kind};
use crate::transport::{Connector, Frame, Link, TransportEvent, WsConnector};

/// Port the tracker listens on unless configured otherwise.
pub const DEFAULT_PORT: u16 = 20201;

/// Close code a server sends when it hit an internal error.
const CLOSE_INTERNAL_ERROR: u16 = 1011;

const STATE_CHANNEL_CAPACITY: usize = 64;

// ── ConnectionState ──────────────────────────────────────────────────

/// Lifecycle of the logical connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Why the disconnect callback fired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// [`ConnectionManager::disconnect`] was called.
    Requested,
    /// The handshake failed or timed out, the peer closed, or the link died.
    TransportLost(String),
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for reconnection.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 2s.
    pub initial_delay: Duration,

    /// Growth factor applied per attempt. Default: 1.5.
    pub multiplier: f64,

    /// Upper bound on the delay between attempts. Default: 30s.
    pub max_delay: Duration,

    /// Give up after this many scheduled retries. `None` retries forever.
    /// Default: 10.
    pub max_attempts: Option<u32>,

    /// When `false`, every retry waits `initial_delay`.
    pub backoff: bool,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(2),
            multiplier: 1.5,
            max_delay: Duration::from_secs(30),
            max_attempts: Some(10),
            backoff: true,
        }
    }
}

impl ReconnectConfig {
    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        calculate_backoff(attempt, self)
    }

    fn exhausted(&self, attempts: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempts > max)
    }
}

// ── ConnectionConfig ─────────────────────────────────────────────────

/// Where to connect and how to keep the link alive.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    /// Request path, including the leading slash. Default: `/ws`.
    pub path: String,
    /// A connect that neither opens nor fails within this window counts
    /// as a failure. Default: 5s.
    pub handshake_timeout: Duration,
    /// Interval between `PING` probes. `None` disables the heartbeat.
    /// Default: 30s.
    pub heartbeat_interval: Option<Duration>,
    pub reconnect: ReconnectConfig,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: DEFAULT_PORT,
            path: "/ws".into(),
            handshake_timeout: Duration::from_secs(5),
            heartbeat_interval: Some(Duration::from_secs(30)),
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl ConnectionConfig {
    /// `ws://<host>:<port><path>`
    pub fn url(&self) -> Result<Url, Error> {
        Ok(Url::parse(&format!(
            "ws://{}:{}{}",
            self.host, self.port, self.path
        ))?)
    }
}

// ── ConnectionManager ────────────────────────────────────────────────

type MessageHandler = Arc<dyn Fn(Value) + Send + Sync>;
type DisconnectCallback = Arc<dyn Fn(DisconnectReason) + Send + Sync>;

/// Cloneable handle to one logical connection.
///
/// Every method must be called from inside a tokio runtime. The background
/// tasks keep the manager alive; call [`disconnect`](Self::disconnect) to
/// stop them.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

struct Inner {
    config: ConnectionConfig,
    url: Url,
    connector: Arc<dyn Connector>,
    state: Mutex<State>,
    state_tx: broadcast::Sender<ConnectionState>,
}

struct State {
    phase: ConnectionState,
    /// Bumped for every new link and on explicit disconnect.
    epoch: u64,
    outbound: Option<mpsc::UnboundedSender<Frame>>,
    attempts: u32,
    auto_reconnect: bool,
    /// Pending retry, tagged so a timer that already fired can tell it was
    /// cancelled.
    reconnect_timer: Option<(u64, JoinHandle<()>)>,
    timer_seq: u64,
    heartbeat: Option<JoinHandle<()>>,
    session: Option<JoinHandle<()>>,
    on_message: Option<MessageHandler>,
    on_disconnect: Option<DisconnectCallback>,
}

impl State {
    fn new() -> Self {
        Self {
            phase: ConnectionState::Disconnected,
            epoch: 0,
            outbound: None,
            attempts: 0,
            auto_reconnect: true,
            reconnect_timer: None,
            timer_seq: 0,
            heartbeat: None,
            session: None,
            on_message: None,
            on_disconnect: None,
        }
    }

    /// Drop the link and stop the tasks bound to it.
    fn teardown_link(&mut self) {
        self.outbound = None;
        if let Some(handle) = self.heartbeat.take() {
            handle.abort();
        }
        if let Some(handle) = self.session.take() {
            handle.abort();
        }
    }

    fn cancel_reconnect(&mut self) -> bool {
        match self.reconnect_timer.take() {
            Some((_, handle)) => {
                handle.abort();
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("url", &self.inner.url.as_str())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl ConnectionManager {
    /// Create a disconnected manager that opens links through `connector`.
    pub fn new<C: Connector>(config: ConnectionConfig, connector: C) -> Result<Self, Error> {
        let url = config.url()?;
        let (state_tx, _) = broadcast::channel(STATE_CHANNEL_CAPACITY);
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                url,
                connector: Arc::new(connector),
                state: Mutex::new(State::new()),
                state_tx,
            }),
        })
    }

    /// Create a manager that speaks plain WebSocket.
    pub fn websocket(config: ConnectionConfig) -> Result<Self, Error> {
        Self::new(config, WsConnector)
    }

    pub fn url(&self) -> &Url {
        &self.inner.url
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.inner.config
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Open the connection.
    ///
    /// No-op while connecting, connected, or waiting on a scheduled retry.
    /// Once the retry budget is spent, an explicit call starts a fresh one.
    pub fn connect(&self) {
        let mut st = self.inner.lock();
        if self.inner.config.reconnect.exhausted(st.attempts) {
            debug!(attempts = st.attempts, "Resetting exhausted reconnect budget");
            st.attempts = 0;
        }
        self.inner.start_connect(&mut st);
    }

    /// Close the connection and stay closed.
    ///
    /// Disables auto-reconnect, cancels any pending retry and the heartbeat,
    /// and drops the link. Idempotent: the disconnect callback fires with
    /// [`DisconnectReason::Requested`] only if a link was open or opening.
    pub fn disconnect(&self) {
        let callback = {
            let mut st = self.inner.lock();
            st.auto_reconnect = false;
            st.cancel_reconnect();
            let was_active = st.phase != ConnectionState::Disconnected;
            st.teardown_link();
            st.epoch = st.epoch.wrapping_add(1);
            self.inner.set_phase(&mut st, ConnectionState::Disconnected);
            if was_active {
                info!("WebSocket closed by request");
                st.on_disconnect.clone()
            } else {
                None
            }
        };

        if let Some(callback) = callback {
            callback(DisconnectReason::Requested);
        }
    }

    /// Toggle automatic reconnection.
    ///
    /// Enabling while disconnected with no retry pending starts a connect.
    /// Disabling cancels a pending retry.
    pub fn set_auto_reconnect(&self, enable: bool) {
        let mut st = self.inner.lock();
        st.auto_reconnect = enable;
        info!(enabled = enable, "Auto-reconnect toggled");

        if enable {
            if st.phase == ConnectionState::Disconnected && st.reconnect_timer.is_none() {
                self.inner.start_connect(&mut st);
            }
        } else if st.cancel_reconnect() {
            debug!("Pending reconnect cancelled");
        }
    }

    // ── Sending ──────────────────────────────────────────────────────

    /// Canonicalize `data` and send it.
    ///
    /// Returns `false` when the connection is not open (and kicks off a
    /// connect), or when the frame could not be serialized or written. A
    /// write into a closed link is handled as a lost connection.
    /// Nothing is queued.
    pub fn send(&self, data: &Value) -> bool {
        match format_message(data).into_frame() {
            Ok(frame) => self.send_text(frame),
            Err(e) => {
                error!(error = %e, "Failed to serialize outbound message");
                false
            }
        }
    }

    /// Send an already-serialized text frame.
    pub fn send_text(&self, frame: String) -> bool {
        let mut st = self.inner.lock();

        if st.phase == ConnectionState::Connected {
            let sent = st
                .outbound
                .as_ref()
                .map(|tx| tx.send(Frame::Text(frame)).is_ok());
            match sent {
                Some(true) => {
                    trace!("Frame sent");
                    return true;
                }
                Some(false) => {
                    warn!("WebSocket send failed: link closed");
                    let epoch = st.epoch;
                    drop(st);
                    self.inner.handle_disconnect(
                        epoch,
                        DisconnectReason::TransportLost("send failed: link closed".into()),
                    );
                    return false;
                }
                None => {}
            }
        }

        warn!("WebSocket is not connected, message dropped");
        if st.phase == ConnectionState::Disconnected && st.reconnect_timer.is_none() {
            info!("Attempting to connect");
            self.inner.start_connect(&mut st);
        }
        false
    }

    // ── Observers ────────────────────────────────────────────────────

    /// `true` iff a link exists, has completed its handshake, and is open.
    pub fn is_connected(&self) -> bool {
        let st = self.inner.lock();
        st.phase == ConnectionState::Connected
            && st.outbound.as_ref().is_some_and(|tx| !tx.is_closed())
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.lock().phase
    }

    /// Retries scheduled since the last successful open.
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.lock().attempts
    }

    pub fn is_reconnect_pending(&self) -> bool {
        self.inner.lock().reconnect_timer.is_some()
    }

    /// Every state transition, in order.
    pub fn subscribe_state(&self) -> broadcast::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    /// Install the handler that receives every parsed inbound document.
    /// Replaces any previous handler.
    pub fn set_message_handler<F>(&self, handler: F)
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        self.inner.lock().on_message = Some(Arc::new(handler));
    }

    /// Install the single disconnect observer. Replaces any previous one.
    pub fn set_disconnect_callback<F>(&self, callback: F)
    where
        F: Fn(DisconnectReason) + Send + Sync + 'static,
    {
        self.inner.lock().on_disconnect = Some(Arc::new(callback));
    }
}

// ── Internals ────────────────────────────────────────────────────────

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_phase(&self, st: &mut State, phase: ConnectionState) {
        if st.phase != phase {
            st.phase = phase;
            // No receivers is fine.
            let _ = self.state_tx.send(phase);
        }
    }

    /// Start a handshake unless one is running, the link is up, or a retry
    /// is already scheduled.
    fn start_connect(self: &Arc<Self>, st: &mut State) -> bool {
        if st.phase != ConnectionState::Disconnected {
            debug!(state = ?st.phase, "Connect skipped: already active");
            return false;
        }
        if st.reconnect_timer.is_some() {
            debug!("Connect skipped: reconnect already scheduled");
            return false;
        }

        st.teardown_link();
        st.epoch = st.epoch.wrapping_add(1);
        let epoch = st.epoch;
        self.set_phase(st, ConnectionState::Connecting);

        let inner = Arc::clone(self);
        st.session = Some(tokio::spawn(async move {
            inner.run_session(epoch).await;
        }));
        true
    }

    /// Handshake, then read until the link ends.
    async fn run_session(self: Arc<Self>, epoch: u64) {
        let timeout = self.config.handshake_timeout;
        let link = match tokio::time::timeout(timeout, self.connector.connect(&self.url)).await {
            Ok(Ok(link)) => link,
            Ok(Err(e)) => {
                warn!(error = %e, url = %self.url, "WebSocket connect failed");
                self.handle_disconnect(epoch, DisconnectReason::TransportLost(e.to_string()));
                return;
            }
            Err(_) => {
                let e = Error::HandshakeTimeout {
                    timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                };
                warn!(error = %e, url = %self.url, "WebSocket connect failed");
                self.handle_disconnect(epoch, DisconnectReason::TransportLost(e.to_string()));
                return;
            }
        };

        let Link {
            outbound,
            mut inbound,
        } = link;
        if !self.on_open(epoch, outbound) {
            return;
        }

        let reason = loop {
            match inbound.recv().await {
                Some(TransportEvent::Frame(frame)) => self.dispatch(epoch, frame),
                Some(TransportEvent::Closed { code, reason }) => {
                    if code == Some(CLOSE_INTERNAL_ERROR) {
                        warn!(reason = %reason, "WebSocket closed: server internal error");
                    } else {
                        info!(code = ?code, reason = %reason, "WebSocket closed by server");
                    }
                    break match code {
                        Some(code) => Error::WebSocketClosed { code, reason }.to_string(),
                        None => format!("WebSocket closed: {reason}"),
                    };
                }
                Some(TransportEvent::Error(e)) => {
                    warn!(error = %e, "WebSocket error");
                    break e.to_string();
                }
                None => break Error::LinkClosed.to_string(),
            }
        };

        self.handle_disconnect(epoch, DisconnectReason::TransportLost(reason));
    }

    fn on_open(self: &Arc<Self>, epoch: u64, outbound: mpsc::UnboundedSender<Frame>) -> bool {
        let mut st = self.lock();
        if st.epoch != epoch || st.phase != ConnectionState::Connecting {
            debug!("Dropping link opened for a stale connect");
            return false;
        }

        st.outbound = Some(outbound);
        st.attempts = 0;
        st.cancel_reconnect();
        self.set_phase(&mut st, ConnectionState::Connected);

        if let Some(interval) = self.config.heartbeat_interval {
            let inner = Arc::clone(self);
            st.heartbeat = Some(tokio::spawn(async move {
                inner.heartbeat(epoch, interval).await;
            }));
        }

        info!(url = %self.url, "WebSocket connected");
        true
    }

    fn dispatch(&self, epoch: u64, frame: Frame) {
        let text = match frame.into_text() {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Dropping undecodable frame");
                return;
            }
        };

        let value: Value = match serde_json::from_str(&text) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "Failed to parse WebSocket message");
                trace!(raw = %text, "Unparseable frame");
                return;
            }
        };

        let handler = {
            let st = self.lock();
            if st.epoch != epoch {
                return;
            }
            st.on_message.clone()
        };

        match handler {
            Some(handler) => handler(value),
            None => trace!("No message handler installed, frame dropped"),
        }
    }

    async fn heartbeat(self: Arc<Self>, epoch: u64, interval: Duration) {
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if !self.probe(epoch) {
                break;
            }
        }
    }

    /// Send one `PING`. A link that is gone counts as a disconnect.
    fn probe(self: &Arc<Self>, epoch: u64) -> bool {
        let sent = {
            let st = self.lock();
            if st.epoch != epoch {
                return false;
            }
            let ping = json!({
                "type": kind::PING,
                "timestamp": Utc::now().timestamp_millis(),
            });
            st.outbound
                .as_ref()
                .filter(|_| st.phase == ConnectionState::Connected)
                .is_some_and(|tx| tx.send(Frame::Text(ping.to_string())).is_ok())
        };

        if sent {
            trace!("Heartbeat ping sent");
        } else {
            warn!("Heartbeat found the link closed");
            self.handle_disconnect(
                epoch,
                DisconnectReason::TransportLost("heartbeat probe failed".into()),
            );
        }
        sent
    }

    /// Move to `Disconnected` once per link, schedule a retry, notify.
    fn handle_disconnect(self: &Arc<Self>, epoch: u64, reason: DisconnectReason) {
        let callback = {
            let mut st = self.lock();
            if st.epoch != epoch || st.phase == ConnectionState::Disconnected {
                return;
            }

            st.teardown_link();
            self.set_phase(&mut st, ConnectionState::Disconnected);

            if st.auto_reconnect && st.reconnect_timer.is_none() {
                self.schedule_reconnect(&mut st);
            }
            st.on_disconnect.clone()
        };

        info!(reason = ?reason, "WebSocket disconnected");
        if let Some(callback) = callback {
            callback(reason);
        }
    }

    fn schedule_reconnect(self: &Arc<Self>, st: &mut State) {
        st.attempts = st.attempts.saturating_add(1);
        let attempt = st.attempts;

        if self.config.reconnect.exhausted(attempt) {
            error!(
                max_attempts = ?self.config.reconnect.max_attempts,
                "Reconnect limit reached, giving up"
            );
            return;
        }

        let delay = self.config.reconnect.delay_for(attempt);
        info!(
            attempt,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "Scheduling reconnect"
        );

        st.timer_seq = st.timer_seq.wrapping_add(1);
        let seq = st.timer_seq;
        let inner = Arc::clone(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            inner.fire_reconnect(seq);
        });
        st.reconnect_timer = Some((seq, handle));
    }

    fn fire_reconnect(self: &Arc<Self>, seq: u64) {
        let mut st = self.lock();
        match st.reconnect_timer {
            Some((pending, _)) if pending == seq => st.reconnect_timer = None,
            _ => return,
        }
        if st.phase == ConnectionState::Connecting {
            return;
        }
        debug!(attempt = st.attempts, "Reconnect timer fired");
        self.start_connect(&mut st);
    }
}

/// `min(max_delay, initial_delay * multiplier^(attempt - 1))`
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    if !config.backoff {
        return config.initial_delay;
    }

    let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
    let base = config.initial_delay.as_secs_f64() * config.multiplier.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64()).max(0.0);

    Duration::from_secs_f64(capped)
}

// ── Tests ────────────────────────────────────────────────────────────
