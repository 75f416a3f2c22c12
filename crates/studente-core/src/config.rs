// ── Runtime dashboard configuration ──
//
// These types describe how the dashboard connects and behaves. They never
// touch disk: the CLI builds a `DashboardConfig` from its profile and
// hands it in.

use std::time::Duration;

use studente_api::ConnectionConfig;

use crate::store::DEFAULT_LOG_CAPACITY;

/// Region used for instance actions when none is given.
pub const DEFAULT_REGION: &str = "ap-northeast-2";

/// How long an activity flag stays lit after an event.
pub const DEFAULT_PULSE_WINDOW: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardConfig {
    pub connection: ConnectionConfig,
    /// AWS region for instance start/stop requests.
    pub region: String,
    pub pulse_window: Duration,
    /// Message log capacity; the oldest entry is evicted first.
    pub log_capacity: usize,
    /// Reconnect automatically after a lost link.
    pub auto_reconnect: bool,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::default(),
            region: DEFAULT_REGION.into(),
            pulse_window: DEFAULT_PULSE_WINDOW,
            log_capacity: DEFAULT_LOG_CAPACITY,
            auto_reconnect: true,
        }
    }
}
