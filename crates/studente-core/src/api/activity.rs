use serde_json::json;
use studente_api::message::action;
use tracing::{info, warn};

use crate::dashboard::Dashboard;

/// Activity monitoring requests.
pub struct ActivityApi<'a> {
    dashboard: &'a Dashboard,
}

impl<'a> ActivityApi<'a> {
    pub(crate) fn new(dashboard: &'a Dashboard) -> Self {
        Self { dashboard }
    }

    /// Ask the tracker for a test round-trip.
    pub fn send_test(&self) -> bool {
        if !self.dashboard.is_connected() {
            warn!("Test message not sent: not connected");
            return false;
        }
        info!("Sending test message");
        self.dashboard.send(&json!({ "action": action::TEST }))
    }
}
