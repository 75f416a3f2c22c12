// ── Typed request facades ──
//
// Thin, borrowed views over a `Dashboard`. Each one checks the link
// before sending and never queues or retries.

mod activity;
mod aws;
mod session;

pub use activity::ActivityApi;
pub use aws::{AwsApi, InstanceAction};
pub use session::{MIN_PASSWORD_LEN, SessionApi};

use serde_json::{Map, Value};

/// Per-request overrides merged into the outgoing message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOptions {
    pub region: Option<String>,
}

impl RequestOptions {
    pub fn region(region: impl Into<String>) -> Self {
        Self {
            region: Some(region.into()),
        }
    }

    /// Insert every set option into `target`. Caller fields win.
    pub(crate) fn merge_into(&self, target: &mut Map<String, Value>) {
        if let Some(region) = &self.region {
            target
                .entry("region")
                .or_insert_with(|| Value::String(region.clone()));
        }
    }
}
