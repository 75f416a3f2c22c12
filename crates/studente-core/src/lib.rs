// studente-core: Dashboard state, message normalization and typed requests
// on top of the studente-api connection manager.

pub mod api;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod inbound;
pub mod model;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use api::{ActivityApi, AwsApi, InstanceAction, RequestOptions, SessionApi};
pub use config::{DEFAULT_PULSE_WINDOW, DEFAULT_REGION, DashboardConfig};
pub use dashboard::Dashboard;
pub use error::CoreError;
pub use inbound::{InboundMessage, classify};
pub use store::{DataStore, Direction, LogEntry, ResourceError};
pub use stream::{EntityStream, InstanceFilter};

// Connection types consumers need alongside the dashboard.
pub use studente_api::{ConnectionConfig, ConnectionState, DisconnectReason, ReconnectConfig};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    ActivityKind, ActivityStatus, AuthState, Ec2Instance, EcsCluster, EksCluster, InstanceState,
    Service, TimerLevel, TimerState,
};
