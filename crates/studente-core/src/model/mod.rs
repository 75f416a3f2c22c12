// ── Dashboard domain model ──
//
// Typed views of the payloads the tracker pushes: AWS resources, user
// activity, the session timer, and authentication state.

pub mod activity;
pub mod aws;
pub mod session;
pub mod timer;

pub use activity::{ActivityKind, ActivityStatus};
pub use aws::{Ec2Instance, EcsCluster, EksCluster, InstanceState, Service};
pub use session::{AuthResponse, AuthState};
pub use timer::{TimerLevel, TimerState};
