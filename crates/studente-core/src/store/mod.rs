// ── Reactive dashboard store ──
//
// Snapshot storage with push-based change notification.

mod collection;
mod data_store;
mod message_log;

pub use data_store::{DataStore, ResourceError};
pub use message_log::{DEFAULT_LOG_CAPACITY, Direction, LogEntry};
