// studente-api: Reconnecting WebSocket client for the Studente activity tracker

pub mod connection;
pub mod error;
pub mod message;
pub mod transport;

pub use connection::{
    ConnectionConfig, ConnectionManager, ConnectionState, DisconnectReason, ReconnectConfig,
};
pub use error::Error;
pub use message::{Formatted, WireMessage, format_message, format_message_at};
pub use transport::{Connector, Frame, Link, TransportEvent, WsConnector};
