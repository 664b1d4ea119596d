//! Multi-account session engine for the farm game gateway.
//!
//! Each account gets its own [`Client`]: one websocket link, request/response
//! correlation, server push fan-out, and a live [`SessionState`]. Clients share
//! nothing, so many accounts can run side by side in one process.

pub mod config;
pub mod connection;
mod correlator;
pub mod dispatcher;
pub mod error;
pub mod proto;
pub mod reporter;
pub mod session;
pub mod transport;

#[cfg(test)]
mod testkit;

pub use config::{AccountContext, GatewayConfig, Platform};
pub use connection::{Client, ClientStats, ConnectionState, DisconnectCallback};
pub use dispatcher::{EventName, Handler, PushEvent};
pub use error::{CallError, ConfigError, ConnectError, DisconnectReason, TransportError};
pub use frames::{CodecError, Frame, ServiceMethod};
pub use reporter::Reporter;
pub use session::{ResourceTotals, SessionState};
pub use transport::{Connector, Socket, WsConnector};
