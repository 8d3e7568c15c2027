//! Synchronization layer: wire protocol, connection hub and the WebSocket
//! server that drives them.

pub mod hub;
pub mod protocol;
pub mod rate_limit;
pub mod sender;
pub mod websocket;

pub use hub::{ConnectionState, Hub, HubSettings, RATE_LIMIT_MESSAGE};
pub use protocol::{ClientMessage, ProtocolError, ServerMessage};
pub use rate_limit::{RateLimitConfig, RateLimiter};
pub use sender::{Frame, Sender, TransportError};
pub use websocket::{lock_hub, ServerOptions, SharedHub, WebSocketServer, SHUTDOWN_MESSAGE};
