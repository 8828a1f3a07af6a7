//! WebSocket Gateway
//!
//! Real-time delivery over WebSocket connections.

pub mod gateway;
pub mod handler;
pub mod messages;
pub mod session;

pub use gateway::ConnectionHub;
pub use handler::{authenticate_connection, disconnect, handle_frame, ws_handler};
pub use messages::{GatewayError, GatewayReceive, InboundMessage};
pub use session::SessionState;
