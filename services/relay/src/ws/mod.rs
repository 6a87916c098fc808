//! WebSocket Relay Endpoint
//!
//! Every participant (the human's terminal or the agent) connects to `/ws`.
//! Text frames are relayed verbatim to all other open connections.

pub mod session;

pub use session::ws_handler;
