//! Chat Relay Library Crate
//!
//! This library contains the relay server: the connection registry, the
//! WebSocket handler that feeds it, the status API, configuration, and routing.
//! The `relay` binary is a thin wrapper around this library.

pub mod config;
pub mod handlers;
pub mod models;
pub mod registry;
pub mod router;
pub mod state;
pub mod ws;
