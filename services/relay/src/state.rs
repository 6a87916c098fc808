//! Shared Application State
//!
//! This module defines the `AppState` struct, which owns the relay registry and
//! the shutdown token every connection handler observes.

use crate::registry::RelayRegistry;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

/// The shared application state, created once at startup and passed to all handlers.
pub struct AppState {
    pub registry: RelayRegistry,
    /// Cancelled when the relay shuts down; each handler watches a child token.
    pub shutdown: CancellationToken,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(shutdown: CancellationToken) -> Self {
        Self {
            registry: RelayRegistry::new(),
            shutdown,
            started_at: Utc::now(),
        }
    }
}
