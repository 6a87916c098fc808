//! Axum Handlers for the REST API
//!
//! The relay exposes a single read-only status route next to the WebSocket
//! endpoint. It uses `utoipa` doc comments to generate OpenAPI documentation.

use axum::{extract::State, response::Json};
use chrono::Utc;
use std::sync::Arc;

use crate::{models::RelayStatus, state::AppState};

/// Report how many participants are connected and how long the relay has run.
#[utoipa::path(
    get,
    path = "/status",
    responses(
        (status = 200, description = "Current relay status", body = RelayStatus)
    )
)]
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<RelayStatus> {
    let connections = state.registry.len().await;
    let uptime_secs = (Utc::now() - state.started_at).num_seconds();
    Json(RelayStatus {
        connections,
        started_at: state.started_at,
        uptime_secs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Connection;
    use async_trait::async_trait;
    use tokio_util::sync::CancellationToken;
    use uuid::Uuid;

    struct NullConnection;

    #[async_trait]
    impl Connection for NullConnection {
        async fn send(&self, _text: &str) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_status_counts_connections() {
        let state = Arc::new(AppState::new(CancellationToken::new()));
        state
            .registry
            .register(Uuid::new_v4(), Arc::new(NullConnection))
            .await
            .unwrap();

        let Json(status) = get_status(State(state.clone())).await;
        assert_eq!(status.connections, 1);
        assert_eq!(status.started_at, state.started_at);
        assert!(status.uptime_secs >= 0);
    }
}
