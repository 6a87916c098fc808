//! Manages the lifecycle of one relay connection.

use crate::{
    registry::{Connection, ConnectionId},
    state::AppState,
};
use anyhow::Result;
use async_trait::async_trait;
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, instrument, warn};
use uuid::Uuid;

/// Axum handler to upgrade an HTTP connection to a WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// The outbound half of an accepted WebSocket.
pub struct WsConnection {
    sink: Mutex<SplitSink<WebSocket, Message>>,
}

impl WsConnection {
    pub fn new(sink: SplitSink<WebSocket, Message>) -> Self {
        Self {
            sink: Mutex::new(sink),
        }
    }

    async fn close(&self) {
        let _ = self.sink.lock().await.close().await;
    }
}

#[async_trait]
impl Connection for WsConnection {
    async fn send(&self, text: &str) -> Result<()> {
        self.sink
            .lock()
            .await
            .send(Message::Text(text.into()))
            .await?;
        Ok(())
    }
}

/// Main handler for an individual WebSocket connection.
///
/// Registers the connection, relays its messages until it ends, and always
/// unregisters it afterwards. The relay loop runs in its own task so that even
/// a panic inside it cannot skip the unregistration.
#[instrument(name = "relay_connection", skip_all, fields(connection_id))]
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let connection_id = Uuid::new_v4();
    tracing::Span::current().record("connection_id", tracing::field::display(connection_id));

    let (sink, stream) = socket.split();
    let connection = Arc::new(WsConnection::new(sink));
    if let Err(e) = state
        .registry
        .register(connection_id, connection.clone())
        .await
    {
        error!(error = %e, "Failed to register connection");
        return;
    }

    let cancel = state.shutdown.child_token();
    let relay = tokio::spawn(
        relay_messages(state.clone(), connection_id, stream, cancel)
            .instrument(tracing::Span::current()),
    );
    if let Err(e) = relay.await {
        error!(error = ?e, "Relay task aborted");
    }

    state.registry.unregister(connection_id).await;
    connection.close().await;
    info!("Connection closed");
}

/// Reads inbound frames and broadcasts each text message to every other peer.
///
/// Each broadcast completes before the next frame is read, which keeps
/// per-connection ordering intact for every recipient.
async fn relay_messages(
    state: Arc<AppState>,
    connection_id: ConnectionId,
    mut stream: SplitStream<WebSocket>,
    cancel: CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => {
                info!("Relay shutting down; closing connection");
                break;
            }
            frame = stream.next() => frame,
        };

        match frame {
            Some(Ok(Message::Text(text))) => {
                let delivered = state.registry.broadcast(text.as_str(), connection_id).await;
                debug!(delivered, "Relayed message");
            }
            Some(Ok(Message::Binary(_))) => warn!("Ignoring binary frame"),
            Some(Ok(Message::Close(_))) => {
                info!("Client sent close frame");
                break;
            }
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
            Some(Err(e)) => {
                warn!(error = %e, "Error receiving from client WebSocket");
                break;
            }
            None => break,
        }
    }
}
