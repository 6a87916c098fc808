//! Relay Clients
//!
//! A participant connects to the relay in one of two roles. Both share the same
//! runtime: an inbound loop that hands every message to `on_message`, a
//! `send_loop` that produces outbound messages, and optional `background` work
//! bound to the connection's lifetime.

use crate::agent;
use crate::config::Config;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chatrelay_core::{MessageSink, TurnTaker};
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use std::{fmt, io::BufRead, str::FromStr, sync::Arc};
use tokio::{
    io::AsyncWriteExt,
    net::TcpStream,
    sync::{Mutex, mpsc},
};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ClientError {
    #[error("Unsupported client role '{0}': role must be 'user' or 'bot'")]
    UnsupportedRole(String),
}

/// The participant kinds the relay knows how to host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientRole {
    User,
    Bot,
}

impl FromStr for ClientRole {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "user" => Ok(ClientRole::User),
            // `gpt` is accepted as an alias for the bot.
            "bot" | "gpt" => Ok(ClientRole::Bot),
            _ => Err(ClientError::UnsupportedRole(s.to_string())),
        }
    }
}

impl fmt::Display for ClientRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientRole::User => write!(f, "user"),
            ClientRole::Bot => write!(f, "bot"),
        }
    }
}

/// The outbound half of the client's WebSocket.
pub struct WsSink {
    inner: Mutex<SplitSink<WsStream, Message>>,
}

impl WsSink {
    fn new(inner: SplitSink<WsStream, Message>) -> Self {
        Self {
            inner: Mutex::new(inner),
        }
    }

    async fn close(&self) {
        let _ = self.inner.lock().await.close().await;
    }
}

#[async_trait]
impl MessageSink for WsSink {
    async fn send_text(&self, text: String) -> Result<()> {
        self.inner.lock().await.send(Message::Text(text)).await?;
        Ok(())
    }
}

/// The human at the terminal.
pub struct UserClient;

/// The turn-taking agent.
pub struct BotClient {
    agent: Arc<TurnTaker>,
}

impl BotClient {
    pub fn new(agent: TurnTaker) -> Self {
        Self {
            agent: Arc::new(agent),
        }
    }

    pub fn agent(&self) -> &Arc<TurnTaker> {
        &self.agent
    }
}

/// A relay participant, selected once at construction.
pub enum ChatClient {
    User(UserClient),
    Bot(BotClient),
}

/// Builds the client for `role`, rejecting roles the relay does not support.
pub fn create_client(role: &str, config: &Config) -> Result<ChatClient> {
    let role: ClientRole = role.parse()?;
    let client = match role {
        ClientRole::User => ChatClient::User(UserClient),
        ClientRole::Bot => ChatClient::Bot(BotClient::new(agent::build_agent(config)?)),
    };
    Ok(client)
}

impl ChatClient {
    pub fn role(&self) -> ClientRole {
        match self {
            ChatClient::User(_) => ClientRole::User,
            ChatClient::Bot(_) => ClientRole::Bot,
        }
    }

    /// Connects to the relay at `uri` and runs until either side hangs up.
    pub async fn connect(self, uri: impl AsRef<str>) -> Result<()> {
        let uri = uri.as_ref();
        let (ws, _) = connect_async(uri)
            .await
            .with_context(|| format!("Failed to connect to relay at {uri}"))?;
        info!(role = %self.role(), %uri, "Connected to relay");
        self.run(ws, CancellationToken::new()).await
    }

    /// Drives an established connection until it closes or `cancel` fires.
    ///
    /// When the inbound stream ends or the send loop finishes, the shared token
    /// is cancelled so the background work stops with the connection.
    pub async fn run(self, ws: WsStream, cancel: CancellationToken) -> Result<()> {
        let client = Arc::new(self);
        let (sink, stream) = ws.split();
        let sink = Arc::new(WsSink::new(sink));

        let background = tokio::spawn({
            let client = client.clone();
            let sink = sink.clone();
            let cancel = cancel.clone();
            async move { client.background(sink, cancel).await }
        });
        let sender = tokio::spawn({
            let client = client.clone();
            let sink = sink.clone();
            let cancel = cancel.clone();
            async move {
                if let Err(e) = client.send_loop(sink.as_ref(), &cancel).await {
                    warn!(error = ?e, "Send loop failed");
                }
                cancel.cancel();
            }
        });

        client.recv_loop(stream, &cancel).await;
        cancel.cancel();

        let _ = background.await;
        sender.abort();
        sink.close().await;
        info!("Disconnected.");
        Ok(())
    }

    async fn recv_loop(&self, mut stream: SplitStream<WsStream>, cancel: &CancellationToken) {
        loop {
            let frame = tokio::select! {
                _ = cancel.cancelled() => break,
                frame = stream.next() => frame,
            };
            match frame {
                Some(Ok(Message::Text(text))) => self.on_message(&text).await,
                Some(Ok(Message::Close(_))) | None => {
                    info!("Relay closed the connection");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "Error receiving from relay");
                    break;
                }
            }
        }
    }

    /// Handles one message relayed from the other participant.
    pub async fn on_message(&self, text: &str) {
        match self {
            ChatClient::User(_) => println!("Friend: {text}"),
            ChatClient::Bot(bot) => {
                debug!(len = text.len(), "Message received");
                bot.agent.on_message(text).await;
            }
        }
    }

    /// Produces outbound messages until the participant is done.
    ///
    /// The user reads lines from stdin until EOF. The bot never initiates and
    /// simply waits for the connection to end.
    pub async fn send_loop(&self, sink: &dyn MessageSink, cancel: &CancellationToken) -> Result<()> {
        match self {
            ChatClient::User(_) => forward_lines(spawn_stdin_reader(), sink, cancel).await,
            ChatClient::Bot(_) => {
                cancel.cancelled().await;
                Ok(())
            }
        }
    }

    /// Work that runs alongside the connection; the bot's turn-taking loop.
    pub async fn background(&self, sink: Arc<dyn MessageSink>, cancel: CancellationToken) {
        match self {
            ChatClient::User(_) => {}
            ChatClient::Bot(bot) => bot.agent.run(sink, cancel).await,
        }
    }
}

/// Reads stdin on a dedicated thread so a pending read never holds up the
/// runtime. The thread exits at EOF or once the receiver is dropped.
fn spawn_stdin_reader() -> mpsc::Receiver<std::io::Result<String>> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Sends each non-empty line to the relay until the input ends or `cancel`
/// fires.
async fn forward_lines(
    mut lines: mpsc::Receiver<std::io::Result<String>>,
    sink: &dyn MessageSink,
    cancel: &CancellationToken,
) -> Result<()> {
    let mut stdout = tokio::io::stdout();
    loop {
        stdout.write_all(b"You: ").await?;
        stdout.flush().await?;
        let line = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            line = lines.recv() => line,
        };
        let Some(line) = line else {
            return Ok(());
        };
        let line = line?;
        let line = line.trim();
        if !line.is_empty() {
            sink.send_text(line.to_string()).await?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Mutex as StdMutex, time::Duration};

    #[derive(Default)]
    struct RecordingSink {
        sent: StdMutex<Vec<String>>,
    }

    #[async_trait]
    impl MessageSink for RecordingSink {
        async fn send_text(&self, text: String) -> Result<()> {
            self.sent.lock().unwrap().push(text);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_forward_lines_skips_blank_input() {
        let (tx, rx) = mpsc::channel(4);
        tx.send(Ok("  hey there ".to_string())).await.unwrap();
        tx.send(Ok("   ".to_string())).await.unwrap();
        tx.send(Ok("bye".to_string())).await.unwrap();
        drop(tx);

        let sink = RecordingSink::default();
        forward_lines(rx, &sink, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            *sink.sent.lock().unwrap(),
            vec!["hey there".to_string(), "bye".to_string()]
        );
    }

    #[tokio::test]
    async fn test_forward_lines_stops_on_cancel_while_input_is_idle() {
        // The sender stays alive, like a terminal nobody is typing into.
        let (_tx, rx) = mpsc::channel(4);
        let sink = RecordingSink::default();
        let cancel = CancellationToken::new();

        let forwarding = forward_lines(rx, &sink, &cancel);
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), forwarding)
            .await
            .expect("input loop should stop once cancelled")
            .unwrap();
        assert!(sink.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("user".parse::<ClientRole>(), Ok(ClientRole::User));
        assert_eq!("Bot".parse::<ClientRole>(), Ok(ClientRole::Bot));
        assert_eq!("gpt".parse::<ClientRole>(), Ok(ClientRole::Bot));
        assert_eq!(
            "admin".parse::<ClientRole>(),
            Err(ClientError::UnsupportedRole("admin".to_string()))
        );
    }

    #[test]
    fn test_unsupported_role_message() {
        let err = ClientError::UnsupportedRole("admin".to_string());
        assert_eq!(
            err.to_string(),
            "Unsupported client role 'admin': role must be 'user' or 'bot'"
        );
    }
}
