//! Turn-Taking Agent
//!
//! The agent decouples *classifying* a message from *deciding to speak*.
//! Inbound messages are appended and classified as they arrive, arming a
//! pending intent. A periodic tick then checks whether the user has been idle
//! long enough, and only then generates and sends a single reply.
//!
//! ```text
//!   idle ──user message──▶ armed ──tick, idle window elapsed──▶ speaking
//!    ▲                       │                                     │
//!    └──assistant spoke last─┘◀──────────reply sent────────────────┘
//! ```

use crate::{
    conversation::ConversationState,
    intent::{IntentClassifier, IntentTag},
    reply::{ReplyGenerator, error_reply},
};
use anyhow::Result;
use async_trait::async_trait;
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::Mutex,
    time::{MissedTickBehavior, interval},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// The outbound half of the connection the agent speaks through.
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn send_text(&self, text: String) -> Result<()>;
}

/// Timing and context parameters for the turn-taking loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnTakingConfig {
    /// Minimum quiet time after the last user turn before replying.
    pub idle_threshold: Duration,
    /// How often the loop checks whether a reply is due.
    pub tick_interval: Duration,
    /// Number of non-persona turns handed to the reply generator.
    pub history_window: usize,
}

impl Default for TurnTakingConfig {
    fn default() -> Self {
        Self {
            idle_threshold: Duration::from_secs(2),
            tick_interval: Duration::from_millis(300),
            history_window: 10,
        }
    }
}

/// An agent that replies at most once per user turn, after the user pauses.
pub struct TurnTaker {
    state: Arc<Mutex<ConversationState>>,
    classifier: Arc<dyn IntentClassifier>,
    generator: Arc<dyn ReplyGenerator>,
    config: TurnTakingConfig,
}

impl TurnTaker {
    pub fn new(
        persona: impl Into<String>,
        classifier: Arc<dyn IntentClassifier>,
        generator: Arc<dyn ReplyGenerator>,
        config: TurnTakingConfig,
    ) -> Self {
        let state = ConversationState::new(persona, config.idle_threshold);
        Self {
            state: Arc::new(Mutex::new(state)),
            classifier,
            generator,
            config,
        }
    }

    /// Shared handle to the conversation state.
    pub fn state(&self) -> Arc<Mutex<ConversationState>> {
        self.state.clone()
    }

    pub fn config(&self) -> &TurnTakingConfig {
        &self.config
    }

    /// Records a user message and arms a reply with its classified intent.
    ///
    /// Recording the turn disarms any earlier intent, so nothing fires while
    /// this message is classified. Classification runs without holding the
    /// state lock. A failed classification arms an [`IntentTag::Ack`].
    pub async fn on_message(&self, text: &str) {
        {
            let mut state = self.state.lock().await;
            let turn = state.append_user_turn(text);
            debug!(sequence_index = turn.sequence_index, "User turn recorded");
        }

        let intent = self.classifier.classify(text).await.unwrap_or_else(|e| {
            warn!(error = %e, "Intent classification failed; falling back to ack");
            IntentTag::Ack
        });

        self.state.lock().await.set_pending_intent(intent);
        debug!(%intent, "Reply armed");
    }

    /// Runs one decision cycle. Returns `true` if a reply was sent.
    ///
    /// Taking the intent and snapshotting the history happen under a single
    /// lock, so a reply can never be produced twice for the same intent.
    pub async fn tick(&self, sink: &dyn MessageSink) -> Result<bool> {
        let (intent, recent_turns) = {
            let mut state = self.state.lock().await;
            match state.take_pending_intent_if_due() {
                Some(intent) => (intent, state.recent_turns(self.config.history_window)),
                None => return Ok(false),
            }
        };

        info!(%intent, "User is idle; generating reply");
        let reply = self
            .generator
            .generate(intent, &recent_turns)
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, %intent, "Reply generation failed");
                error_reply(e)
            });

        sink.send_text(reply.clone()).await?;
        self.state.lock().await.append_assistant_turn(reply);
        Ok(true)
    }

    /// Ticks at the configured cadence until `cancel` fires.
    ///
    /// Errors from a single cycle are logged and the loop keeps going. Cancelling
    /// also abandons a cycle that is still waiting on generation.
    pub async fn run(&self, sink: Arc<dyn MessageSink>, cancel: CancellationToken) {
        let mut ticker = interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            idle_threshold_ms = self.config.idle_threshold.as_millis() as u64,
            tick_interval_ms = self.config.tick_interval.as_millis() as u64,
            "Turn-taking loop started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        result = self.tick(sink.as_ref()) => {
                            if let Err(e) = result {
                                warn!(error = ?e, "Failed to deliver reply");
                            }
                        }
                    }
                }
            }
        }

        info!("Turn-taking loop stopped");
    }
}
