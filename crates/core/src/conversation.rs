//! Conversation State
//!
//! This module holds the per-agent record that the inbound message handler and
//! the turn-taking loop share: the ordered turn history, the moment the user was
//! last active, and the single pending-intent slot that arms a reply.

use crate::intent::IntentTag;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// The author of a single turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// One authored message in the conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    /// Position in the history; the persona turn is always `0`.
    pub sequence_index: usize,
}

/// Mutable state of one agent session.
///
/// Turns are append-only. The first turn is the persona entry created by
/// [`ConversationState::new`] and is never touched afterwards.
#[derive(Debug)]
pub struct ConversationState {
    turns: Vec<Turn>,
    last_user_activity: Option<Instant>,
    pending_intent: Option<IntentTag>,
    idle_threshold: Duration,
}

impl ConversationState {
    /// Creates a conversation seeded with the persona turn.
    pub fn new(persona: impl Into<String>, idle_threshold: Duration) -> Self {
        Self {
            turns: vec![Turn {
                role: Role::System,
                content: persona.into(),
                sequence_index: 0,
            }],
            last_user_activity: None,
            pending_intent: None,
            idle_threshold,
        }
    }

    /// Appends a user turn, refreshes the idle clock and disarms any pending
    /// intent. Only the classification of this turn can arm the next reply.
    pub fn append_user_turn(&mut self, text: impl Into<String>) -> &Turn {
        self.last_user_activity = Some(Instant::now());
        self.pending_intent = None;
        self.push(Role::User, text.into())
    }

    pub fn append_assistant_turn(&mut self, text: impl Into<String>) -> &Turn {
        self.push(Role::Assistant, text.into())
    }

    /// Stores the latest classification. A newer intent replaces an older one.
    pub fn set_pending_intent(&mut self, tag: IntentTag) {
        self.pending_intent = Some(tag);
    }

    /// Returns the pending intent once a reply is due, clearing the slot.
    ///
    /// A reply is due when an intent is pending, the last turn was not written
    /// by the assistant, and the user has been quiet for at least the idle
    /// threshold. If the assistant already spoke last the intent is discarded.
    pub fn take_pending_intent_if_due(&mut self) -> Option<IntentTag> {
        self.pending_intent?;

        if self.last_turn_is_assistant() {
            self.pending_intent = None;
            return None;
        }

        let last_activity = self.last_user_activity?;
        if last_activity.elapsed() < self.idle_threshold {
            return None;
        }

        self.pending_intent.take()
    }

    pub fn pending_intent(&self) -> Option<IntentTag> {
        self.pending_intent
    }

    pub fn last_user_activity(&self) -> Option<Instant> {
        self.last_user_activity
    }

    pub fn idle_threshold(&self) -> Duration {
        self.idle_threshold
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn last_turn(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// The persona turn followed by at most `window` of the latest turns.
    pub fn recent_turns(&self, window: usize) -> Vec<Turn> {
        let history = &self.turns[1..];
        let start = history.len().saturating_sub(window);
        std::iter::once(&self.turns[0])
            .chain(&history[start..])
            .cloned()
            .collect()
    }

    fn last_turn_is_assistant(&self) -> bool {
        matches!(self.last_turn(), Some(turn) if turn.role == Role::Assistant)
    }

    fn push(&mut self, role: Role, content: String) -> &Turn {
        let sequence_index = self.turns.len();
        self.turns.push(Turn {
            role,
            content,
            sequence_index,
        });
        &self.turns[sequence_index]
    }
}
