//! Intent Classification
//!
//! Every user message is mapped onto a small, closed set of reply shapes. The
//! turn-taking loop stores the latest tag and later hands it to the reply
//! generator once the user has gone quiet.

use crate::{conversation::Turn, llm_client::LLMClient};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt, str::FromStr, sync::Arc};

/// What kind of reply the user's latest message calls for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentTag {
    /// A brief acknowledgement.
    #[default]
    Ack,
    /// An opinion or suggestion.
    Op,
    /// A change of topic.
    New,
    /// Closing the conversation.
    Bye,
}

impl IntentTag {
    pub const ALL: [IntentTag; 4] = [IntentTag::Ack, IntentTag::Op, IntentTag::New, IntentTag::Bye];

    pub fn as_str(&self) -> &'static str {
        match self {
            IntentTag::Ack => "ack",
            IntentTag::Op => "op",
            IntentTag::New => "new",
            IntentTag::Bye => "bye",
        }
    }

    /// Reads a tag out of free-form model output, collapsing anything
    /// unrecognised to [`IntentTag::Ack`].
    pub fn parse_lenient(raw: &str) -> Self {
        raw.split(|c: char| !c.is_ascii_alphabetic())
            .find(|word| !word.is_empty())
            .and_then(|word| word.parse().ok())
            .unwrap_or_default()
    }

    /// Built-in reply guidance used when no prompt file overrides it.
    pub fn default_guidance(&self) -> &'static str {
        match self {
            IntentTag::Ack => "Reply with a very short acknowledgement, a few words at most.",
            IntentTag::Op => "Share a short opinion or suggestion about what the user said.",
            IntentTag::New => "Casually bring up a new, related topic in one short sentence.",
            IntentTag::Bye => "Say a short, friendly goodbye.",
        }
    }
}

impl fmt::Display for IntentTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Unknown intent tag: '{0}'")]
pub struct IntentParseError(pub String);

impl FromStr for IntentTag {
    type Err = IntentParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ack" => Ok(IntentTag::Ack),
            "op" => Ok(IntentTag::Op),
            "new" => Ok(IntentTag::New),
            "bye" => Ok(IntentTag::Bye),
            _ => Err(IntentParseError(s.to_string())),
        }
    }
}

/// Decides which reply shape the latest user message calls for.
///
/// Implementations may be slow or fail; callers fall back to
/// [`IntentTag::Ack`] on error.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<IntentTag>;
}

/// Classifies intents by asking an LLM to answer with a single tag.
pub struct LLMIntentClassifier {
    llm: Arc<dyn LLMClient>,
    prompt_template: String,
}

impl LLMIntentClassifier {
    /// Creates a classifier from the `classify_intent` prompt template.
    ///
    /// The template may contain a `{text}` placeholder; otherwise the user
    /// message is passed only as a user turn.
    pub fn new(llm: Arc<dyn LLMClient>, prompts: &HashMap<String, String>) -> Result<Self> {
        let prompt_template = prompts
            .get("classify_intent")
            .context("Missing prompt template: 'classify_intent'")?
            .clone();
        Ok(Self {
            llm,
            prompt_template,
        })
    }
}

#[async_trait]
impl IntentClassifier for LLMIntentClassifier {
    async fn classify(&self, text: &str) -> Result<IntentTag> {
        let instruction = self.prompt_template.replace("{text}", text);
        let user_turn = Turn {
            role: crate::conversation::Role::User,
            content: text.to_string(),
            sequence_index: 0,
        };
        let answer = self.llm.complete(&instruction, &[user_turn]).await?;
        Ok(IntentTag::parse_lenient(&answer))
    }
}

/// A deterministic classifier for offline use and tests.
///
/// It looks for a handful of keywords and otherwise acknowledges.
pub struct KeywordIntentClassifier;

#[async_trait]
impl IntentClassifier for KeywordIntentClassifier {
    async fn classify(&self, text: &str) -> Result<IntentTag> {
        let lower = text.to_lowercase();
        let has = |words: &[&str]| words.iter().any(|w| lower.contains(w));

        let tag = if has(&["bye", "good night", "see you", "gotta go"]) {
            IntentTag::Bye
        } else if has(&["anyway", "by the way", "btw", "something else"]) {
            IntentTag::New
        } else if lower.trim_end().ends_with('?') || has(&["what do you think", "should i"]) {
            IntentTag::Op
        } else {
            IntentTag::Ack
        };
        Ok(tag)
    }
}
