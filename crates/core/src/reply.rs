//! Reply Generation
//!
//! Turns a pending intent and the recent conversation into the text the agent
//! actually sends.

use crate::{conversation::Turn, intent::IntentTag, llm_client::LLMClient};
use anyhow::Result;
use async_trait::async_trait;
use std::{collections::HashMap, fmt::Display, sync::Arc};

/// Marks a reply that stands in for a failed generation call.
pub const ERROR_REPLY_PREFIX: &str = "[GPT error]";

/// The visible reply sent when generation fails.
pub fn error_reply(err: impl Display) -> String {
    format!("{ERROR_REPLY_PREFIX} {err}")
}

/// Produces reply text for a given intent.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    /// `recent_turns` starts with the persona turn and ends with the newest turn.
    async fn generate(&self, intent: IntentTag, recent_turns: &[Turn]) -> Result<String>;
}

/// Generates replies with an LLM, steering the shape of the reply per intent.
pub struct LLMReplyGenerator {
    llm: Arc<dyn LLMClient>,
    guidance: HashMap<IntentTag, String>,
}

impl LLMReplyGenerator {
    /// Builds the generator, reading optional `reply_<tag>` prompt overrides.
    pub fn new(llm: Arc<dyn LLMClient>, prompts: &HashMap<String, String>) -> Self {
        let guidance = IntentTag::ALL
            .into_iter()
            .map(|tag| {
                let text = prompts
                    .get(&format!("reply_{tag}"))
                    .map(|p| p.trim().to_string())
                    .unwrap_or_else(|| tag.default_guidance().to_string());
                (tag, text)
            })
            .collect();
        Self { llm, guidance }
    }

    pub fn guidance(&self, intent: IntentTag) -> &str {
        self.guidance
            .get(&intent)
            .map(String::as_str)
            .unwrap_or_else(|| intent.default_guidance())
    }
}

#[async_trait]
impl ReplyGenerator for LLMReplyGenerator {
    async fn generate(&self, intent: IntentTag, recent_turns: &[Turn]) -> Result<String> {
        self.llm.complete(self.guidance(intent), recent_turns).await
    }
}

/// Fixed replies per intent, for running without a model.
pub struct CannedReplyGenerator;

#[async_trait]
impl ReplyGenerator for CannedReplyGenerator {
    async fn generate(&self, intent: IntentTag, _recent_turns: &[Turn]) -> Result<String> {
        let reply = match intent {
            IntentTag::Ack => "ok",
            IntentTag::Op => "hmm, I'd go for it",
            IntentTag::New => "anyway, got any plans this weekend?",
            IntentTag::Bye => "see ya",
        };
        Ok(reply.to_string())
    }
}
