//! Wires the turn-taking agent from configuration.

use crate::config::Config;
use anyhow::{Context, Result};
use async_openai::config::OpenAIConfig;
use chatrelay_core::{
    IntentClassifier, ReplyGenerator, TurnTaker,
    intent::{KeywordIntentClassifier, LLMIntentClassifier},
    llm_client::{LLMClient, OpenAICompatibleClient},
    prompts::load_prompts,
    reply::{CannedReplyGenerator, LLMReplyGenerator},
};
use secrecy::ExposeSecret;
use std::{collections::HashMap, sync::Arc};
use tracing::info;

/// Persona used when no `persona.md` prompt is available in offline mode.
pub const DEFAULT_PERSONA: &str = "You are the user's friend, a computer science undergrad in \
your twenties. You talk casually and mostly answer in a few words.";

/// Builds the agent described by `config`.
///
/// Offline agents use the keyword classifier and canned replies and only read
/// the prompts directory for an optional persona.
pub fn build_agent(config: &Config) -> Result<TurnTaker> {
    let (persona, classifier, generator): (
        String,
        Arc<dyn IntentClassifier>,
        Arc<dyn ReplyGenerator>,
    ) = if config.offline {
        info!("Running bot offline with canned replies.");
        let persona = load_prompts(&config.prompts_path)
            .ok()
            .and_then(|prompts| prompts.get("persona").map(|p| p.trim().to_string()))
            .unwrap_or_else(|| DEFAULT_PERSONA.to_string());
        (
            persona,
            Arc::new(KeywordIntentClassifier),
            Arc::new(CannedReplyGenerator),
        )
    } else {
        let api_key = config.require_api_key()?;
        let prompts = load_prompts(&config.prompts_path)?;
        let persona = persona_from(&prompts)?;

        let openai_config = OpenAIConfig::new()
            .with_api_key(api_key.expose_secret())
            .with_api_base(&config.openai_api_base);
        let llm: Arc<dyn LLMClient> = Arc::new(OpenAICompatibleClient::new(
            openai_config,
            config.chat_model.clone(),
            config.sampling,
        ));
        info!(model = %config.chat_model, "Running bot against chat model.");
        (
            persona,
            Arc::new(LLMIntentClassifier::new(llm.clone(), &prompts)?),
            Arc::new(LLMReplyGenerator::new(llm, &prompts)),
        )
    };

    Ok(TurnTaker::new(persona, classifier, generator, config.turn_taking))
}

fn persona_from(prompts: &HashMap<String, String>) -> Result<String> {
    let persona = prompts
        .get("persona")
        .context("persona.md not found in prompts directory")?;
    Ok(persona.trim().to_string())
}
