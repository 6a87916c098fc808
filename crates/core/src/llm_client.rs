use crate::conversation::{Role, Turn};
use anyhow::{Context, Result};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs, CreateChatCompletionResponse,
    },
};
use async_trait::async_trait;

/// A generic client for interacting with an LLM.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Makes a single, non-streaming completion call.
    ///
    /// `instruction` is sent as a system message after the ordered `turns`.
    async fn complete(&self, instruction: &str, turns: &[Turn]) -> Result<String>;
}

/// Sampling parameters applied to every request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingParams {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 40,
        }
    }
}

/// An implementation of `LLMClient` for any OpenAI-compatible API.
pub struct OpenAICompatibleClient {
    client: Client<OpenAIConfig>,
    model: String,
    sampling: SamplingParams,
}

impl OpenAICompatibleClient {
    /// Creates a new client for an OpenAI-compatible service.
    ///
    /// # Arguments
    ///
    /// * `config` - The configuration for the OpenAI client, including API key and base URL.
    /// * `model` - The specific model identifier to use for chat completions (e.g., "gpt-3.5-turbo").
    /// * `sampling` - Temperature and token limit for every completion.
    pub fn new(config: OpenAIConfig, model: String, sampling: SamplingParams) -> Self {
        Self {
            client: Client::with_config(config),
            model,
            sampling,
        }
    }
}

/// Converts conversation turns plus a trailing instruction into request messages.
pub fn build_messages(instruction: &str, turns: &[Turn]) -> Result<Vec<ChatCompletionRequestMessage>> {
    let mut messages = Vec::with_capacity(turns.len() + 1);
    for turn in turns {
        let message: ChatCompletionRequestMessage = match turn.role {
            Role::System => ChatCompletionRequestSystemMessageArgs::default()
                .content(turn.content.clone())
                .build()?
                .into(),
            Role::User => ChatCompletionRequestUserMessageArgs::default()
                .content(turn.content.clone())
                .build()?
                .into(),
            Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                .content(turn.content.clone())
                .build()?
                .into(),
        };
        messages.push(message);
    }
    if !instruction.is_empty() {
        messages.push(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(instruction.to_string())
                .build()?
                .into(),
        );
    }
    Ok(messages)
}

#[async_trait]
impl LLMClient for OpenAICompatibleClient {
    #[allow(deprecated)]
    async fn complete(&self, instruction: &str, turns: &[Turn]) -> Result<String> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(build_messages(instruction, turns)?)
            .temperature(self.sampling.temperature)
            .max_tokens(self.sampling.max_tokens)
            .build()?;

        let response: CreateChatCompletionResponse = self.client.chat().create(request).await?;
        let content = response
            .choices
            .first()
            .context("No response choice from LLM")?
            .message
            .content
            .as_ref()
            .context("No content in LLM response")?;

        Ok(content.trim().to_string())
    }
}
