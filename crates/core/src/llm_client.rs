use anyhow::{Context, Result, anyhow};
use async_openai::{
    Client,
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, ChatCompletionTool, CreateChatCompletionRequestArgs,
        CreateChatCompletionResponse,
    },
};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use std::pin::Pin;

/// Represents a tool call requested by the LLM.
pub type ToolCall = async_openai::types::ChatCompletionMessageToolCall;

/// Represents the events that can be yielded from a streaming text response.
#[derive(Debug, Clone)]
pub enum LLMStreamEvent {
    TextChunk(String),
}

/// A stream of text chunks from the LLM.
pub type LLMStream = Pin<Box<dyn Stream<Item = Result<LLMStreamEvent, OpenAIError>> + Send>>;

/// The outcome of the host's decision turn.
#[derive(Debug, Clone)]
pub enum LLMAction {
    /// The host answers the player directly.
    TextResponse(String),
    /// The host wants to call one or more game tools first.
    ToolCall(Vec<ToolCall>),
}

/// A generic client for the language model that voices the host.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Makes a single, non-streaming call to decide between speaking and calling tools.
    ///
    /// `messages` must already start with the system prompt.
    async fn decide_action(
        &self,
        messages: Vec<ChatCompletionRequestMessage>,
        tools: Vec<ChatCompletionTool>,
    ) -> Result<LLMAction>;

    /// Streams the host's line once tool results have been appended to `messages`.
    async fn stream_after_tools(&self, messages: Vec<ChatCompletionRequestMessage>)
    -> Result<LLMStream>;

    /// One-shot completion of a single user prompt under a system instruction.
    async fn complete(&self, system: String, prompt: String) -> Result<String>;
}

/// An implementation of `LLMClient` for any OpenAI-compatible API.
///
/// Gemini is reached through its OpenAI-compatible endpoint, so the same
/// client serves both providers.
pub struct OpenAICompatibleClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAICompatibleClient {
    /// Creates a new client for an OpenAI-compatible service.
    ///
    /// # Arguments
    ///
    /// * `config` - API key and base URL of the provider.
    /// * `model` - The chat model identifier (e.g., "gpt-4o").
    pub fn new(config: OpenAIConfig, model: String) -> Self {
        Self {
            client: Client::with_config(config),
            model,
        }
    }
}

#[async_trait]
impl LLMClient for OpenAICompatibleClient {
    async fn decide_action(
        &self,
        messages: Vec<ChatCompletionRequestMessage>,
        tools: Vec<ChatCompletionTool>,
    ) -> Result<LLMAction> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .tools(tools)
            .tool_choice("auto")
            .build()?;

        let response: CreateChatCompletionResponse = self.client.chat().create(request).await?;
        let choice = response
            .choices
            .first()
            .context("No response choice from LLM")?;

        if let Some(tool_calls) = &choice.message.tool_calls {
            Ok(LLMAction::ToolCall(tool_calls.clone()))
        } else if let Some(content) = &choice.message.content {
            Ok(LLMAction::TextResponse(content.clone()))
        } else {
            Err(anyhow!(
                "LLM response had neither text content nor tool calls."
            ))
        }
    }

    async fn stream_after_tools(
        &self,
        messages: Vec<ChatCompletionRequestMessage>,
    ) -> Result<LLMStream> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .stream(true)
            .build()?;

        let stream = self.client.chat().create_stream(request).await?;

        Ok(Box::pin(stream.filter_map(|result| async move {
            match result {
                Ok(response) => response
                    .choices
                    .first()
                    .and_then(|choice| choice.delta.content.clone())
                    .filter(|content| !content.is_empty())
                    .map(|content| Ok(LLMStreamEvent::TextChunk(content))),
                Err(e) => Some(Err(e)),
            }
        })))
    }

    async fn complete(&self, system: String, prompt: String) -> Result<String> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(vec![
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system)
                    .build()?
                    .into(),
                ChatCompletionRequestUserMessageArgs::default()
                    .content(prompt)
                    .build()?
                    .into(),
            ])
            .build()?;

        let response = self.client.chat().create(request).await?;

        response
            .choices
            .first()
            .context("No response choice from LLM")?
            .message
            .content
            .clone()
            .context("No content in LLM response")
    }
}
