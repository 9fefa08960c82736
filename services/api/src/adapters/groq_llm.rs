//! services/api/src/adapters/groq_llm.rs
//!
//! This module contains the adapter for the Groq chat-completion API.
//! Groq speaks the OpenAI wire format, so the adapter drives `async-openai`
//! against Groq's base URL. It implements the `CompletionProvider` port from
//! the `core` crate.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use eduforge_core::domain::{ChatRole, CompletionRequest, Credential, PromptMessage};
use eduforge_core::ports::{CompletionProvider, ProviderError};
use std::time::Duration;

pub const GROQ_API_BASE: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `CompletionProvider` using Groq's OpenAI-compatible API.
///
/// One client is prepared per credential slot, matching the order of the
/// credential pool. Every request is bounded by `request_timeout`; a request
/// that runs past it is reported as an ordinary (retryable) failure.
#[derive(Clone)]
pub struct GroqCompletionAdapter {
    api_base: String,
    clients: Vec<Client<OpenAIConfig>>,
    request_timeout: Duration,
}

impl GroqCompletionAdapter {
    /// Creates a new `GroqCompletionAdapter` for the given keys.
    pub fn new(api_base: impl Into<String>, api_keys: &[String]) -> Self {
        let api_base = api_base.into();
        let clients = api_keys
            .iter()
            .map(|key| build_client(&api_base, key))
            .collect();
        Self {
            api_base,
            clients,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    fn client_for(&self, credential: &Credential) -> Client<OpenAIConfig> {
        self.clients
            .get(credential.index())
            .cloned()
            .unwrap_or_else(|| build_client(&self.api_base, credential.secret()))
    }
}

/// Builds a client that reports rate limiting straight away instead of
/// retrying internally; rotation across keys happens in the core.
fn build_client(api_base: &str, api_key: &str) -> Client<OpenAIConfig> {
    let config = OpenAIConfig::new()
        .with_api_base(api_base)
        .with_api_key(api_key);
    let no_retry = ExponentialBackoffBuilder::new()
        .with_max_elapsed_time(Some(Duration::ZERO))
        .build();
    Client::with_config(config).with_backoff(no_retry)
}

fn to_request_message(message: &PromptMessage) -> Result<ChatCompletionRequestMessage, OpenAIError> {
    let content = message.content.clone();
    Ok(match message.role {
        ChatRole::System => ChatCompletionRequestSystemMessageArgs::default()
            .content(content)
            .build()?
            .into(),
        ChatRole::User => ChatCompletionRequestUserMessageArgs::default()
            .content(content)
            .build()?
            .into(),
        ChatRole::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
            .content(content)
            .build()?
            .into(),
    })
}

//=========================================================================================
// `CompletionProvider` Trait Implementation
//=========================================================================================

#[async_trait]
impl CompletionProvider for GroqCompletionAdapter {
    /// Sends one chat-completion request with the given credential.
    async fn complete(
        &self,
        credential: &Credential,
        request: &CompletionRequest,
    ) -> Result<String, ProviderError> {
        let messages = request
            .messages
            .iter()
            .map(to_request_message)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ProviderError::new(e.to_string()))?;

        let chat_request = CreateChatCompletionRequestArgs::default()
            .model(&request.model)
            .messages(messages)
            .temperature(request.temperature)
            .max_completion_tokens(request.max_output_tokens)
            .build()
            .map_err(|e| ProviderError::new(e.to_string()))?;

        let client = self.client_for(credential);
        let response = tokio::time::timeout(self.request_timeout, client.chat().create(chat_request))
            .await
            .map_err(|_| {
                ProviderError::new(format!(
                    "Request timed out after {} ms",
                    self.request_timeout.as_millis()
                ))
            })?
            .map_err(|e: OpenAIError| ProviderError::new(e.to_string()))?;

        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| ProviderError::new("No completion content returned"))
    }
}
