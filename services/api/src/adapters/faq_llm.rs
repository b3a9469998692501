//! services/api/src/adapters/faq_llm.rs
//!
//! This module contains the adapter for the FAQ-generating LLM.
//! It implements the `TextGenerationService` port from the `core` crate against any
//! OpenAI-compatible chat endpoint (OpenAI itself, or Ollama's `/v1` API).

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_stream::try_stream;
use async_trait::async_trait;
use faq_core::ports::{FragmentStream, PortError, PortResult, TextGenerationService};
use futures::StreamExt;
use tracing::{debug, info};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `TextGenerationService` using an OpenAI-compatible LLM.
///
/// Holds no per-request state; the underlying client is a shareable handle.
#[derive(Clone)]
pub struct OpenAiFaqAdapter {
    client: Client<OpenAIConfig>,
}

impl OpenAiFaqAdapter {
    /// Creates a new `OpenAiFaqAdapter`.
    pub fn new(client: Client<OpenAIConfig>) -> Self {
        Self { client }
    }
}

fn map_openai_error(e: OpenAIError) -> PortError {
    match e {
        OpenAIError::Reqwest(e) => PortError::UpstreamUnavailable(e.to_string()),
        other => PortError::Upstream(other.to_string()),
    }
}

//=========================================================================================
// `TextGenerationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl TextGenerationService for OpenAiFaqAdapter {
    async fn stream(&self, model: &str, prompt: &str) -> PortResult<FragmentStream> {
        let messages: Vec<ChatCompletionRequestMessage> = vec![ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .into()];

        let request = CreateChatCompletionRequestArgs::default()
            .model(model)
            .messages(messages)
            .stream(true)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        info!("Opening completion stream with model '{}'", model);
        let mut upstream = self
            .client
            .chat()
            .create_stream(request)
            .await
            .map_err(map_openai_error)?;

        let fragments = try_stream! {
            while let Some(chunk) = upstream.next().await {
                let chunk = chunk.map_err(map_openai_error)?;
                for choice in chunk.choices {
                    if let Some(content) = choice.delta.content {
                        yield content;
                    }
                }
            }
            debug!("Completion stream finished");
        };

        Ok(Box::pin(fragments))
    }
}
