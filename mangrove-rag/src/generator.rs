//! Response generation against the chat service.

use crate::error::RagError;
use crate::prompt::PromptBuilder;
use mangrove_core::{
    ChatRequest, ChatService, ChatTurn, Document, GenerationConfig, Message, RetryConfig, Role,
    with_retry,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Source name reported for a context document without one.
pub const UNKNOWN_SOURCE_NAME: &str = "Unknown";

/// How an answer was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    /// Answered from the grounded prompt over retrieved documents.
    Grounded,
    /// Answered from the raw query with web search enabled.
    WebSearchFallback,
}

/// The answer returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedResponse {
    pub text: String,
    /// Distinct sources of the context documents, in context order.
    pub sources: Vec<String>,
    pub mode: GenerationMode,
}

/// Map conversation history onto the chat service's role names.
pub fn translate_history(history: &[Message]) -> Vec<ChatTurn> {
    history
        .iter()
        .map(|msg| ChatTurn {
            role: match msg.role {
                Role::User => "User",
                _ => "Chatbot",
            }
            .to_string(),
            message: msg.content.clone(),
        })
        .collect()
}

/// Distinct source names of `docs`, first occurrence wins.
pub fn collect_sources(docs: &[&Document]) -> Vec<String> {
    let mut sources: Vec<String> = Vec::new();
    for doc in docs {
        let name = doc.source().unwrap_or(UNKNOWN_SOURCE_NAME);
        if !sources.iter().any(|s| s == name) {
            sources.push(name.to_string());
        }
    }
    sources
}

pub struct ResponseGenerator {
    chat: Arc<dyn ChatService>,
    retry: RetryConfig,
    generation: GenerationConfig,
    prompt: PromptBuilder,
}

impl ResponseGenerator {
    pub fn new(
        chat: Arc<dyn ChatService>,
        retry: RetryConfig,
        generation: GenerationConfig,
        prompt: PromptBuilder,
    ) -> Self {
        Self {
            chat,
            retry,
            generation,
            prompt,
        }
    }

    /// Answer from `context` with no external connector.
    pub async fn generate_grounded(
        &self,
        query: &str,
        context: &[&Document],
        history: &[Message],
    ) -> Result<GeneratedResponse, RagError> {
        let prompt = self.prompt.build(query, context, history);
        let text = self.send(prompt, history, false).await?;
        Ok(GeneratedResponse {
            text,
            sources: collect_sources(context),
            mode: GenerationMode::Grounded,
        })
    }

    /// Answer the raw query with the web-search connector enabled.
    pub async fn generate_fallback(
        &self,
        query: &str,
        history: &[Message],
    ) -> Result<GeneratedResponse, RagError> {
        tracing::info!("No grounding documents; answering with web search");
        let text = self.send(query.to_string(), history, true).await?;
        Ok(GeneratedResponse {
            text,
            sources: Vec::new(),
            mode: GenerationMode::WebSearchFallback,
        })
    }

    async fn send(
        &self,
        message: String,
        history: &[Message],
        web_search: bool,
    ) -> Result<String, RagError> {
        let request = ChatRequest {
            message,
            chat_history: translate_history(history),
            temperature: self.generation.temperature,
            max_tokens: Some(self.generation.max_tokens),
            web_search,
        };
        let reply = with_retry(&self.retry, || self.chat.chat(request.clone()))
            .await
            .map_err(RagError::generation)?;
        tracing::debug!(
            model = self.chat.model_name(),
            web_search,
            chars = reply.text.len(),
            "Chat response received"
        );
        Ok(reply.text)
    }
}
