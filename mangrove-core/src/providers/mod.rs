//! Remote service interfaces and implementations.
//!
//! The pipeline depends on three black-box services: embeddings, reranking and
//! chat. Each is a trait so the Cohere HTTP client and the scripted
//! [`MockServices`] are interchangeable. Every call site wraps its request in
//! [`with_retry`].

pub mod cohere;
pub mod mock;

use crate::config::ProviderConfig;
use crate::error::{ConfigError, ProviderError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub use crate::config::RetryConfig;
pub use cohere::CohereClient;
pub use mock::{EmbedCall, MockServices, RerankCall};

/// What an embedding will be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbedPurpose {
    /// Corpus chunks stored for retrieval.
    SearchDocument,
    /// The user's query.
    SearchQuery,
}

impl EmbedPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmbedPurpose::SearchDocument => "search_document",
            EmbedPurpose::SearchQuery => "search_query",
        }
    }
}

/// One result of a rerank call, best first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RerankHit {
    /// Position of the document in the request.
    pub index: usize,
    /// Text of the matched document, when the service echoes it back.
    pub document_text: Option<String>,
    pub relevance_score: f32,
}

/// A history turn in the chat service's role vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    /// `"User"` or `"Chatbot"`.
    pub role: String,
    pub message: String,
}

/// A single chat request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub chat_history: Vec<ChatTurn>,
    pub temperature: f32,
    pub max_tokens: Option<usize>,
    /// Enable the web-search connector as an extra knowledge source.
    pub web_search: bool,
}

/// The chat service's answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    pub text: String,
}

/// Remote text embedding service.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Embed `texts`, returning one vector per input in the same order.
    async fn embed(
        &self,
        texts: &[String],
        purpose: EmbedPurpose,
    ) -> Result<Vec<Vec<f32>>, ProviderError>;

    /// Return the model name.
    fn model_name(&self) -> &str;
}

/// Remote relevance reranking service.
#[async_trait]
pub trait RerankService: Send + Sync {
    /// Score `documents` against `query` and return at most `top_n` hits, best first.
    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        top_n: usize,
    ) -> Result<Vec<RerankHit>, ProviderError>;

    /// Return the model name.
    fn model_name(&self) -> &str;
}

/// Remote chat / text generation service.
#[async_trait]
pub trait ChatService: Send + Sync {
    async fn chat(&self, request: ChatRequest) -> Result<ChatReply, ProviderError>;

    /// Return the model name.
    fn model_name(&self) -> &str;
}

/// The three services the pipeline talks to.
#[derive(Clone)]
pub struct Services {
    pub embedder: Arc<dyn EmbeddingService>,
    pub reranker: Arc<dyn RerankService>,
    pub chat: Arc<dyn ChatService>,
}

impl Services {
    /// Use one implementation for all three services.
    pub fn from_shared<T>(provider: Arc<T>) -> Self
    where
        T: EmbeddingService + RerankService + ChatService + 'static,
    {
        Self {
            embedder: provider.clone(),
            reranker: provider.clone(),
            chat: provider,
        }
    }
}

/// Create the Cohere-backed services from configuration.
///
/// Returns an error if no API key can be resolved or the HTTP client cannot be built.
pub fn create_services(config: &ProviderConfig) -> Result<Services, ConfigError> {
    let api_key = config.resolve_api_key()?;
    let client = CohereClient::new(config, api_key).map_err(|e| ConfigError::Invalid {
        message: format!("failed to build HTTP client: {}", e),
    })?;
    Ok(Services::from_shared(Arc::new(client)))
}

/// Execute an async operation with bounded retry and exponential backoff.
///
/// The operation runs at most `config.max_attempts` times. Authentication
/// failures are permanent and return immediately; every other error is retried.
/// The last error is returned once attempts are exhausted.
pub async fn with_retry<F, Fut, T>(config: &RetryConfig, operation: F) -> Result<T, ProviderError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(e) => {
                attempt += 1;
                if !is_retryable(&e) || attempt >= max_attempts {
                    return Err(e);
                }

                let backoff_ms = compute_backoff(config, attempt - 1, &e);
                tracing::warn!(
                    attempt = attempt,
                    max = max_attempts,
                    backoff_ms = backoff_ms,
                    error = %e,
                    "Retrying after remote service error"
                );
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
            }
        }
    }
}

/// Check if an error is worth retrying.
fn is_retryable(err: &ProviderError) -> bool {
    !matches!(err, ProviderError::AuthFailed { .. })
}

/// Compute backoff delay, respecting rate limit retry-after hints.
fn compute_backoff(config: &RetryConfig, retry: u32, err: &ProviderError) -> u64 {
    let computed = compute_exponential_backoff(config, retry);
    if let ProviderError::RateLimited { retry_after_secs } = err {
        let server_ms = retry_after_secs.saturating_mul(1000);
        return server_ms.clamp(computed, config.max_backoff_ms.max(computed));
    }
    computed
}

/// Pure exponential backoff: `initial * multiplier^retry`, capped.
fn compute_exponential_backoff(config: &RetryConfig, retry: u32) -> u64 {
    let base = config.initial_backoff_ms as f64 * config.backoff_multiplier.powi(retry as i32);
    base.min(config.max_backoff_ms as f64) as u64
}
