//! Cohere HTTP client implementing the embedding, rerank and chat services.
//!
//! Talks to the `v1` REST endpoints (`/v1/embed`, `/v1/rerank`, `/v1/chat`)
//! with bearer authentication. Responses are parsed from `serde_json::Value`
//! so that unexpected extra fields never break deserialization.

use super::{
    ChatReply, ChatRequest, ChatService, EmbedPurpose, EmbeddingService, RerankHit, RerankService,
};
use crate::config::ProviderConfig;
use crate::error::ProviderError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

const PROVIDER_NAME: &str = "cohere";

/// A client for the Cohere API.
pub struct CohereClient {
    client: Client,
    base_url: String,
    api_key: String,
    timeout_secs: u64,
    embed_model: String,
    rerank_model: String,
    chat_model: String,
}

impl CohereClient {
    /// Create a client with an already resolved API key.
    pub fn new(config: &ProviderConfig, api_key: String) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            timeout_secs: config.timeout_secs,
            embed_model: config.embed_model.clone(),
            rerank_model: config.rerank_model.clone(),
            chat_model: config.chat_model.clone(),
        })
    }

    /// POST a JSON body and return the parsed JSON response.
    async fn post_json(&self, path: &str, body: &Value) -> Result<Value, ProviderError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "Sending Cohere request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        let retry_after = retry_after_header(response.headers());
        let response_body = response
            .text()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        if !status.is_success() {
            return Err(map_http_error(status, retry_after, &response_body));
        }

        serde_json::from_str(&response_body).map_err(|e| ProviderError::ResponseParse {
            message: format!("Invalid JSON: {}", e),
        })
    }

    fn map_transport_error(&self, err: reqwest::Error) -> ProviderError {
        if err.is_timeout() {
            ProviderError::Timeout {
                timeout_secs: self.timeout_secs,
            }
        } else if err.is_connect() {
            ProviderError::Connection {
                message: err.to_string(),
            }
        } else {
            ProviderError::ApiRequest {
                message: format!("Request failed: {}", err),
            }
        }
    }
}

/// Seconds from a numeric `Retry-After` header.
fn retry_after_header(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Seconds from a "... try again in Xs" error message body.
fn retry_after_body(body: &str) -> Option<u64> {
    let message = serde_json::from_str::<Value>(body)
        .ok()?
        .get("message")?
        .as_str()?
        .to_string();
    message
        .split("in ")
        .last()?
        .trim()
        .trim_end_matches('.')
        .trim_end_matches('s')
        .parse()
        .ok()
}

/// Map an HTTP status code to the appropriate ProviderError.
fn map_http_error(
    status: reqwest::StatusCode,
    retry_after: Option<u64>,
    body: &str,
) -> ProviderError {
    match status.as_u16() {
        401 | 403 => {
            debug!(body = %body, "Authentication failed ({})", status);
            ProviderError::AuthFailed {
                provider: PROVIDER_NAME.to_string(),
            }
        }
        429 => ProviderError::RateLimited {
            retry_after_secs: retry_after.or_else(|| retry_after_body(body)).unwrap_or(5),
        },
        _ if status.is_server_error() => ProviderError::ApiRequest {
            message: format!("Server error ({}): {}", status, body),
        },
        _ => ProviderError::ApiRequest {
            message: format!("HTTP {}: {}", status, body),
        },
    }
}

fn embed_body(model: &str, texts: &[String], purpose: EmbedPurpose) -> Value {
    json!({
        "model": model,
        "texts": texts,
        "input_type": purpose.as_str(),
    })
}

fn rerank_body(model: &str, query: &str, documents: &[String], top_n: usize) -> Value {
    json!({
        "model": model,
        "query": query,
        "documents": documents,
        "top_n": top_n,
        "return_documents": true,
    })
}

fn chat_body(model: &str, request: &ChatRequest) -> Value {
    let history: Vec<Value> = request
        .chat_history
        .iter()
        .map(|turn| json!({"role": turn.role, "message": turn.message}))
        .collect();
    let mut body = json!({
        "model": model,
        "message": request.message,
        "chat_history": history,
        "temperature": request.temperature,
    });
    if let Some(max_tokens) = request.max_tokens {
        body["max_tokens"] = json!(max_tokens);
    }
    if request.web_search {
        body["connectors"] = json!([{"id": "web-search"}]);
    }
    body
}

fn parse_embeddings(json: &Value) -> Result<Vec<Vec<f32>>, ProviderError> {
    // `embeddings` is either a bare list or keyed by embedding type.
    let raw = match json.get("embeddings") {
        Some(Value::Array(items)) => items,
        Some(Value::Object(map)) => match map.get("float") {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(ProviderError::ResponseParse {
                    message: "No float embeddings in response".to_string(),
                });
            }
        },
        _ => {
            return Err(ProviderError::ResponseParse {
                message: "No embeddings in response".to_string(),
            });
        }
    };

    raw.iter()
        .map(|vector| {
            vector
                .as_array()
                .ok_or_else(|| ProviderError::ResponseParse {
                    message: "Embedding is not an array".to_string(),
                })?
                .iter()
                .map(|v| {
                    v.as_f64()
                        .map(|f| f as f32)
                        .ok_or_else(|| ProviderError::ResponseParse {
                            message: "Embedding component is not a number".to_string(),
                        })
                })
                .collect()
        })
        .collect()
}

fn parse_rerank(json: &Value) -> Result<Vec<RerankHit>, ProviderError> {
    let results = json
        .get("results")
        .and_then(|r| r.as_array())
        .ok_or_else(|| ProviderError::ResponseParse {
            message: "No results in rerank response".to_string(),
        })?;

    results
        .iter()
        .map(|item| {
            let index = item
                .get("index")
                .and_then(|i| i.as_u64())
                .ok_or_else(|| ProviderError::ResponseParse {
                    message: "Rerank result missing index".to_string(),
                })? as usize;
            let relevance_score = item
                .get("relevance_score")
                .and_then(|s| s.as_f64())
                .unwrap_or(0.0) as f32;
            let document_text = item
                .get("document")
                .and_then(|d| d.get("text"))
                .and_then(|t| t.as_str())
                .map(|t| t.to_string());
            Ok(RerankHit {
                index,
                document_text,
                relevance_score,
            })
        })
        .collect()
}

fn parse_chat(json: &Value) -> Result<ChatReply, ProviderError> {
    json.get("text")
        .and_then(|t| t.as_str())
        .map(|text| ChatReply {
            text: text.to_string(),
        })
        .ok_or_else(|| ProviderError::ResponseParse {
            message: "No text in chat response".to_string(),
        })
}

#[async_trait]
impl EmbeddingService for CohereClient {
    async fn embed(
        &self,
        texts: &[String],
        purpose: EmbedPurpose,
    ) -> Result<Vec<Vec<f32>>, ProviderError> {
        let body = embed_body(&self.embed_model, texts, purpose);
        let json = self.post_json("/v1/embed", &body).await?;
        parse_embeddings(&json)
    }

    fn model_name(&self) -> &str {
        &self.embed_model
    }
}

#[async_trait]
impl RerankService for CohereClient {
    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        top_n: usize,
    ) -> Result<Vec<RerankHit>, ProviderError> {
        let body = rerank_body(&self.rerank_model, query, documents, top_n);
        let json = self.post_json("/v1/rerank", &body).await?;
        parse_rerank(&json)
    }

    fn model_name(&self) -> &str {
        &self.rerank_model
    }
}

#[async_trait]
impl ChatService for CohereClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChatReply, ProviderError> {
        let body = chat_body(&self.chat_model, &request);
        let json = self.post_json("/v1/chat", &body).await?;
        parse_chat(&json)
    }

    fn model_name(&self) -> &str {
        &self.chat_model
    }
}
