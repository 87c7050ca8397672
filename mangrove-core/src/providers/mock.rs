//! Scripted in-process services for tests and offline runs.
//!
//! [`MockServices`] implements all three service traits. By default it is
//! fully deterministic: embeddings are hashed term-frequency vectors, rerank
//! scores by word overlap with the query, and chat returns a fixed reply.
//! Tests can queue explicit responses (including errors) that are consumed
//! before falling back to the default behavior, and can inspect every call.

use super::{
    ChatReply, ChatRequest, ChatService, EmbedPurpose, EmbeddingService, RerankHit, RerankService,
};
use crate::error::ProviderError;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};

const MOCK_MODEL: &str = "mock-model";
const DEFAULT_DIMENSIONS: usize = 64;

type EmbedResult = Result<Vec<Vec<f32>>, ProviderError>;
type RerankResult = Result<Vec<RerankHit>, ProviderError>;
type ChatResult = Result<ChatReply, ProviderError>;

/// A recorded embed call.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbedCall {
    pub texts: Vec<String>,
    pub purpose: EmbedPurpose,
}

/// A recorded rerank call.
#[derive(Debug, Clone, PartialEq)]
pub struct RerankCall {
    pub query: String,
    pub documents: Vec<String>,
    pub top_n: usize,
}

pub struct MockServices {
    dimensions: usize,
    default_reply: String,
    fixed_vectors: Mutex<HashMap<String, Vec<f32>>>,
    embed_queue: Mutex<VecDeque<EmbedResult>>,
    rerank_queue: Mutex<VecDeque<RerankResult>>,
    chat_queue: Mutex<VecDeque<ChatResult>>,
    embed_calls: Mutex<Vec<EmbedCall>>,
    rerank_calls: Mutex<Vec<RerankCall>>,
    chat_calls: Mutex<Vec<ChatRequest>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockServices {
    pub fn new() -> Self {
        Self {
            dimensions: DEFAULT_DIMENSIONS,
            default_reply: "I'm a mock model. No queued responses available.".to_string(),
            fixed_vectors: Mutex::new(HashMap::new()),
            embed_queue: Mutex::new(VecDeque::new()),
            rerank_queue: Mutex::new(VecDeque::new()),
            chat_queue: Mutex::new(VecDeque::new()),
            embed_calls: Mutex::new(Vec::new()),
            rerank_calls: Mutex::new(Vec::new()),
            chat_calls: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock whose chat service always answers `text`.
    pub fn with_reply(text: &str) -> Self {
        Self {
            default_reply: text.to_string(),
            ..Self::new()
        }
    }

    /// Change the dimensionality of hashed embeddings.
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = dimensions.max(1);
        self
    }

    /// Always embed `text` as `vector` instead of hashing it.
    pub fn set_vector(&self, text: &str, vector: Vec<f32>) {
        lock(&self.fixed_vectors).insert(text.to_string(), vector);
    }

    /// Queue the result of the next embed call.
    pub fn queue_embed(&self, result: EmbedResult) {
        lock(&self.embed_queue).push_back(result);
    }

    /// Queue the result of the next rerank call.
    pub fn queue_rerank(&self, result: RerankResult) {
        lock(&self.rerank_queue).push_back(result);
    }

    /// Queue the result of the next chat call.
    pub fn queue_chat(&self, result: ChatResult) {
        lock(&self.chat_queue).push_back(result);
    }

    pub fn embed_calls(&self) -> Vec<EmbedCall> {
        lock(&self.embed_calls).clone()
    }

    pub fn rerank_calls(&self) -> Vec<RerankCall> {
        lock(&self.rerank_calls).clone()
    }

    pub fn chat_calls(&self) -> Vec<ChatRequest> {
        lock(&self.chat_calls).clone()
    }

    /// The deterministic vector for `text`.
    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        if let Some(vector) = lock(&self.fixed_vectors).get(text) {
            return vector.clone();
        }
        hashed_vector(text, self.dimensions)
    }
}

impl Default for MockServices {
    fn default() -> Self {
        Self::new()
    }
}

fn simple_hash(s: &str) -> usize {
    let mut hash: usize = 5381;
    for b in s.bytes() {
        hash = hash.wrapping_mul(33).wrapping_add(b as usize);
    }
    hash
}

fn words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_string())
        .collect()
}

/// Term-frequency vector with each term hashed into a dimension, L2-normalized.
fn hashed_vector(text: &str, dimensions: usize) -> Vec<f32> {
    let mut vector = vec![0.0f32; dimensions];
    for word in words(text) {
        vector[simple_hash(&word) % dimensions] += 1.0;
    }
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in &mut vector {
            *v /= norm;
        }
    }
    vector
}

/// Fraction of the query's distinct words that occur in `document`.
fn overlap_score(query_words: &HashSet<String>, document: &str) -> f32 {
    if query_words.is_empty() {
        return 0.0;
    }
    let doc_words: HashSet<String> = words(document).into_iter().collect();
    let shared = query_words.intersection(&doc_words).count();
    shared as f32 / query_words.len() as f32
}

#[async_trait]
impl EmbeddingService for MockServices {
    async fn embed(
        &self,
        texts: &[String],
        purpose: EmbedPurpose,
    ) -> Result<Vec<Vec<f32>>, ProviderError> {
        lock(&self.embed_calls).push(EmbedCall {
            texts: texts.to_vec(),
            purpose,
        });
        if let Some(result) = lock(&self.embed_queue).pop_front() {
            return result;
        }
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }

    fn model_name(&self) -> &str {
        MOCK_MODEL
    }
}

#[async_trait]
impl RerankService for MockServices {
    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        top_n: usize,
    ) -> Result<Vec<RerankHit>, ProviderError> {
        lock(&self.rerank_calls).push(RerankCall {
            query: query.to_string(),
            documents: documents.to_vec(),
            top_n,
        });
        if let Some(result) = lock(&self.rerank_queue).pop_front() {
            return result;
        }

        let query_words: HashSet<String> = words(query).into_iter().collect();
        let mut hits: Vec<RerankHit> = documents
            .iter()
            .enumerate()
            .map(|(index, doc)| RerankHit {
                index,
                document_text: Some(doc.clone()),
                relevance_score: overlap_score(&query_words, doc),
            })
            .collect();
        hits.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(top_n);
        Ok(hits)
    }

    fn model_name(&self) -> &str {
        MOCK_MODEL
    }
}

#[async_trait]
impl ChatService for MockServices {
    async fn chat(&self, request: ChatRequest) -> Result<ChatReply, ProviderError> {
        lock(&self.chat_calls).push(request);
        if let Some(result) = lock(&self.chat_queue).pop_front() {
            return result;
        }
        Ok(ChatReply {
            text: self.default_reply.clone(),
        })
    }

    fn model_name(&self) -> &str {
        MOCK_MODEL
    }
}
