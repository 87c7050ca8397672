//! End-to-end retrieval-augmented generation pipeline.
//!
//! A [`RagPipeline`] owns its corpus. Construction embeds every document;
//! queries then run similarity retrieval, reranking and generation:
//!
//! ```text
//! query -> embed_query -> retrieve_candidates (top_k) -> rerank (top_n)
//!       -> grounded prompt -> chat            (documents selected)
//!       -> raw query -> chat + web search     (no documents)
//! ```

use crate::embedding::EmbeddingManager;
use crate::error::RagError;
use crate::generator::{GeneratedResponse, ResponseGenerator};
use crate::prompt::PromptBuilder;
use crate::reranker::{RerankOutcome, Reranker};
use crate::retriever::retrieve_candidates;
use crate::store::DocumentStore;
use mangrove_core::{Document, MangroveConfig, Message, RetrievalConfig, Services};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Snapshot of pipeline contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStatus {
    pub documents: usize,
    pub embedded: usize,
    pub sources: usize,
}

pub struct RagPipeline {
    store: DocumentStore,
    embedder: EmbeddingManager,
    reranker: Reranker,
    generator: ResponseGenerator,
    retrieval: RetrievalConfig,
}

impl RagPipeline {
    /// Build a pipeline over `documents` and embed the whole corpus.
    pub async fn initialize(
        documents: Vec<Document>,
        services: Services,
        config: &MangroveConfig,
    ) -> Result<Self, RagError> {
        config.check()?;
        let retrieval = config.retrieval.clone();
        let mut pipeline = Self {
            store: DocumentStore::default(),
            embedder: EmbeddingManager::new(
                services.embedder,
                config.retry.clone(),
                retrieval.embed_batch_size,
            ),
            reranker: Reranker::new(services.reranker, config.retry.clone()),
            generator: ResponseGenerator::new(
                services.chat,
                config.retry.clone(),
                config.generation.clone(),
                PromptBuilder::new(retrieval.history_turns),
            ),
            retrieval,
        };
        pipeline.rebuild(documents).await?;
        Ok(pipeline)
    }

    /// Replace the corpus and embed it.
    pub async fn rebuild(&mut self, documents: Vec<Document>) -> Result<(), RagError> {
        self.store = DocumentStore::new(documents);
        let embedded = self
            .embedder
            .ensure_embeddings(self.store.documents_mut())
            .await?;
        info!(
            documents = self.store.len(),
            embedded,
            sources = self.store.sources().len(),
            "Pipeline corpus ready"
        );
        Ok(())
    }

    /// Embed any documents still missing an embedding.
    ///
    /// Only needed after a failed [`rebuild`](Self::rebuild).
    pub async fn resume_embedding(&mut self) -> Result<usize, RagError> {
        self.embedder
            .ensure_embeddings(self.store.documents_mut())
            .await
    }

    pub fn documents(&self) -> &[Document] {
        self.store.documents()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Distinct source names in the corpus, sorted.
    pub fn sources(&self) -> Vec<String> {
        self.store.sources()
    }

    pub fn status(&self) -> PipelineStatus {
        PipelineStatus {
            documents: self.store.len(),
            embedded: self.store.embedded_count(),
            sources: self.store.sources().len(),
        }
    }

    /// Similarity search for `top_k` candidates followed by reranking.
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<Document>, RagError> {
        let outcome = self.select(query, top_k).await?;
        Ok(outcome.into_docs().into_iter().cloned().collect())
    }

    /// Answer `query` given the earlier conversation.
    pub async fn generate_response(
        &self,
        query: &str,
        history: &[Message],
    ) -> Result<GeneratedResponse, RagError> {
        if query.trim().is_empty() {
            return Err(RagError::Validation {
                message: "query must not be empty".to_string(),
            });
        }

        if self.store.is_empty() {
            return self.generator.generate_fallback(query, history).await;
        }

        let outcome = self.select(query, self.retrieval.top_k).await?;
        let relevant = outcome.docs();
        if relevant.is_empty() {
            return self.generator.generate_fallback(query, history).await;
        }
        self.generator
            .generate_grounded(query, relevant, history)
            .await
    }

    /// Answer a conversation whose last message is the question.
    pub async fn answer(&self, messages: &[Message]) -> Result<GeneratedResponse, RagError> {
        let (query, history) = split_conversation(messages)?;
        self.generate_response(query, history).await
    }

    async fn select(&self, query: &str, top_k: usize) -> Result<RerankOutcome<'_>, RagError> {
        let query_vector = self.embedder.embed_query(query).await?;
        let candidates: Vec<&Document> =
            retrieve_candidates(&query_vector, self.store.documents(), top_k)
                .into_iter()
                .map(|(doc, score)| {
                    debug!(
                        source = doc.source_label(),
                        chunk = doc.metadata.chunk_index,
                        score,
                        "Candidate"
                    );
                    doc
                })
                .collect();
        let outcome = self
            .reranker
            .rerank(query, candidates, self.retrieval.rerank_top_n)
            .await;
        debug!(
            selected = outcome.docs().len(),
            fallback = outcome.is_fallback(),
            "Context selected"
        );
        Ok(outcome)
    }
}

/// Split a message list into the final question and the history before it.
pub fn split_conversation(messages: &[Message]) -> Result<(&str, &[Message]), RagError> {
    match messages.split_last() {
        Some((last, history)) => Ok((last.content.as_str(), history)),
        None => Err(RagError::Validation {
            message: "No messages provided".to_string(),
        }),
    }
}
