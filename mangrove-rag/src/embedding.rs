//! Embedding management: batching, retry and caching onto documents.

use crate::error::RagError;
use mangrove_core::{Document, EmbedPurpose, EmbeddingService, RetryConfig, with_retry};
use std::sync::Arc;
use tracing::{debug, info};

/// Obtains vectors from the embedding service.
///
/// Requests are split into groups of at most `batch_size` texts and each group
/// is retried independently. A group is only accepted when the service returned
/// exactly one vector per text and all vectors share one dimensionality.
pub struct EmbeddingManager {
    service: Arc<dyn EmbeddingService>,
    retry: RetryConfig,
    batch_size: usize,
}

impl EmbeddingManager {
    pub fn new(service: Arc<dyn EmbeddingService>, retry: RetryConfig, batch_size: usize) -> Self {
        Self {
            service,
            retry,
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Embed a single query string.
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>, RagError> {
        let mut vectors = self
            .embed_batch(&[text.to_string()], EmbedPurpose::SearchQuery, None)
            .await?;
        vectors.pop().ok_or_else(|| RagError::Embedding {
            message: "embedding service returned no vector for the query".to_string(),
        })
    }

    /// Embed `texts`, preserving order and cardinality.
    ///
    /// Either every vector is returned or the first failing batch's error is.
    pub async fn embed_texts(
        &self,
        texts: &[String],
        purpose: EmbedPurpose,
    ) -> Result<Vec<Vec<f32>>, RagError> {
        let mut all = Vec::with_capacity(texts.len());
        let mut dimensions = None;
        for batch in texts.chunks(self.batch_size) {
            let vectors = self.embed_batch(batch, purpose, dimensions).await?;
            dimensions = dimensions.or_else(|| vectors.first().map(|v| v.len()));
            all.extend(vectors);
        }
        Ok(all)
    }

    /// Attach embeddings to every document that does not have one yet.
    ///
    /// Returns the number of documents embedded by this call. When a batch
    /// fails, batches assigned before it stay cached and the error is returned.
    pub async fn ensure_embeddings(&self, documents: &mut [Document]) -> Result<usize, RagError> {
        let missing: Vec<usize> = documents
            .iter()
            .enumerate()
            .filter(|(_, doc)| !doc.is_embedded())
            .map(|(i, _)| i)
            .collect();
        if missing.is_empty() {
            return Ok(0);
        }

        let mut dimensions = documents
            .iter()
            .find_map(|doc| doc.embedding.as_ref().map(|e| e.len()));
        let batches = missing.len().div_ceil(self.batch_size);
        debug!(
            documents = missing.len(),
            batches,
            batch_size = self.batch_size,
            "Embedding documents"
        );

        let mut embedded = 0;
        for indices in missing.chunks(self.batch_size) {
            let texts: Vec<String> = indices
                .iter()
                .map(|&i| documents[i].content.clone())
                .collect();
            let vectors = self
                .embed_batch(&texts, EmbedPurpose::SearchDocument, dimensions)
                .await?;
            dimensions = dimensions.or_else(|| vectors.first().map(|v| v.len()));
            for (&i, vector) in indices.iter().zip(vectors) {
                documents[i].embedding = Some(vector);
            }
            embedded += indices.len();
        }

        info!(embedded, model = self.service.model_name(), "Documents embedded");
        Ok(embedded)
    }

    /// One retried request, validated for cardinality and dimensionality.
    async fn embed_batch(
        &self,
        texts: &[String],
        purpose: EmbedPurpose,
        expected_dimensions: Option<usize>,
    ) -> Result<Vec<Vec<f32>>, RagError> {
        let vectors = with_retry(&self.retry, || self.service.embed(texts, purpose))
            .await
            .map_err(RagError::embedding)?;

        if vectors.len() != texts.len() {
            return Err(RagError::Embedding {
                message: format!(
                    "expected {} vectors, service returned {}",
                    texts.len(),
                    vectors.len()
                ),
            });
        }

        let expected = expected_dimensions.or_else(|| vectors.first().map(|v| v.len()));
        if let Some(dim) = expected
            && let Some(bad) = vectors.iter().find(|v| v.len() != dim)
        {
            return Err(RagError::Embedding {
                message: format!(
                    "embedding dimensionality mismatch: expected {}, got {}",
                    dim,
                    bad.len()
                ),
            });
        }

        Ok(vectors)
    }
}
