//! Relevance reranking of similarity candidates.

use mangrove_core::{Document, RerankService, RetryConfig, with_retry};
use std::sync::Arc;

/// Why reranking degraded to the incoming order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    /// The rerank service failed after all retries.
    ServiceUnavailable,
    /// The service returned a result that maps to no candidate.
    UnmatchedResult,
}

impl std::fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FallbackReason::ServiceUnavailable => write!(f, "rerank service unavailable"),
            FallbackReason::UnmatchedResult => write!(f, "unmatched rerank result"),
        }
    }
}

/// Result of a rerank step.
#[derive(Debug, Clone, PartialEq)]
pub enum RerankOutcome<'a> {
    /// Documents in the service's relevance order.
    Ranked(Vec<&'a Document>),
    /// The first `top_n` candidates in their incoming order.
    Fallback {
        docs: Vec<&'a Document>,
        reason: FallbackReason,
    },
}

impl<'a> RerankOutcome<'a> {
    pub fn docs(&self) -> &[&'a Document] {
        match self {
            RerankOutcome::Ranked(docs) => docs,
            RerankOutcome::Fallback { docs, .. } => docs,
        }
    }

    pub fn into_docs(self) -> Vec<&'a Document> {
        match self {
            RerankOutcome::Ranked(docs) => docs,
            RerankOutcome::Fallback { docs, .. } => docs,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, RerankOutcome::Fallback { .. })
    }
}

/// Reorders candidates with the remote rerank service.
pub struct Reranker {
    service: Arc<dyn RerankService>,
    retry: RetryConfig,
}

impl Reranker {
    pub fn new(service: Arc<dyn RerankService>, retry: RetryConfig) -> Self {
        Self { service, retry }
    }

    /// Keep the `top_n` most relevant candidates for `query`.
    ///
    /// Never fails: service errors and unmatched results degrade to
    /// [`RerankOutcome::Fallback`].
    pub async fn rerank<'a>(
        &self,
        query: &str,
        candidates: Vec<&'a Document>,
        top_n: usize,
    ) -> RerankOutcome<'a> {
        if candidates.is_empty() || top_n == 0 {
            return RerankOutcome::Ranked(Vec::new());
        }

        let texts: Vec<String> = candidates.iter().map(|d| d.content.clone()).collect();
        let hits = match with_retry(&self.retry, || self.service.rerank(query, &texts, top_n)).await
        {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    candidates = candidates.len(),
                    "Rerank service failed; keeping similarity order"
                );
                return fallback(candidates, top_n, FallbackReason::ServiceUnavailable);
            }
        };

        let mut ranked = Vec::with_capacity(hits.len().min(top_n));
        for hit in hits.iter().take(top_n) {
            let matched = match &hit.document_text {
                Some(text) => candidates
                    .get(hit.index)
                    .filter(|d| d.content == *text)
                    .or_else(|| candidates.iter().find(|d| d.content == *text)),
                None => candidates.get(hit.index),
            };
            match matched {
                Some(doc) => ranked.push(*doc),
                None => {
                    tracing::warn!(
                        index = hit.index,
                        score = hit.relevance_score,
                        "Rerank result matches no candidate; keeping similarity order"
                    );
                    return fallback(candidates, top_n, FallbackReason::UnmatchedResult);
                }
            }
        }
        RerankOutcome::Ranked(ranked)
    }
}

fn fallback<'a>(
    mut candidates: Vec<&'a Document>,
    top_n: usize,
    reason: FallbackReason,
) -> RerankOutcome<'a> {
    candidates.truncate(top_n);
    RerankOutcome::Fallback {
        docs: candidates,
        reason,
    }
}
