//! Error types for the retrieval pipeline.

use mangrove_core::{ConfigError, ProviderError};
use std::path::PathBuf;

/// Errors surfaced by [`RagPipeline`](crate::RagPipeline) operations.
///
/// Rerank failures never appear here; they degrade to
/// [`RerankOutcome::Fallback`](crate::RerankOutcome::Fallback).
#[derive(Debug, thiserror::Error)]
pub enum RagError {
    #[error("Embedding failed: {message}")]
    Embedding { message: String },

    #[error("Response generation failed: {message}")]
    Generation { message: String },

    #[error("Invalid request: {message}")]
    Validation { message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Ingestion error: {0}")]
    Ingest(#[from] IngestError),
}

impl RagError {
    pub(crate) fn embedding(err: ProviderError) -> Self {
        RagError::Embedding {
            message: err.to_string(),
        }
    }

    pub(crate) fn generation(err: ProviderError) -> Self {
        RagError::Generation {
            message: err.to_string(),
        }
    }

    /// True when the failure came from a remote service rather than the caller.
    pub fn is_remote_failure(&self) -> bool {
        matches!(
            self,
            RagError::Embedding { .. } | RagError::Generation { .. }
        )
    }
}

/// Errors from loading documents off disk.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Unsupported document format: {path}")]
    UnsupportedFormat { path: PathBuf },
}
