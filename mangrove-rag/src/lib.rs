//! # Mangrove RAG
//!
//! The retrieval-augmented generation pipeline: corpus storage, embedding
//! management, cosine-similarity retrieval, reranking with fallback, grounded
//! prompt construction and response generation. Also loads documents from
//! disk and splits text into chunks.

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod generator;
pub mod ingest;
pub mod pipeline;
pub mod prompt;
pub mod reranker;
pub mod retriever;
pub mod store;

pub use chunk::RecursiveSplitter;
pub use embedding::EmbeddingManager;
pub use error::{IngestError, RagError};
pub use generator::{GeneratedResponse, GenerationMode, ResponseGenerator};
pub use ingest::{DocumentLoader, SUPPORTED_EXTENSIONS, is_supported};
pub use pipeline::{PipelineStatus, RagPipeline, split_conversation};
pub use prompt::{PromptBuilder, build_prompt};
pub use reranker::{FallbackReason, RerankOutcome, Reranker};
pub use retriever::{cosine_similarity, retrieve_candidates};
pub use store::DocumentStore;
