//! # Mangrove Core
//!
//! Core library for the Mangrove document question-answering assistant.
//! Provides document and message types, layered configuration, the shared
//! retry policy, and the remote embedding, rerank and chat services.

pub mod config;
pub mod error;
pub mod providers;
pub mod types;

// Re-export commonly used types at the crate root.
pub use config::{
    GenerationConfig, IngestConfig, MangroveConfig, ProviderConfig, RetrievalConfig, RetryConfig,
};
pub use error::{ConfigError, ProviderError};
pub use providers::{
    ChatReply, ChatRequest, ChatService, ChatTurn, CohereClient, EmbedPurpose, EmbeddingService,
    MockServices, RerankHit, RerankService, Services, create_services, with_retry,
};
pub use types::{Document, DocumentMetadata, Message, Role, UNKNOWN_SOURCE};
