//! Core type definitions for Mangrove.
//!
//! Defines the data carried through the retrieval pipeline: document chunks
//! with their metadata and embeddings, and conversation messages.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Source label used in prompts when a document carries no `source`.
pub const UNKNOWN_SOURCE: &str = "Unknown Source";

/// Represents a participant role in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single turn of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Metadata attached to a document chunk by the chunking step.
///
/// `source` and `chunk_index` are always understood by the pipeline; any other
/// provider- or loader-specific field lands in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Identifier of the originating file (usually its file name).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Position of the chunk within its source.
    #[serde(default)]
    pub chunk_index: usize,
    /// Additional fields, e.g. `file_path`.
    #[serde(default, flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl DocumentMetadata {
    pub fn new(source: impl Into<String>, chunk_index: usize) -> Self {
        Self {
            source: Some(source.into()),
            chunk_index,
            extra: HashMap::new(),
        }
    }

    /// Attach an additional metadata field.
    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// A content chunk of the corpus.
///
/// The embedding is attached lazily and is the only field that changes after
/// the document has been created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    #[serde(default)]
    pub metadata: DocumentMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Document {
    pub fn new(content: impl Into<String>, metadata: DocumentMetadata) -> Self {
        Self {
            content: content.into(),
            metadata,
            embedding: None,
        }
    }

    /// The document's `source`, if any.
    pub fn source(&self) -> Option<&str> {
        self.metadata.source.as_deref()
    }

    /// The `source` label rendered into prompts.
    pub fn source_label(&self) -> &str {
        self.source().unwrap_or(UNKNOWN_SOURCE)
    }

    pub fn is_embedded(&self) -> bool {
        self.embedding.is_some()
    }
}
