//! In-memory document store owned by a pipeline.

use mangrove_core::Document;
use std::collections::BTreeSet;

/// Ordered collection of corpus chunks.
///
/// Corpus order is significant: similarity ties are broken by it.
#[derive(Debug, Clone, Default)]
pub struct DocumentStore {
    documents: Vec<Document>,
}

impl DocumentStore {
    /// Build a store, dropping documents with blank content.
    pub fn new(documents: Vec<Document>) -> Self {
        let total = documents.len();
        let documents: Vec<Document> = documents
            .into_iter()
            .filter(|doc| !doc.content.trim().is_empty())
            .collect();
        if documents.len() < total {
            tracing::warn!(
                skipped = total - documents.len(),
                "Skipping documents with empty content"
            );
        }
        Self { documents }
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub(crate) fn documents_mut(&mut self) -> &mut [Document] {
        &mut self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Number of documents that already carry an embedding.
    pub fn embedded_count(&self) -> usize {
        self.documents.iter().filter(|d| d.is_embedded()).count()
    }

    /// Distinct `source` values in the corpus, sorted.
    pub fn sources(&self) -> Vec<String> {
        self.documents
            .iter()
            .filter_map(|d| d.source())
            .map(|s| s.to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mangrove_core::DocumentMetadata;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_blank_documents_are_dropped() {
        let store = DocumentStore::new(vec![
            Document::new("Mangroves store carbon", DocumentMetadata::new("a.txt", 0)),
            Document::new("   \n", DocumentMetadata::new("a.txt", 1)),
            Document::new("Roots trap sediment", DocumentMetadata::new("b.txt", 0)),
        ]);
        assert_eq!(store.len(), 2);
        assert_eq!(store.documents()[1].content, "Roots trap sediment");
    }

    #[test]
    fn test_sources_are_distinct_and_sorted() {
        let store = DocumentStore::new(vec![
            Document::new("x", DocumentMetadata::new("b.txt", 0)),
            Document::new("y", DocumentMetadata::new("a.txt", 0)),
            Document::new("z", DocumentMetadata::new("b.txt", 1)),
            Document::new("w", DocumentMetadata::default()),
        ]);
        assert_eq!(store.sources(), vec!["a.txt", "b.txt"]);
        assert_eq!(store.embedded_count(), 0);
    }
}
