//! Property-based tests for similarity, candidate selection and chunking.

use proptest::prelude::*;

use mangrove_core::{Document, DocumentMetadata};
use mangrove_rag::{RecursiveSplitter, cosine_similarity, retrieve_candidates};

fn vector(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    prop::collection::vec(-100.0f32..100.0, dim)
}

fn norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

// --- Cosine similarity ---

proptest! {
    #[test]
    fn cosine_is_symmetric(a in vector(8), b in vector(8)) {
        prop_assert_eq!(cosine_similarity(&a, &b), cosine_similarity(&b, &a));
    }

    #[test]
    fn cosine_self_similarity_is_one(a in vector(16)) {
        prop_assume!(norm(&a) > 1e-3);
        prop_assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-4);
    }

    #[test]
    fn cosine_is_bounded_and_finite(a in vector(8), b in vector(8)) {
        let score = cosine_similarity(&a, &b);
        prop_assert!(score.is_finite());
        prop_assert!((-1.0001..=1.0001).contains(&score));
    }
}

// --- Candidate selection ---

proptest! {
    #[test]
    fn retrieve_respects_top_k_and_order(
        vectors in prop::collection::vec(prop::option::of(vector(4)), 0..20),
        query in vector(4),
        top_k in 0usize..10,
    ) {
        let documents: Vec<Document> = vectors
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let mut doc = Document::new(format!("doc {i}"), DocumentMetadata::new("p.txt", i));
                doc.embedding = v.clone();
                doc
            })
            .collect();
        let embedded = documents.iter().filter(|d| d.is_embedded()).count();

        let results = retrieve_candidates(&query, &documents, top_k);

        prop_assert_eq!(results.len(), top_k.min(embedded));
        prop_assert!(results.iter().all(|(d, _)| d.is_embedded()));
        for pair in results.windows(2) {
            prop_assert!(pair[0].1 >= pair[1].1);
        }
    }
}

// --- Chunking ---

proptest! {
    #[test]
    fn chunks_fit_chunk_size(
        text in "[a-z \n]{0,300}",
        chunk_size in 10usize..60,
        overlap_pct in 0usize..50,
    ) {
        let splitter = RecursiveSplitter::new(chunk_size, chunk_size * overlap_pct / 100);
        for chunk in splitter.split(&text) {
            prop_assert!(chunk.chars().count() <= chunk_size);
            prop_assert!(!chunk.trim().is_empty());
        }
    }
}
