//! Cosine-similarity candidate selection.

use mangrove_core::Document;

/// Cosine similarity of two vectors.
///
/// Returns 0.0 when either vector has zero norm or the lengths differ, so the
/// result is never NaN.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let score = dot / (norm_a * norm_b);
    if score.is_finite() { score } else { 0.0 }
}

/// Score every embedded document against `query_vector` and keep the best `top_k`.
///
/// Documents without an embedding are skipped. Ties keep corpus order.
pub fn retrieve_candidates<'a>(
    query_vector: &[f32],
    documents: &'a [Document],
    top_k: usize,
) -> Vec<(&'a Document, f32)> {
    let mut scored: Vec<(&Document, f32)> = documents
        .iter()
        .filter_map(|doc| {
            doc.embedding
                .as_ref()
                .map(|e| (doc, cosine_similarity(query_vector, e)))
        })
        .collect();
    // `sort_by` is stable.
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.truncate(top_k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use mangrove_core::DocumentMetadata;
    use pretty_assertions::assert_eq;

    fn embedded(content: &str, vector: Vec<f32>) -> Document {
        let mut doc = Document::new(content, DocumentMetadata::new("t.txt", 0));
        doc.embedding = Some(vector);
        doc
    }

    #[test]
    fn test_cosine_identical_and_orthogonal() {
        assert!((cosine_similarity(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn test_retrieve_orders_by_score() {
        let documents = vec![
            embedded("far", vec![0.0, 1.0]),
            embedded("near", vec![1.0, 0.1]),
            embedded("middle", vec![1.0, 1.0]),
        ];
        let results = retrieve_candidates(&[1.0, 0.0], &documents, 5);
        let order: Vec<&str> = results.iter().map(|(d, _)| d.content.as_str()).collect();
        assert_eq!(order, vec!["near", "middle", "far"]);
    }

    #[test]
    fn test_retrieve_skips_unembedded_and_respects_top_k() {
        let mut documents = vec![
            embedded("a", vec![1.0, 0.0]),
            Document::new("pending", DocumentMetadata::default()),
            embedded("b", vec![0.5, 0.5]),
        ];
        let results = retrieve_candidates(&[1.0, 0.0], &documents, 5);
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|(d, _)| d.content != "pending"));

        documents.push(embedded("c", vec![0.2, 0.9]));
        assert_eq!(retrieve_candidates(&[1.0, 0.0], &documents, 2).len(), 2);
        assert!(retrieve_candidates(&[1.0, 0.0], &documents, 0).is_empty());
    }

    #[test]
    fn test_retrieve_ties_keep_corpus_order() {
        let documents = vec![
            embedded("first", vec![1.0, 0.0]),
            embedded("second", vec![2.0, 0.0]),
            embedded("third", vec![3.0, 0.0]),
        ];
        let results = retrieve_candidates(&[1.0, 0.0], &documents, 3);
        let order: Vec<&str> = results.iter().map(|(d, _)| d.content.as_str()).collect();
        assert_eq!(order, vec!["first", "second", "third"]);
    }
}
