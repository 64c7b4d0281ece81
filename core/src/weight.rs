//! TF-IDF weighting and cosine similarity over sparse term vectors.

use std::collections::BTreeMap;

/// Sparse term-weight vector. Missing terms weigh zero; sums run in term
/// order, so equal vectors always produce bit-identical scores.
pub type WeightVector = BTreeMap<String, f64>;

/// Square root of the sum of squared occurrence counts of one document.
pub fn euclidean_norm(counts: &BTreeMap<String, u32>) -> f64 {
    counts.values().map(|&c| f64::from(c) * f64::from(c)).sum::<f64>().sqrt()
}

pub fn term_freq(occurrences: u32, norm: f64) -> f64 {
    if norm == 0.0 {
        return 0.0;
    }
    f64::from(occurrences) / norm
}

/// `ln(total / containing)`. `total` is clamped up to `containing` so the
/// result is never negative; a term with no documents weighs zero.
pub fn inverse_document_freq(containing: u64, total_documents: u64) -> f64 {
    if containing == 0 {
        return 0.0;
    }
    let total = total_documents.max(containing);
    (total as f64 / containing as f64).ln()
}

pub fn tf_idf(tf: f64, idf: f64) -> f64 {
    tf * idf
}

/// Dot product over the document's dimensions; terms the query lacks count as zero.
pub fn dot(query: &WeightVector, doc: &WeightVector) -> f64 {
    doc.iter()
        .map(|(term, w)| w * query.get(term).copied().unwrap_or(0.0))
        .sum()
}

pub fn magnitude(vector: &WeightVector) -> f64 {
    vector.values().map(|w| w * w).sum::<f64>().sqrt()
}

/// Cosine of the angle between two vectors, 0 when either has no magnitude.
pub fn cosine_similarity(query: &WeightVector, doc: &WeightVector) -> f64 {
    let denom = magnitude(query) * magnitude(doc);
    if denom == 0.0 || !denom.is_finite() {
        return 0.0;
    }
    dot(query, doc) / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector(pairs: &[(&str, f64)]) -> WeightVector {
        pairs.iter().map(|(t, w)| (t.to_string(), *w)).collect()
    }

    #[test]
    fn single_term_document_has_unit_tf() {
        let counts: BTreeMap<String, u32> = [("cat".to_string(), 5)].into_iter().collect();
        let norm = euclidean_norm(&counts);
        assert_eq!(norm, 5.0);
        assert_eq!(term_freq(5, norm), 1.0);
    }

    #[test]
    fn norm_is_root_of_squared_counts() {
        // deliberately not the token count (3)
        let counts: BTreeMap<String, u32> =
            [("cat".to_string(), 2), ("fish".to_string(), 1)].into_iter().collect();
        assert!((euclidean_norm(&counts) - 5f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn idf_is_natural_log_ratio() {
        assert!((inverse_document_freq(1, 10) - 10f64.ln()).abs() < 1e-12);
        assert_eq!(inverse_document_freq(3, 3), 0.0);
        assert_eq!(inverse_document_freq(4, 2), 0.0);
        assert_eq!(inverse_document_freq(0, 2), 0.0);
    }

    #[test]
    fn cosine_of_parallel_vectors_is_one() {
        let q = vector(&[("a", 1.0), ("b", 2.0)]);
        let d = vector(&[("a", 2.0), ("b", 4.0)]);
        assert!((cosine_similarity(&q, &d) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn cosine_ignores_insertion_order() {
        let q1 = vector(&[("a", 0.3), ("b", 1.1), ("c", 0.7)]);
        let q2 = vector(&[("c", 0.7), ("a", 0.3), ("b", 1.1)]);
        let d = vector(&[("b", 0.5), ("a", 0.2)]);
        assert_eq!(cosine_similarity(&q1, &d), cosine_similarity(&q2, &d));
    }

    #[test]
    fn identical_vectors_score_identically() {
        let q = vector(&[("k", 0.9), ("c", 0.4), ("x", 1.3), ("a", 0.2), ("m", 0.7), ("b", 1.1)]);
        let d1 = vector(&[("x", 0.31), ("a", 0.17), ("m", 0.05), ("c", 0.44), ("b", 0.29)]);
        let d2 = vector(&[("b", 0.29), ("c", 0.44), ("m", 0.05), ("a", 0.17), ("x", 0.31)]);
        for _ in 0..50 {
            assert_eq!(cosine_similarity(&q, &d1).to_bits(), cosine_similarity(&q, &d2).to_bits());
        }
    }

    #[test]
    fn zero_magnitude_scores_zero() {
        let q = vector(&[("a", 0.0)]);
        let d = vector(&[("a", 1.0)]);
        assert_eq!(cosine_similarity(&q, &d), 0.0);
        assert_eq!(cosine_similarity(&d, &WeightVector::new()), 0.0);
    }
}
