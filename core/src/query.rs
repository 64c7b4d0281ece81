//! Ranks indexed documents against a free-text query by cosine similarity.

use std::collections::HashSet;

use tracing::debug;

use crate::store::SearchStore;
use crate::tokenizer::Tokenizer;
use crate::weight::{cosine_similarity, WeightVector};
use crate::{DocId, Result, Similarity};

pub struct QueryEngine<'s, S: ?Sized> {
    store: &'s S,
}

impl<'s, S: SearchStore + ?Sized> QueryEngine<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// Document ids, most relevant first.
    ///
    /// An empty corpus or a query sharing no term with it yields an empty list.
    pub fn query(&self, text: &str) -> Result<Vec<DocId>> {
        Ok(self.similarities(text)?.into_iter().map(|s| s.document_id).collect())
    }

    /// Same ranking as [`Self::query`], with scores kept.
    ///
    /// Ordered by score descending, then by document id ascending.
    pub fn similarities(&self, text: &str) -> Result<Vec<Similarity>> {
        let terms = query_terms(text);
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        let candidates = self.store.documents_with_terms(&terms)?;
        debug!(?terms, candidates = candidates.len(), "retrieved candidates");
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let query = self.query_vector(&terms)?;
        let mut results = Vec::with_capacity(candidates.len());
        for document_id in candidates {
            let doc: WeightVector = self
                .store
                .entries_for_document(&document_id, &terms)?
                .into_iter()
                .map(|e| (e.term, e.tf_idf))
                .collect();
            let cosine = cosine_similarity(&query, &doc);
            results.push(Similarity { document_id, cosine });
        }
        sort_by_relevance(&mut results);
        Ok(results)
    }

    /// idf of each query term; terms unknown to the corpus weigh zero.
    fn query_vector(&self, terms: &[String]) -> Result<WeightVector> {
        let mut vector = WeightVector::new();
        for term in terms {
            let idf = self.store.term_statistic(term)?.map_or(0.0, |s| s.idf);
            vector.insert(term.clone(), idf);
        }
        Ok(vector)
    }
}

/// Distinct non-whitespace terms in first-occurrence order.
pub fn query_terms(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut terms = Vec::new();
    for token in Tokenizer::new(text) {
        if token.is_space() || seen.contains(token.text()) {
            continue;
        }
        seen.insert(token.text().to_string());
        terms.push(token.into_text());
    }
    terms
}

fn sort_by_relevance(results: &mut [Similarity]) {
    results.sort_by(|a, b| {
        b.cosine
            .total_cmp(&a.cosine)
            .then_with(|| a.document_id.cmp(&b.document_id))
    });
}
