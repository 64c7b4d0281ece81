//! Turns documents into term statistics and inverted-index entries.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::store::SearchStore;
use crate::tokenizer::Tokenizer;
use crate::weight::{euclidean_norm, term_freq, tf_idf};
use crate::{DocId, Document, IndexEntry, Result};

/// Outcome of indexing one document.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexReport {
    pub document_id: DocId,
    pub distinct_terms: usize,
    pub norm: f64,
}

pub struct Indexer<'s, S: ?Sized> {
    store: &'s S,
}

impl<'s, S: SearchStore + ?Sized> Indexer<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// Index one document.
    ///
    /// Not idempotent: each call counts the document again in every term's
    /// document frequency and writes its entries again. Use [`Self::reindex`]
    /// for documents that may already be indexed.
    ///
    /// Weights use the corpus statistics at call time; entries of documents
    /// indexed earlier keep the idf they were written with.
    pub fn add_indexes(&self, document: &Document) -> Result<IndexReport> {
        let counts = count_occurrences(&document.text());
        let norm = euclidean_norm(&counts);
        if counts.is_empty() {
            debug!(doc = %document.id, "no indexable terms");
            return Ok(IndexReport { document_id: document.id.clone(), distinct_terms: 0, norm });
        }

        let total_documents = self.store.document_count()?;
        let mut idfs = Vec::with_capacity(counts.len());
        for term in counts.keys() {
            match self.store.record_occurrence(term, total_documents) {
                Ok(stat) => idfs.push(stat.idf),
                Err(e) => {
                    self.rollback(counts.keys().take(idfs.len()), total_documents, &document.id);
                    return Err(e);
                }
            }
        }

        // written last and in one batch: a document without entries is unindexed
        let entries: Vec<IndexEntry> = counts
            .iter()
            .zip(idfs)
            .map(|((term, &occurrences), idf)| {
                let tf = term_freq(occurrences, norm);
                IndexEntry {
                    term: term.clone(),
                    document_id: document.id.clone(),
                    tf,
                    tf_idf: tf_idf(tf, idf),
                }
            })
            .collect();
        if let Err(e) = self.store.insert_entries(&entries) {
            self.rollback(counts.keys(), total_documents, &document.id);
            return Err(e);
        }

        debug!(doc = %document.id, terms = entries.len(), norm, total_documents, "indexed document");
        Ok(IndexReport { document_id: document.id.clone(), distinct_terms: entries.len(), norm })
    }

    /// Undo the occurrences a failed `add_indexes` already recorded, so the
    /// document is left unindexed.
    fn rollback<'t>(&self, terms: impl Iterator<Item = &'t String>, total_documents: u64, document_id: &str) {
        for term in terms {
            if let Err(e) = self.store.release_occurrence(term, total_documents) {
                warn!(doc = document_id, term = %term, error = %e, "could not roll back term statistic");
            }
        }
    }

    /// Drop a document's entries and release its terms from the corpus
    /// statistics. The terms come from the document's own stored entries,
    /// not from its current text. Returns how many entries were removed.
    pub fn remove_indexes(&self, document_id: &str) -> Result<usize> {
        let terms = self.store.remove_entries(document_id)?;
        if terms.is_empty() {
            return Ok(0);
        }
        let total_documents = self.store.document_count()?;
        for term in &terms {
            self.store.release_occurrence(term, total_documents)?;
        }
        debug!(doc = document_id, terms = terms.len(), "removed document from index");
        Ok(terms.len())
    }

    /// Remove whatever is indexed for the document, then index it afresh.
    pub fn reindex(&self, document: &Document) -> Result<IndexReport> {
        self.remove_indexes(&document.id)?;
        self.add_indexes(document)
    }

    /// Rebuild the whole index from the document store.
    ///
    /// Existing statistics and entries are cleared first, so every weight is
    /// computed against the current corpus size.
    pub fn reindex_all(&self) -> Result<usize> {
        self.store.clear_entries()?;
        self.store.clear_term_statistics()?;
        let documents = self.store.documents()?;
        for document in &documents {
            self.add_indexes(document)?;
        }
        info!(documents = documents.len(), terms = self.store.term_count()?, "index rebuilt");
        Ok(documents.len())
    }
}

/// Raw occurrence count per term, skipping whitespace and markup tokens.
pub fn count_occurrences(text: &str) -> BTreeMap<String, u32> {
    let mut frequency = BTreeMap::new();
    for token in Tokenizer::new(text) {
        if token.is_space() || token.is_markup() {
            continue;
        }
        *frequency.entry(token.into_text()).or_insert(0) += 1;
    }
    frequency
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DocumentStore, InvertedIndexStore, MemoryStore, TermStatisticStore};

    fn df(store: &MemoryStore, term: &str) -> u64 {
        store.term_statistic(term).unwrap().map_or(0, |s| s.total_documents_containing_term)
    }

    #[test]
    fn counts_skip_markup_and_separators() {
        let counts = count_occurrences("<p>Cat, cat &amp; DOG</p>");
        let expected: BTreeMap<String, u32> =
            [("cat".to_string(), 2), ("dog".to_string(), 1)].into_iter().collect();
        assert_eq!(counts, expected);
    }

    #[test]
    fn tags_and_title_are_indexed() {
        let doc = Document::new("d1", "Rust", "systems").with_tags(["fast"]);
        let store = MemoryStore::with_documents([doc.clone()]);
        let report = Indexer::new(&store).add_indexes(&doc).unwrap();
        assert_eq!(report.distinct_terms, 3);
        for term in ["rust", "systems", "fast"] {
            assert_eq!(df(&store, term), 1);
        }
    }

    #[test]
    fn single_term_document_has_unit_tf() {
        let doc = Document::new("d1", "", "echo echo echo");
        let store = MemoryStore::with_documents([doc.clone(), Document::new("d2", "", "other")]);
        let report = Indexer::new(&store).add_indexes(&doc).unwrap();
        assert_eq!(report.norm, 3.0);
        let entries = store.entries_for_document("d1", &["echo".to_string()]).unwrap();
        assert_eq!(entries[0].tf, 1.0);
        assert!((entries[0].tf_idf - 2f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn add_indexes_double_counts() {
        let doc = Document::new("d1", "", "cat dog");
        let store = MemoryStore::with_documents([doc.clone()]);
        let indexer = Indexer::new(&store);
        indexer.add_indexes(&doc).unwrap();
        indexer.add_indexes(&doc).unwrap();
        assert_eq!(df(&store, "cat"), 2);
    }

    #[test]
    fn reindex_is_idempotent() {
        let doc = Document::new("d1", "", "cat dog");
        let store = MemoryStore::with_documents([doc.clone(), Document::new("d2", "", "cat")]);
        let indexer = Indexer::new(&store);
        indexer.reindex(&doc).unwrap();
        let once = store.entries_for_document("d1", &["cat".into(), "dog".into()]).unwrap();
        indexer.reindex(&doc).unwrap();
        assert_eq!(df(&store, "cat"), 1);
        assert_eq!(store.entry_count(), 2);
        assert_eq!(store.entries_for_document("d1", &["cat".into(), "dog".into()]).unwrap(), once);
    }

    #[test]
    fn remove_uses_stored_terms_not_current_text() {
        let original = Document::new("d1", "", "cat dog");
        let store = MemoryStore::with_documents([original.clone(), Document::new("d2", "", "cat")]);
        let indexer = Indexer::new(&store);
        indexer.add_indexes(&original).unwrap();
        indexer.add_indexes(&Document::new("d2", "", "cat")).unwrap();

        // the stored text changes before removal; removal still releases cat and dog
        store.put_document(&Document::new("d1", "", "fish")).unwrap();
        assert_eq!(indexer.remove_indexes("d1").unwrap(), 2);
        assert_eq!(df(&store, "cat"), 1);
        assert_eq!(df(&store, "dog"), 0);
        assert_eq!(df(&store, "fish"), 0);
        assert_eq!(store.documents_with_terms(&["cat".into()]).unwrap(), vec!["d2".to_string()]);
    }

    #[test]
    fn reindex_all_starts_from_empty_statistics() {
        let docs = [Document::new("a", "", "x y"), Document::new("b", "", "x")];
        let store = MemoryStore::with_documents(docs.clone());
        let indexer = Indexer::new(&store);
        indexer.add_indexes(&docs[0]).unwrap();
        assert_eq!(indexer.reindex_all().unwrap(), 2);
        assert_eq!(df(&store, "x"), 2);
        assert_eq!(df(&store, "y"), 1);
        assert_eq!(store.entry_count(), 3);
    }

    #[test]
    fn empty_document_writes_nothing() {
        let doc = Document::new("d1", "", " <br/> ... ");
        let store = MemoryStore::with_documents([doc.clone()]);
        let report = Indexer::new(&store).add_indexes(&doc).unwrap();
        assert_eq!(report.distinct_terms, 0);
        assert_eq!(store.term_count().unwrap(), 0);
        assert_eq!(store.entry_count(), 0);
    }

    /// Delegates to a `MemoryStore` but fails the next `insert_entries`.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        fail_next_insert: std::sync::atomic::AtomicBool,
    }

    impl DocumentStore for FlakyStore {
        fn document(&self, id: &str) -> Result<Option<Document>> { self.inner.document(id) }
        fn documents(&self) -> Result<Vec<Document>> { self.inner.documents() }
        fn document_count(&self) -> Result<u64> { self.inner.document_count() }
        fn put_document(&self, doc: &Document) -> Result<()> { self.inner.put_document(doc) }
        fn delete_document(&self, id: &str) -> Result<bool> { self.inner.delete_document(id) }
    }

    impl TermStatisticStore for FlakyStore {
        fn term_statistic(&self, term: &str) -> Result<Option<crate::TermStatistic>> { self.inner.term_statistic(term) }
        fn record_occurrence(&self, term: &str, total: u64) -> Result<crate::TermStatistic> {
            self.inner.record_occurrence(term, total)
        }
        fn release_occurrence(&self, term: &str, total: u64) -> Result<Option<crate::TermStatistic>> {
            self.inner.release_occurrence(term, total)
        }
        fn term_count(&self) -> Result<u64> { self.inner.term_count() }
        fn clear_term_statistics(&self) -> Result<()> { self.inner.clear_term_statistics() }
    }

    impl InvertedIndexStore for FlakyStore {
        fn insert_entries(&self, entries: &[IndexEntry]) -> Result<()> {
            if self.fail_next_insert.swap(false, std::sync::atomic::Ordering::SeqCst) {
                return Err(sled::Error::Unsupported("disk went away".into()).into());
            }
            self.inner.insert_entries(entries)
        }
        fn documents_with_terms(&self, terms: &[String]) -> Result<Vec<DocId>> { self.inner.documents_with_terms(terms) }
        fn entries_for_document(&self, id: &str, terms: &[String]) -> Result<Vec<IndexEntry>> {
            self.inner.entries_for_document(id, terms)
        }
        fn remove_entries(&self, id: &str) -> Result<Vec<String>> { self.inner.remove_entries(id) }
        fn clear_entries(&self) -> Result<()> { self.inner.clear_entries() }
    }

    #[test]
    fn failed_add_leaves_document_unindexed() {
        let doc = Document::new("d1", "", "cat dog");
        let store = FlakyStore::default();
        store.put_document(&doc).unwrap();
        store.put_document(&Document::new("d2", "", "cat")).unwrap();
        store.fail_next_insert.store(true, std::sync::atomic::Ordering::SeqCst);

        let indexer = Indexer::new(&store);
        assert!(matches!(indexer.add_indexes(&doc), Err(crate::Error::StoreUnavailable(_))));
        assert_eq!(store.term_count().unwrap(), 0);
        assert_eq!(store.inner.entry_count(), 0);

        // retrying in full counts the document exactly once
        indexer.reindex(&doc).unwrap();
        assert_eq!(df(&store.inner, "cat"), 1);
        assert_eq!(df(&store.inner, "dog"), 1);
        assert_eq!(store.inner.entry_count(), 2);
    }
}
