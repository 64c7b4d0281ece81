//! In-memory store for tests, benches and embedding.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use parking_lot::RwLock;

use super::{DocumentStore, InvertedIndexStore, TermStatisticStore};
use crate::{DocId, Document, IndexEntry, Result, TermStatistic};

#[derive(Default)]
pub struct MemoryStore {
    documents: RwLock<BTreeMap<DocId, Document>>,
    terms: RwLock<HashMap<String, TermStatistic>>,
    // term -> document -> entry
    entries: RwLock<HashMap<String, BTreeMap<DocId, IndexEntry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_documents<I>(docs: I) -> Self
    where
        I: IntoIterator<Item = Document>,
    {
        let store = Self::new();
        store.documents.write().extend(docs.into_iter().map(|d| (d.id.clone(), d)));
        store
    }

    /// Total entries across all terms.
    pub fn entry_count(&self) -> usize {
        self.entries.read().values().map(BTreeMap::len).sum()
    }
}

impl DocumentStore for MemoryStore {
    fn document(&self, id: &str) -> Result<Option<Document>> {
        Ok(self.documents.read().get(id).cloned())
    }

    fn documents(&self) -> Result<Vec<Document>> {
        Ok(self.documents.read().values().cloned().collect())
    }

    fn document_count(&self) -> Result<u64> {
        Ok(self.documents.read().len() as u64)
    }

    fn put_document(&self, doc: &Document) -> Result<()> {
        self.documents.write().insert(doc.id.clone(), doc.clone());
        Ok(())
    }

    fn delete_document(&self, id: &str) -> Result<bool> {
        Ok(self.documents.write().remove(id).is_some())
    }
}

impl TermStatisticStore for MemoryStore {
    fn term_statistic(&self, term: &str) -> Result<Option<TermStatistic>> {
        Ok(self.terms.read().get(term).cloned())
    }

    fn record_occurrence(&self, term: &str, total_documents: u64) -> Result<TermStatistic> {
        let mut terms = self.terms.write();
        let next = match terms.get(term) {
            Some(stat) => stat.incremented(total_documents),
            None => TermStatistic::first(term, total_documents),
        };
        terms.insert(term.to_string(), next.clone());
        Ok(next)
    }

    fn release_occurrence(&self, term: &str, total_documents: u64) -> Result<Option<TermStatistic>> {
        let mut terms = self.terms.write();
        let Some(stat) = terms.get(term) else {
            return Ok(None);
        };
        match stat.decremented(total_documents) {
            Some(next) => {
                terms.insert(term.to_string(), next.clone());
                Ok(Some(next))
            }
            None => {
                terms.remove(term);
                Ok(None)
            }
        }
    }

    fn term_count(&self) -> Result<u64> {
        Ok(self.terms.read().len() as u64)
    }

    fn clear_term_statistics(&self) -> Result<()> {
        self.terms.write().clear();
        Ok(())
    }
}

impl InvertedIndexStore for MemoryStore {
    fn insert_entries(&self, entries: &[IndexEntry]) -> Result<()> {
        let mut index = self.entries.write();
        for entry in entries {
            index
                .entry(entry.term.clone())
                .or_default()
                .insert(entry.document_id.clone(), entry.clone());
        }
        Ok(())
    }

    fn documents_with_terms(&self, terms: &[String]) -> Result<Vec<DocId>> {
        let index = self.entries.read();
        let ids: BTreeSet<DocId> = terms
            .iter()
            .filter_map(|t| index.get(t))
            .flat_map(|postings| postings.keys().cloned())
            .collect();
        Ok(ids.into_iter().collect())
    }

    fn entries_for_document(&self, document_id: &str, terms: &[String]) -> Result<Vec<IndexEntry>> {
        let index = self.entries.read();
        Ok(terms
            .iter()
            .filter_map(|t| index.get(t)?.get(document_id).cloned())
            .collect())
    }

    fn remove_entries(&self, document_id: &str) -> Result<Vec<String>> {
        let mut index = self.entries.write();
        let mut removed = Vec::new();
        index.retain(|term, postings| {
            if postings.remove(document_id).is_some() {
                removed.push(term.clone());
            }
            !postings.is_empty()
        });
        removed.sort();
        Ok(removed)
    }

    fn clear_entries(&self) -> Result<()> {
        self.entries.write().clear();
        Ok(())
    }
}
