//! Narrow repository interfaces the indexer and query engine run against.
//!
//! Every store is shared by reference across callers, so implementations
//! must be `Send + Sync` and must apply each term-statistic transition as a
//! single atomic read-modify-write.

mod memory;
mod sled_store;

pub use memory::MemoryStore;
pub use sled_store::SledStore;

use crate::{DocId, Document, IndexEntry, Result, TermStatistic};

pub trait DocumentStore: Send + Sync {
    fn document(&self, id: &str) -> Result<Option<Document>>;

    /// Every stored document, ascending by id.
    fn documents(&self) -> Result<Vec<Document>>;

    fn document_count(&self) -> Result<u64>;

    /// Insert or replace by id.
    fn put_document(&self, doc: &Document) -> Result<()>;

    fn delete_document(&self, id: &str) -> Result<bool>;
}

pub trait TermStatisticStore: Send + Sync {
    fn term_statistic(&self, term: &str) -> Result<Option<TermStatistic>>;

    /// Count one more document containing `term` and return the updated
    /// record. Creates the record on first sight.
    fn record_occurrence(&self, term: &str, total_documents: u64) -> Result<TermStatistic>;

    /// Count one fewer document containing `term`; deletes the record when
    /// no document is left. Unknown terms are ignored.
    fn release_occurrence(&self, term: &str, total_documents: u64) -> Result<Option<TermStatistic>>;

    fn term_count(&self) -> Result<u64>;

    fn clear_term_statistics(&self) -> Result<()>;
}

pub trait InvertedIndexStore: Send + Sync {
    fn insert_entries(&self, entries: &[IndexEntry]) -> Result<()>;

    /// Distinct ids of documents holding an entry for any of `terms`, ascending.
    fn documents_with_terms(&self, terms: &[String]) -> Result<Vec<DocId>>;

    /// Entries of one document restricted to `terms`.
    fn entries_for_document(&self, document_id: &str, terms: &[String]) -> Result<Vec<IndexEntry>>;

    /// Drop every entry of a document, returning the terms they covered.
    fn remove_entries(&self, document_id: &str) -> Result<Vec<String>>;

    fn clear_entries(&self) -> Result<()>;
}

/// Everything the indexer and query engine need from one backend.
pub trait SearchStore: DocumentStore + TermStatisticStore + InvertedIndexStore {}

impl<T> SearchStore for T where T: DocumentStore + TermStatisticStore + InvertedIndexStore {}
