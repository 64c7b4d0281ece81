//! Embedded on-disk store backed by sled, records encoded with bincode.
//!
//! Trees:
//! - `documents`: doc id -> `Document`
//! - `term_weight`: term -> `TermStatistic`
//! - `inverted_index`: `e\0{term}\0{doc}` -> `IndexEntry`, plus the reverse
//!   `d{len:u32 BE}{doc}{term}` -> term used to drop a document's entries.

use std::collections::BTreeSet;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::{Batch, Db, Tree};

use super::{DocumentStore, InvertedIndexStore, TermStatisticStore};
use crate::{DocId, Document, Error, IndexEntry, Result, TermStatistic};

const DOCUMENTS: &str = "documents";
const TERM_WEIGHT: &str = "term_weight";
const INVERTED_INDEX: &str = "inverted_index";

/// Cheap to clone; clones share the same database handle.
#[derive(Clone)]
pub struct SledStore {
    db: Db,
    documents: Tree,
    terms: Tree,
    index: Tree,
}

impl SledStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_db(sled::open(path)?)
    }

    /// Store that lives only as long as the handle.
    pub fn temporary() -> Result<Self> {
        Self::from_db(sled::Config::new().temporary(true).open()?)
    }

    fn from_db(db: Db) -> Result<Self> {
        let documents = db.open_tree(DOCUMENTS)?;
        let terms = db.open_tree(TERM_WEIGHT)?;
        let index = db.open_tree(INVERTED_INDEX)?;
        Ok(Self { db, documents, terms, index })
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

fn encode<T: Serialize>(tree: &'static str, value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(|source| Error::Codec { tree, source })
}

fn decode<T: DeserializeOwned>(tree: &'static str, bytes: &[u8]) -> Result<T> {
    bincode::deserialize(bytes).map_err(|source| Error::Codec { tree, source })
}

fn forward_prefix(term: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(term.len() + 3);
    key.extend_from_slice(b"e\0");
    key.extend_from_slice(term.as_bytes());
    key.push(0);
    key
}

fn forward_key(term: &str, document_id: &str) -> Vec<u8> {
    let mut key = forward_prefix(term);
    key.extend_from_slice(document_id.as_bytes());
    key
}

fn reverse_prefix(document_id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(document_id.len() + 5);
    key.push(b'd');
    key.extend_from_slice(&(document_id.len() as u32).to_be_bytes());
    key.extend_from_slice(document_id.as_bytes());
    key
}

fn reverse_key(document_id: &str, term: &str) -> Vec<u8> {
    let mut key = reverse_prefix(document_id);
    key.extend_from_slice(term.as_bytes());
    key
}

impl DocumentStore for SledStore {
    fn document(&self, id: &str) -> Result<Option<Document>> {
        match self.documents.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(decode(DOCUMENTS, &bytes)?)),
            None => Ok(None),
        }
    }

    fn documents(&self) -> Result<Vec<Document>> {
        self.documents
            .iter()
            .values()
            .map(|bytes| decode(DOCUMENTS, &bytes?))
            .collect()
    }

    fn document_count(&self) -> Result<u64> {
        Ok(self.documents.len() as u64)
    }

    fn put_document(&self, doc: &Document) -> Result<()> {
        self.documents.insert(doc.id.as_bytes(), encode(DOCUMENTS, doc)?)?;
        Ok(())
    }

    fn delete_document(&self, id: &str) -> Result<bool> {
        Ok(self.documents.remove(id.as_bytes())?.is_some())
    }
}

impl TermStatisticStore for SledStore {
    fn term_statistic(&self, term: &str) -> Result<Option<TermStatistic>> {
        match self.terms.get(term.as_bytes())? {
            Some(bytes) => Ok(Some(decode(TERM_WEIGHT, &bytes)?)),
            None => Ok(None),
        }
    }

    fn record_occurrence(&self, term: &str, total_documents: u64) -> Result<TermStatistic> {
        // update_and_fetch retries the closure on a concurrent write to the same term
        let mut failure: Option<Error> = None;
        let updated = self.terms.update_and_fetch(term.as_bytes(), |old| {
            failure = None;
            let next = match old {
                None => TermStatistic::first(term, total_documents),
                Some(bytes) => match decode::<TermStatistic>(TERM_WEIGHT, bytes) {
                    Ok(stat) => stat.incremented(total_documents),
                    Err(e) => {
                        failure = Some(e);
                        return old.map(<[u8]>::to_vec);
                    }
                },
            };
            match encode(TERM_WEIGHT, &next) {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    failure = Some(e);
                    old.map(<[u8]>::to_vec)
                }
            }
        })?;
        if let Some(e) = failure {
            return Err(e);
        }
        match updated {
            Some(bytes) => decode(TERM_WEIGHT, &bytes),
            None => Ok(TermStatistic::first(term, total_documents)),
        }
    }

    fn release_occurrence(&self, term: &str, total_documents: u64) -> Result<Option<TermStatistic>> {
        let mut failure: Option<Error> = None;
        let updated = self.terms.update_and_fetch(term.as_bytes(), |old| {
            failure = None;
            let bytes = old?;
            let stat = match decode::<TermStatistic>(TERM_WEIGHT, bytes) {
                Ok(stat) => stat,
                Err(e) => {
                    failure = Some(e);
                    return Some(bytes.to_vec());
                }
            };
            match stat.decremented(total_documents).map(|next| encode(TERM_WEIGHT, &next)) {
                None => None,
                Some(Ok(encoded)) => Some(encoded),
                Some(Err(e)) => {
                    failure = Some(e);
                    Some(bytes.to_vec())
                }
            }
        })?;
        if let Some(e) = failure {
            return Err(e);
        }
        updated.map(|bytes| decode(TERM_WEIGHT, &bytes)).transpose()
    }

    fn term_count(&self) -> Result<u64> {
        Ok(self.terms.len() as u64)
    }

    fn clear_term_statistics(&self) -> Result<()> {
        self.terms.clear()?;
        Ok(())
    }
}

impl InvertedIndexStore for SledStore {
    fn insert_entries(&self, entries: &[IndexEntry]) -> Result<()> {
        let mut batch = Batch::default();
        for entry in entries {
            batch.insert(forward_key(&entry.term, &entry.document_id), encode(INVERTED_INDEX, entry)?);
            batch.insert(reverse_key(&entry.document_id, &entry.term), encode(INVERTED_INDEX, &entry.term)?);
        }
        self.index.apply_batch(batch)?;
        Ok(())
    }

    fn documents_with_terms(&self, terms: &[String]) -> Result<Vec<DocId>> {
        let mut ids = BTreeSet::new();
        for term in terms {
            for item in self.index.scan_prefix(forward_prefix(term)) {
                let (_, bytes) = item?;
                let entry: IndexEntry = decode(INVERTED_INDEX, &bytes)?;
                ids.insert(entry.document_id);
            }
        }
        Ok(ids.into_iter().collect())
    }

    fn entries_for_document(&self, document_id: &str, terms: &[String]) -> Result<Vec<IndexEntry>> {
        let mut entries = Vec::new();
        for term in terms {
            if let Some(bytes) = self.index.get(forward_key(term, document_id))? {
                entries.push(decode(INVERTED_INDEX, &bytes)?);
            }
        }
        Ok(entries)
    }

    fn remove_entries(&self, document_id: &str) -> Result<Vec<String>> {
        let mut batch = Batch::default();
        let mut removed = Vec::new();
        for item in self.index.scan_prefix(reverse_prefix(document_id)) {
            let (key, bytes) = item?;
            let term: String = decode(INVERTED_INDEX, &bytes)?;
            batch.remove(key);
            batch.remove(forward_key(&term, document_id));
            removed.push(term);
        }
        self.index.apply_batch(batch)?;
        Ok(removed)
    }

    fn clear_entries(&self) -> Result<()> {
        self.index.clear()?;
        Ok(())
    }
}
