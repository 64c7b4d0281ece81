pub mod error;
pub mod indexer;
pub mod model;
pub mod persist;
pub mod query;
pub mod store;
pub mod tokenizer;
pub mod weight;

pub use error::{Error, Result};
pub use indexer::{IndexReport, Indexer};
pub use model::{DocId, Document, IndexEntry, Similarity, TermStatistic};
pub use query::QueryEngine;
pub use store::{DocumentStore, InvertedIndexStore, MemoryStore, SearchStore, SledStore, TermStatisticStore};
