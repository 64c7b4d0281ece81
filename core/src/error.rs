use crate::DocId;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures surfaced by indexing and querying.
///
/// Missing term statistics and zero-magnitude vectors are not errors; the
/// query engine treats both as zero weight.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] sled::Error),
    #[error("corrupt record in `{tree}`: {source}")]
    Codec {
        tree: &'static str,
        #[source]
        source: bincode::Error,
    },
    #[error("document not found: {0}")]
    DocumentNotFound(DocId),
}
