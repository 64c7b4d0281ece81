use crate::store::{DocumentStore, SledStore, TermStatisticStore};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{create_dir_all, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

pub const META_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: u64,
    pub num_terms: u64,
    pub created_at: String,
    pub version: u32,
}

/// Layout of an index directory: the sled database plus `meta.json`.
pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn store(&self) -> PathBuf { self.root.join("store") }
    pub fn meta(&self) -> PathBuf { self.root.join("meta.json") }
}

pub fn open_store(paths: &IndexPaths) -> Result<SledStore> {
    create_dir_all(&paths.root)?;
    let store = SledStore::open(paths.store())
        .with_context(|| format!("opening index store at {}", paths.store().display()))?;
    Ok(store)
}

/// Snapshot the store's current counts.
pub fn describe(store: &SledStore, created_at: String) -> Result<MetaFile> {
    Ok(MetaFile {
        num_docs: store.document_count()?,
        num_terms: store.term_count()?,
        created_at,
        version: META_VERSION,
    })
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut w = BufWriter::new(File::create(paths.meta())?);
    serde_json::to_writer_pretty(&mut w, meta)?;
    w.flush()?;
    Ok(())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let f = File::open(paths.meta()).with_context(|| format!("reading meta file at {}", paths.meta().display()))?;
    Ok(serde_json::from_reader(BufReader::new(f))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Document;

    #[test]
    fn meta_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let paths = IndexPaths::new(dir.path().join("idx"));
        let store = open_store(&paths).unwrap();
        store.put_document(&Document::new("a", "A", "alpha")).unwrap();

        let meta = describe(&store, "2024-01-01T00:00:00Z".into()).unwrap();
        assert_eq!(meta.num_docs, 1);
        assert_eq!(meta.num_terms, 0);
        save_meta(&paths, &meta).unwrap();
        assert_eq!(load_meta(&paths).unwrap(), meta);
    }

    #[test]
    fn missing_or_corrupt_meta_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        let err = load_meta(&paths).unwrap_err();
        assert!(err.to_string().contains("meta.json"));

        std::fs::write(paths.meta(), "{\"num_docs\": ").unwrap();
        assert!(load_meta(&paths).is_err());
    }
}
