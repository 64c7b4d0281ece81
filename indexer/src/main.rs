use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use cosine_core::persist::{describe, open_store, save_meta, IndexPaths};
use cosine_core::store::{DocumentStore, SledStore, TermStatisticStore};
use cosine_core::{Document, Indexer, QueryEngine};
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "cosine-indexer")]
#[command(about = "Build, extend and query a TF-IDF inverted index", long_about = None)]
struct Cli {
    /// Index directory
    #[arg(long, global = true, default_value = "./index")]
    index: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load documents from JSON/JSONL input and rebuild the whole index
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
    },
    /// Add or replace documents, re-indexing each one
    Add {
        #[arg(long)]
        input: String,
    },
    /// Remove documents and their index entries
    Remove {
        #[arg(long = "id", required = true)]
        ids: Vec<String>,
    },
    /// Rank documents against a query
    Search {
        query: String,
        #[arg(short, default_value_t = 10)]
        k: usize,
        /// Print cosine scores next to ids
        #[arg(long, default_value_t = false)]
        scores: bool,
    },
    /// Show corpus counts and per-term statistics
    Stats {
        #[arg(long = "term")]
        terms: Vec<String>,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();
    let paths = IndexPaths::new(&cli.index);
    let store = open_store(&paths)?;

    match cli.command {
        Commands::Build { input } => build_index(&store, &paths, &input),
        Commands::Add { input } => add_documents(&store, &paths, &input),
        Commands::Remove { ids } => remove_documents(&store, &paths, &ids),
        Commands::Search { query, k, scores } => search(&store, &query, k, scores),
        Commands::Stats { terms } => stats(&store, &terms),
    }
}

fn build_index(store: &SledStore, paths: &IndexPaths, input: &str) -> Result<()> {
    let docs = load_documents(Path::new(input))?;
    for doc in &docs {
        store.put_document(doc)?;
    }
    tracing::info!(loaded = docs.len(), "stored documents");
    let indexed = Indexer::new(store).reindex_all()?;
    finish(store, paths)?;
    tracing::info!(indexed, output = %paths.root.display(), "index build complete");
    Ok(())
}

fn add_documents(store: &SledStore, paths: &IndexPaths, input: &str) -> Result<()> {
    let docs = load_documents(Path::new(input))?;
    // store first so the corpus size already counts the whole batch
    for doc in &docs {
        store.put_document(doc)?;
    }
    let indexer = Indexer::new(store);
    for doc in &docs {
        let report = indexer.reindex(doc)?;
        tracing::debug!(doc = %report.document_id, terms = report.distinct_terms, "indexed");
    }
    finish(store, paths)?;
    tracing::info!(added = docs.len(), "documents indexed");
    Ok(())
}

fn remove_documents(store: &SledStore, paths: &IndexPaths, ids: &[String]) -> Result<()> {
    let indexer = Indexer::new(store);
    for id in ids {
        if store.document(id)?.is_none() {
            bail!(cosine_core::Error::DocumentNotFound(id.clone()));
        }
        // delete before releasing so idf is recomputed against the smaller corpus
        store.delete_document(id)?;
        let entries = indexer.remove_indexes(id)?;
        tracing::info!(doc = %id, entries, "removed document");
    }
    finish(store, paths)
}

fn search(store: &SledStore, query: &str, k: usize, scores: bool) -> Result<()> {
    let ranked = QueryEngine::new(store).similarities(query)?;
    if ranked.is_empty() {
        println!("no results");
        return Ok(());
    }
    for hit in ranked.iter().take(k.max(1)) {
        let title = store.document(&hit.document_id)?.map(|d| d.title).unwrap_or_default();
        if scores {
            println!("{:.6}\t{}\t{}", hit.cosine, hit.document_id, title);
        } else {
            println!("{}\t{}", hit.document_id, title);
        }
    }
    Ok(())
}

fn stats(store: &SledStore, terms: &[String]) -> Result<()> {
    println!("documents: {}", store.document_count()?);
    println!("terms: {}", store.term_count()?);
    for term in terms {
        match store.term_statistic(&term.to_lowercase())? {
            Some(stat) => println!("{}\tdf={}\tidf={:.6}", stat.term, stat.total_documents_containing_term, stat.idf),
            None => println!("{term}\tnot indexed"),
        }
    }
    Ok(())
}

fn finish(store: &SledStore, paths: &IndexPaths) -> Result<()> {
    store.flush()?;
    let created_at = time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "".into());
    save_meta(paths, &describe(store, created_at)?)?;
    Ok(())
}

/// Collect documents from a `.json`/`.jsonl` file or every such file under a directory.
fn load_documents(input: &Path) -> Result<Vec<Document>> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input.is_dir() {
        for entry in WalkDir::new(input).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() && matches!(extension(p), Some("json" | "jsonl")) {
                files.push(p.to_path_buf());
            }
        }
    } else if input.is_file() {
        files.push(input.to_path_buf());
    } else {
        bail!("input not found: {}", input.display());
    }

    let mut docs = Vec::new();
    for file in files {
        if extension(&file) == Some("jsonl") {
            read_jsonl(&file, &mut docs)?;
        } else {
            read_json(&file, &mut docs)?;
        }
    }
    Ok(docs)
}

fn extension(p: &Path) -> Option<&str> {
    p.extension().and_then(|s| s.to_str())
}

fn read_jsonl(file: &Path, docs: &mut Vec<Document>) -> Result<()> {
    let reader = BufReader::new(File::open(file)?);
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        docs.push(serde_json::from_str(&line)?);
    }
    Ok(())
}

fn read_json(file: &Path, docs: &mut Vec<Document>) -> Result<()> {
    let reader = BufReader::new(File::open(file)?);
    let json: serde_json::Value = serde_json::from_reader(reader)?;
    match json {
        serde_json::Value::Array(arr) => {
            for v in arr {
                docs.push(serde_json::from_value(v)?);
            }
        }
        serde_json::Value::Object(_) => docs.push(serde_json::from_value(json)?),
        _ => tracing::warn!(file = %file.display(), "skipping file without document objects"),
    }
    Ok(())
}
