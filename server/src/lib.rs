use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use cosine_core::persist::{load_meta, open_store, IndexPaths};
use cosine_core::store::{DocumentStore, SledStore};
use cosine_core::{DocId, Document, Indexer, QueryEngine};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_k")]
    pub k: usize,
}
fn default_k() -> usize { 10 }

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct SearchHit {
    pub doc_id: DocId,
    pub title: String,
    pub tags: Vec<String>,
    pub snippet: Option<String>,
}

#[derive(Clone)]
pub struct AppState {
    pub store: SledStore,
    pub admin_token: Option<String>,
    /// Serializes every index mutation.
    pub writer: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(store: SledStore, admin_token: Option<String>) -> Self {
        Self { store, admin_token, writer: Arc::new(Mutex::new(())) }
    }
}

/// Errors returned to HTTP clients as `{"error": "..."}`.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    NotFound(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<cosine_core::Error> for ApiError {
    fn from(err: cosine_core::Error) -> Self {
        match err {
            cosine_core::Error::DocumentNotFound(id) => ApiError::NotFound(format!("document not found: {id}")),
            other => {
                tracing::error!(error = %other, "store failure");
                ApiError::Internal(other.to_string())
            }
        }
    }
}

pub fn build_app(index_dir: String) -> Result<Router> {
    let index_paths = IndexPaths::new(&index_dir);
    let store = open_store(&index_paths)?;
    match load_meta(&index_paths) {
        Ok(meta) => tracing::info!(num_docs = meta.num_docs, num_terms = meta.num_terms, created_at = %meta.created_at, "loaded index"),
        Err(_) => tracing::warn!(index = %index_dir, "no meta.json, serving index as found"),
    }
    let admin_token = std::env::var("ADMIN_TOKEN").ok();
    Ok(router(AppState::new(store, admin_token)))
}

pub fn router(app_state: AppState) -> Router {
    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/doc/:doc_id", get(doc_handler))
        .route("/index/batch", post(index_batch))
        .route("/index/rebuild", post(index_rebuild))
        .route("/index/:doc_id", delete(index_remove))
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let start = std::time::Instant::now();
    let ranked = QueryEngine::new(&state.store).query(&params.q)?;
    let total_hits = ranked.len();
    let k = params.k.clamp(1, 100);

    // raw query words for highlighting
    let raw_terms: Vec<String> = params.q.split_whitespace().map(|s| s.to_string()).collect();
    let mut results: Vec<SearchHit> = Vec::new();
    for doc_id in ranked.into_iter().take(k) {
        if let Some(doc) = state.store.document(&doc_id)? {
            let snippet = snippet_from_body(&doc.body, &raw_terms);
            results.push(SearchHit { doc_id, title: doc.title, tags: doc.tags, snippet });
        }
    }

    let elapsed = start.elapsed();
    tracing::debug!(query = %params.q, total_hits, took_s = elapsed.as_secs_f64(), "search");
    Ok(Json(SearchResponse { query: params.q, took_s: elapsed.as_secs_f64(), total_hits, results }))
}

pub async fn doc_handler(State(state): State<AppState>, Path(doc_id): Path<String>) -> Result<Json<Document>, ApiError> {
    match state.store.document(&doc_id)? {
        Some(doc) => Ok(Json(doc)),
        None => Err(cosine_core::Error::DocumentNotFound(doc_id).into()),
    }
}

fn snippet_from_body(text: &str, raw_terms: &[String]) -> Option<String> {
    if text.is_empty() { return None; }
    // find first match (case-insensitive) of any raw term
    let mut first_idx: Option<usize> = None;
    for term in raw_terms {
        if term.trim().is_empty() { continue; }
        if let Some(pos) = find_case_insensitive(text, term) { first_idx = Some(pos); break; }
    }
    let snippet = match first_idx {
        Some(idx) => {
            let start = floor_char_boundary(text, idx.saturating_sub(100));
            let end = floor_char_boundary(text, (idx + 200).min(text.len()));
            text[start..end].to_string()
        }
        None => text.chars().take(200).collect(),
    };
    Some(highlight_terms(&snippet, raw_terms))
}

fn floor_char_boundary(text: &str, mut idx: usize) -> usize {
    while !text.is_char_boundary(idx) { idx -= 1; }
    idx
}

fn find_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    let pat = regex::RegexBuilder::new(&regex::escape(needle)).case_insensitive(true).build().ok()?;
    pat.find(haystack).map(|m| m.start())
}

fn highlight_terms(snippet: &str, terms: &[String]) -> String {
    let mut s = snippet.to_string();
    for t in terms {
        if t.trim().is_empty() { continue; }
        let Ok(pat) = regex::RegexBuilder::new(&regex::escape(t)).case_insensitive(true).build() else {
            continue;
        };
        s = pat.replace_all(&s, |caps: &regex::Captures| format!("<em>{}</em>", &caps[0])).to_string();
    }
    s
}

// --- Admin endpoints ---
// sled calls and the writer lock block, so mutations run off the async workers.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        tracing::error!(error = %e, "index task failed");
        ApiError::Internal(e.to_string())
    })?
}

async fn index_batch(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(docs): Json<Vec<Document>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    authorize(&state, &headers)?;
    if docs.iter().any(|d| d.id.is_empty()) {
        return Err(ApiError::BadRequest("document id must not be empty".into()));
    }
    let indexed = blocking(move || {
        let _guard = state.writer.lock();
        for doc in &docs {
            state.store.put_document(doc)?;
        }
        let indexer = Indexer::new(&state.store);
        for doc in &docs {
            indexer.reindex(doc)?;
        }
        state.store.flush()?;
        Ok(docs.len())
    })
    .await?;
    tracing::info!(indexed, "batch indexed");
    Ok(Json(json!({ "indexed": indexed })))
}

async fn index_remove(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(doc_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    authorize(&state, &headers)?;
    blocking(move || {
        let _guard = state.writer.lock();
        if !state.store.delete_document(&doc_id)? {
            return Err(cosine_core::Error::DocumentNotFound(doc_id).into());
        }
        let entries = Indexer::new(&state.store).remove_indexes(&doc_id)?;
        state.store.flush()?;
        Ok(Json(json!({ "removed": doc_id, "entries": entries })))
    })
    .await
}

async fn index_rebuild(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<serde_json::Value>, ApiError> {
    authorize(&state, &headers)?;
    blocking(move || {
        let _guard = state.writer.lock();
        let indexed = Indexer::new(&state.store).reindex_all()?;
        state.store.flush()?;
        Ok(Json(json!({ "indexed": indexed })))
    })
    .await
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err(ApiError::Unauthorized("ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err(ApiError::Unauthorized("invalid admin token".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_highlights_case_insensitively() {
        let s = snippet_from_body("Learning Rust today", &["rust".to_string()]).unwrap();
        assert_eq!(s, "Learning <em>Rust</em> today");
    }

    #[test]
    fn snippet_window_respects_char_boundaries() {
        let body = format!("{}needle{}", "é".repeat(80), "ü".repeat(150));
        let s = snippet_from_body(&body, &["needle".to_string()]).unwrap();
        assert!(s.contains("<em>needle</em>"));
    }
}
