use anyhow::Result;
use axum::{extract::{Query, State}, http::StatusCode, routing::get, Json, Router};
use query_core::persist::{load_index, IndexPaths};
use query_core::{DocId, QueryEngine, WebIndex};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

const MAX_LIMIT: usize = 1000;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
}
fn default_limit() -> usize { 50 }

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
    pub url: String,
    pub path: String,
}

#[derive(Serialize)]
pub struct QueryFailure {
    pub query: String,
    pub kind: &'static str,
    pub error: String,
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub num_pages: usize,
    pub num_terms: usize,
}

/// The index is frozen once loaded; handlers share it without locking.
#[derive(Clone)]
pub struct AppState {
    pub index: Arc<WebIndex>,
}

pub fn build_app(index_dir: String) -> Result<Router> {
    let index = load_index(&IndexPaths::new(&index_dir))?;
    Ok(build_app_with_index(index))
}

pub fn build_app_with_index(index: WebIndex) -> Router {
    let app_state = AppState { index: Arc::new(index) };

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
        .route("/stats", get(stats_handler))
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, (StatusCode, Json<QueryFailure>)> {
    let start = std::time::Instant::now();
    let engine = QueryEngine::from_index(&state.index);
    let found = match engine.query(&params.q) {
        Ok(found) => found,
        Err(err) => {
            tracing::debug!(query = %params.q, %err, "rejected query");
            let failure = QueryFailure { query: params.q, kind: err.kind(), error: err.to_string() };
            return Err((StatusCode::BAD_REQUEST, Json(failure)));
        }
    };

    let total_hits = found.len();
    let mut results: Vec<SearchHit> = found
        .into_iter()
        .filter_map(|doc_id| {
            state.index.page(doc_id).map(|page| SearchHit {
                doc_id,
                url: page.url().to_string(),
                path: page.path().to_string(),
            })
        })
        .collect();
    // No relevance ranking; sort only so responses are stable.
    results.sort_by(|a, b| a.url.cmp(&b.url));
    results.truncate(params.limit.clamp(1, MAX_LIMIT));

    let elapsed = start.elapsed();
    tracing::debug!(query = %params.q, total_hits, took_s = elapsed.as_secs_f64(), "search");
    Ok(Json(SearchResponse { query: params.q, took_s: elapsed.as_secs_f64(), total_hits, results }))
}

pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse { num_pages: state.index.num_pages(), num_terms: state.index.num_terms() })
}
