use anyhow::Result;
use axum::{extract::{Path, Query, State}, http::StatusCode, routing::get, Json, Router};
use review_core::persist::{load_all, load_embeddings, load_lexicon, IndexPaths};
use review_core::{
    boolean_and_rating_search, boolean_search, embedding_search, BooleanQuery, Config, EmbeddingQuery,
    EmbeddingRegistry, InvertedIndex, Method, OpinionLexicon, Review, SearchConfig,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub type ApiError = (StatusCode, String);

#[derive(Debug, Deserialize)]
pub struct BooleanParams {
    pub aspect1: String,
    pub aspect2: String,
    pub opinion1: String,
    #[serde(default)]
    pub opinion2: Option<String>,
    pub method: String,
}

impl BooleanParams {
    fn query(&self) -> Result<BooleanQuery, ApiError> {
        let method: Method = self.method.parse().map_err(api_error)?;
        Ok(BooleanQuery::new(&self.aspect1, &self.aspect2, &self.opinion1, method)
            .with_second_opinion(self.opinion2.as_deref()))
    }
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingParams {
    /// Comma-separated aspect terms.
    pub aspects: String,
    /// Comma-separated opinion terms.
    pub opinions: String,
    pub method: String,
    /// Embedding table selector, e.g. `glove`.
    #[serde(default)]
    pub embedding_method: Option<String>,
    #[serde(default)]
    pub threshold: Option<f32>,
}

#[derive(Serialize)]
pub struct SearchResponse<T> {
    pub method: String,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<T>,
}

impl<T> SearchResponse<T> {
    fn new(method: Method, start: Instant, results: Vec<T>) -> Self {
        Self { method: method.to_string(), took_s: start.elapsed().as_secs_f64(), total_hits: results.len(), results }
    }
}

/// Read-only search data shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub index: Arc<InvertedIndex>,
    pub lexicon: Arc<OpinionLexicon>,
    pub embeddings: Arc<EmbeddingRegistry>,
    pub search: SearchConfig,
}

/// Where the server finds its data at startup.
pub struct ServerOptions {
    pub index_dir: PathBuf,
    pub positive_words: PathBuf,
    pub negative_words: PathBuf,
    /// Embedding files by selector name.
    pub embeddings: Vec<(String, PathBuf)>,
    pub config: Config,
}

pub fn build_app(opts: ServerOptions) -> Result<Router> {
    let (index, meta) = load_all(&IndexPaths::new(&opts.index_dir))?;
    tracing::info!(num_docs = meta.num_docs, num_terms = meta.num_terms, stemming = meta.text.stemming, "loaded index");
    let lexicon = load_lexicon(&opts.positive_words, &opts.negative_words)?;
    let mut embeddings = EmbeddingRegistry::new();
    for (name, path) in &opts.embeddings {
        embeddings.insert(name, load_embeddings(path)?);
    }
    let state = AppState {
        index: Arc::new(index),
        lexicon: Arc::new(lexicon),
        embeddings: Arc::new(embeddings),
        search: opts.config.search,
    };
    Ok(router(state))
}

pub fn router(state: AppState) -> Router {
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
        .route("/search/boolean", get(boolean_handler))
        .route("/search/rating", get(rating_handler))
        .route("/search/embedding", get(embedding_handler))
        .route("/review/:review_id", get(review_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

fn api_error(err: review_core::Error) -> ApiError {
    use review_core::Error;
    let status = match err {
        Error::InvalidMethod { .. } | Error::UnknownEmbeddingMethod { .. } => StatusCode::BAD_REQUEST,
        Error::NoEmbeddingMatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

pub async fn boolean_handler(
    State(state): State<AppState>,
    Query(params): Query<BooleanParams>,
) -> Result<Json<SearchResponse<review_core::Hit>>, ApiError> {
    let start = Instant::now();
    let query = params.query()?;
    let hits = boolean_search(&state.index, &query);
    Ok(Json(SearchResponse::new(query.method, start, hits)))
}

pub async fn rating_handler(
    State(state): State<AppState>,
    Query(params): Query<BooleanParams>,
) -> Result<Json<SearchResponse<review_core::RatedHit>>, ApiError> {
    let start = Instant::now();
    let query = params.query()?;
    let hits = boolean_and_rating_search(&state.index, &state.lexicon, &query);
    Ok(Json(SearchResponse::new(query.method, start, hits)))
}

pub async fn embedding_handler(
    State(state): State<AppState>,
    Query(params): Query<EmbeddingParams>,
) -> Result<Json<SearchResponse<review_core::ScoredHit>>, ApiError> {
    let start = Instant::now();
    let method: Method = params.method.parse().map_err(api_error)?;
    let name = params.embedding_method.as_deref().unwrap_or(&state.search.default_embedding);
    let table = state.embeddings.get(name).map_err(api_error)?;
    let query = EmbeddingQuery::new(params.aspects.split(','), params.opinions.split(','), method)
        .with_threshold(params.threshold.unwrap_or(state.search.threshold));
    let hits = embedding_search(&state.index, table, &query).map_err(api_error)?;
    Ok(Json(SearchResponse::new(method, start, hits)))
}

pub async fn review_handler(
    State(state): State<AppState>,
    Path(review_id): Path<String>,
) -> Result<Json<Review>, ApiError> {
    state
        .index
        .review_by_id(&review_id)
        .cloned()
        .map(Json)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("review {review_id:?} not found")))
}
