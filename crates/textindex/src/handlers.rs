use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};
use wordnet_db::LazyThesaurus;

use crate::index::{TextIndex, WordFrequency};

pub const DEFAULT_COMMON_COUNT: usize = 10;

#[derive(Clone)]
pub struct AppState {
    pub index: Arc<TextIndex>,
    pub thesaurus: Arc<LazyThesaurus>,
    pub max_count: usize,
}

#[derive(Deserialize)]
pub struct CommonQuery {
    pub count: Option<usize>,
}

#[derive(Deserialize)]
pub struct WordQuery {
    pub word: Option<String>,
}

#[derive(Deserialize)]
pub struct GroupQuery {
    pub group: Option<String>,
}

#[derive(Serialize)]
pub struct CommonResponse {
    count: usize,
    items: Vec<WordFrequency>,
}

#[derive(Serialize)]
pub struct LinesResponse {
    word: String,
    lines: Vec<String>,
}

#[derive(Serialize)]
pub struct InfoResponse {
    word: String,
    report: Vec<String>,
}

#[derive(Serialize)]
pub struct GroupResponse {
    group: String,
    report: Vec<String>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/common", get(common))
        .route("/v1/lines", get(lines))
        .route("/v1/info", get(info))
        .route("/v1/group", get(group))
        .with_state(state)
}

async fn healthz() -> impl IntoResponse {
    "ok"
}

async fn common(
    State(state): State<AppState>,
    Query(params): Query<CommonQuery>,
) -> Result<Json<CommonResponse>, ApiError> {
    let count = params.count.unwrap_or(DEFAULT_COMMON_COUNT);
    if count == 0 {
        return Err(ApiError::bad_request("count must be >= 1"));
    }
    let count = count.min(state.max_count);
    let items = state.index.most_frequent(count);
    Ok(Json(CommonResponse { count, items }))
}

async fn lines(
    State(state): State<AppState>,
    Query(params): Query<WordQuery>,
) -> Result<Json<LinesResponse>, ApiError> {
    let word = required(params.word, "word")?;
    let lines = state.index.find_lines(&word);
    Ok(Json(LinesResponse { word, lines }))
}

async fn info(
    State(state): State<AppState>,
    Query(params): Query<WordQuery>,
) -> Result<Json<InfoResponse>, ApiError> {
    let word = required(params.word, "word")?;
    let report = state.index.generate_report(&word);
    Ok(Json(InfoResponse { word, report }))
}

async fn group(
    State(state): State<AppState>,
    Query(params): Query<GroupQuery>,
) -> Result<Json<GroupResponse>, ApiError> {
    let group = required(params.group, "group")?;

    // The first group query may parse the whole thesaurus.
    let query = group.clone();
    let report = tokio::task::spawn_blocking(move || {
        let thesaurus = state.thesaurus.get().map_err(|e| {
            warn!("thesaurus unavailable: {e:#}");
            ApiError::Unavailable(format!("thesaurus unavailable: {e}"))
        })?;
        state
            .index
            .generate_group_report(&query, thesaurus)
            .map_err(|e| {
                error!("group query `{query}` failed: {e}");
                ApiError::DataIntegrity(e.to_string())
            })
    })
    .await
    .map_err(|e| {
        error!("group worker failed: {e}");
        ApiError::Internal
    })??;

    Ok(Json(GroupResponse { group, report }))
}

fn required(value: Option<String>, name: &str) -> Result<String, ApiError> {
    match value.map(|v| v.trim().to_lowercase()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ApiError::bad_request(format!("{name} is required"))),
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    DataIntegrity(String),
    #[error("{0}")]
    Unavailable(String),
    #[error("internal server error")]
    Internal,
}

impl ApiError {
    fn bad_request<T: Into<String>>(msg: T) -> Self {
        ApiError::BadRequest(msg.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(msg) => {
                let body = Json(ErrorResponse { error: msg });
                (StatusCode::BAD_REQUEST, body).into_response()
            }
            ApiError::DataIntegrity(msg) => {
                let body = Json(ErrorResponse { error: msg });
                (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
            }
            ApiError::Unavailable(msg) => {
                let body = Json(ErrorResponse { error: msg });
                (StatusCode::SERVICE_UNAVAILABLE, body).into_response()
            }
            ApiError::Internal => {
                let body = Json(json!({ "error": "internal server error" }));
                (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
            }
        }
    }
}
