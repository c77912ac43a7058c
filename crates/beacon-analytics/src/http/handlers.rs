use super::error::ApiError;
use super::state::AppState;
use crate::model::{TopUrl, TopUrlsResponse};
use crate::DEFAULT_TOP_LIMIT;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct TopQuery {
    pub limit: Option<i64>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
}

pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "healthy" })
}

pub async fn top_urls_handler(
    State(state): State<AppState>,
    query: Result<Query<TopQuery>, QueryRejection>,
) -> Result<Json<TopUrlsResponse>, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::invalid_limit(e.body_text()))?;
    let limit = query.limit.unwrap_or(DEFAULT_TOP_LIMIT);

    let top = state.analytics().get_top_urls(limit).await?;
    Ok(Json(TopUrlsResponse {
        urls: top.into_iter().map(TopUrl::from).collect(),
    }))
}
