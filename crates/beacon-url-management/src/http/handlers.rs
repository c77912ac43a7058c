use super::error::ApiError;
use super::model::{HealthResponse, ShortenRequest};
use super::state::AppState;
use crate::model::ShortenedUrl;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "healthy" })
}

pub async fn shorten_handler(
    State(state): State<AppState>,
    request: Result<Json<ShortenRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ShortenedUrl>), ApiError> {
    let Json(request) = request.map_err(|e| ApiError::invalid_url(e.body_text()))?;
    let outcome = state.service().shorten_url(&request.long_url).await?;
    let status = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(outcome.url)))
}

pub async fn redirect_handler(
    Path(short_code): Path<String>,
    State(state): State<AppState>,
) -> Result<Response, ApiError> {
    let resolved = state.service().resolve_url(&short_code).await?;
    // 301, not the 308 sent by `Redirect::permanent`.
    Ok((
        StatusCode::MOVED_PERMANENTLY,
        [(header::LOCATION, resolved.long_url)],
    )
        .into_response())
}
