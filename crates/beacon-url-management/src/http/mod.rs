//! Thin axum surface over [`UrlManagement`](crate::UrlManagement).
//!
//! - `POST /urls` → `201` (created) or `200` (already existed)
//! - `GET /{short_code}` → `301` with `Location`, or `404`
//! - `GET /health`

mod error;
mod handlers;
mod model;
mod state;

pub use error::ApiError;
pub use model::{HealthResponse, ShortenRequest};
pub use state::AppState;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/urls", post(handlers::shorten_handler))
        .route("/{short_code}", get(handlers::redirect_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
