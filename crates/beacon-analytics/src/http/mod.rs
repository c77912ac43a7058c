//! `GET /stats/top?limit=N` and `GET /health`.

mod error;
mod handlers;
mod state;

pub use error::ApiError;
pub use handlers::TopQuery;
pub use state::AppState;

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/stats/top", get(handlers::top_urls_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
