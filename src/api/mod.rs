pub mod models;
pub mod review;
pub mod stats;

// Re-exports
pub use models::*;

use axum::{routing::get, Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

// Health handler (simple, keep here)
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Full HTTP surface: health, reviews, stats, CORS open to any origin
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .merge(review::routes())
        .merge(stats::routes())
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
