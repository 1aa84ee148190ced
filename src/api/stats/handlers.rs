use crate::api::models::*;
use crate::storage::RatingStats;
use axum::{extract::State, Json};

/// Totals shown on the admin dashboard
pub async fn stats_handler(
    State(state): State<AppState>,
) -> Result<Json<RatingStats>, AppError> {
    Ok(Json(state.store.stats().await?))
}
