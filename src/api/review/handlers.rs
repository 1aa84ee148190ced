use crate::api::models::*;
use crate::storage::{sqlite::timestamp_now, NewReview, Review};
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use tracing::info;

pub async fn create_review_handler(
    State(state): State<AppState>,
    payload: Result<Json<CreateReviewRequest>, JsonRejection>,
) -> Result<Json<Review>, AppError> {
    // Validate
    let Json(request) = payload?;
    let rating = request.validate().map_err(AppError::BadRequest)?;

    info!(rating, text_len = request.review_text.len(), "Creating review");

    // Generate reply, summary and actions (never fails)
    let feedback = state
        .normalizer
        .normalize(rating, &request.review_text)
        .await;

    // Persist
    let review = state
        .store
        .insert(NewReview {
            created_at: timestamp_now(),
            name: request.name,
            rating,
            review_text: request.review_text,
            ai_user_response: feedback.user_response,
            ai_summary: feedback.summary,
            ai_actions: feedback.actions,
        })
        .await?;

    info!(id = review.id, "Review stored");

    Ok(Json(review))
}

pub async fn list_reviews_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<Review>>, AppError> {
    let reviews = state.store.list().await?;

    info!(count = reviews.len(), "Listed reviews");

    Ok(Json(reviews))
}
