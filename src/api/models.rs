use crate::feedback::FeedbackNormalizer;
use crate::storage::{ReviewStore, StorageError};
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

pub const MAX_NAME_CHARS: usize = 100;
pub const MAX_REVIEW_CHARS: usize = 2000;

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ReviewStore>,
    pub normalizer: Arc<FeedbackNormalizer>,
}

/// Request to submit a review
#[derive(Debug, Deserialize)]
pub struct CreateReviewRequest {
    pub name: String,
    pub rating: i64,
    pub review_text: String,
}

/// A rejected request field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<FieldError>,
}

impl CreateReviewRequest {
    /// Validate the request, collecting every failing field.
    /// Returns the rating narrowed to its stored type.
    pub fn validate(&self) -> Result<u8, Vec<FieldError>> {
        let mut errors = Vec::new();

        check_text(&mut errors, "name", &self.name, MAX_NAME_CHARS);
        check_text(&mut errors, "review_text", &self.review_text, MAX_REVIEW_CHARS);

        let rating = match u8::try_from(self.rating) {
            Ok(r @ 1..=5) => Some(r),
            _ => {
                errors.push(FieldError::new("rating", "Rating must be between 1 and 5"));
                None
            }
        };

        match rating {
            Some(rating) if errors.is_empty() => Ok(rating),
            _ => Err(errors),
        }
    }
}

fn check_text(errors: &mut Vec<FieldError>, field: &'static str, value: &str, max_chars: usize) {
    if value.trim().is_empty() {
        errors.push(FieldError::new(
            field,
            format!("{field} cannot be empty or whitespace only"),
        ));
    } else if value.chars().count() > max_chars {
        errors.push(FieldError::new(
            field,
            format!("{field} must be at most {max_chars} characters"),
        ));
    }
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    BadRequest(Vec<FieldError>),
    Internal(String),
}

impl From<StorageError> for AppError {
    fn from(e: StorageError) -> Self {
        AppError::Internal(format!("Storage failure: {e}"))
    }
}

/// Request fields a body error can be attributed to
const REQUEST_FIELDS: [&str; 3] = ["name", "rating", "review_text"];

fn request_field(name: &str) -> &'static str {
    REQUEST_FIELDS
        .into_iter()
        .find(|field| *field == name)
        .unwrap_or("body")
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        let text = rejection.body_text();
        let detail = text
            .split_once("target type: ")
            .map(|(_, rest)| rest)
            .unwrap_or(text.as_str());

        // "missing field `name` at ..." or "rating: invalid type: ..."
        let field = if let Some(rest) = detail.split_once("missing field `").map(|(_, r)| r) {
            request_field(rest.split('`').next().unwrap_or_default())
        } else {
            match &rejection {
                JsonRejection::JsonDataError(_) => detail
                    .split_once(": ")
                    .map(|(path, _)| request_field(path))
                    .unwrap_or("body"),
                _ => "body",
            }
        };

        AppError::BadRequest(vec![FieldError::new(field, detail.to_string())])
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, details) = match self {
            AppError::BadRequest(details) => (
                StatusCode::BAD_REQUEST,
                "Invalid review submission".to_string(),
                details,
            ),
            AppError::Internal(msg) => {
                error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    Vec::new(),
                )
            }
        };

        (status, Json(ErrorResponse {
            error: status.to_string(),
            message,
            details,
        }))
        .into_response()
    }
}
