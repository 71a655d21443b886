use axum::response::{IntoResponse, Response};
use axum_helpers::AppError;
use thiserror::Error;
use uuid::Uuid;

use crate::query::ValidationError;
use crate::reviews::ReviewError;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A request body failed its field validation rules
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] validator::ValidationErrors),

    #[error("You already submitted a review")]
    DuplicateReview { product_id: Uuid, reviewer: String },

    #[error("Product not found: {0}")]
    NotFound(Uuid),

    #[error("No product with slug '{0}'")]
    SlugNotFound(String),

    #[error("Product with slug '{0}' already exists")]
    DuplicateSlug(String),

    /// The stored version no longer matches the one the write was based on
    #[error("Product {id} was modified concurrently (expected version {expected})")]
    Conflict { id: Uuid, expected: u64 },

    /// A conflict that persisted after the bounded retries
    #[error("Product {0} is being updated concurrently, try again")]
    ConcurrentUpdate(Uuid),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

impl CatalogError {
    pub(crate) fn from_review(product_id: Uuid, err: ReviewError) -> Self {
        match err {
            ReviewError::Duplicate { reviewer } => CatalogError::DuplicateReview {
                product_id,
                reviewer,
            },
            ReviewError::Invalid(e) => CatalogError::Validation(e),
        }
    }
}

/// Convert CatalogError to AppError for standardized error responses
impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Validation(e) => AppError::InvalidParameter {
                field: e.field.to_string(),
                message: e.message,
            },
            CatalogError::InvalidInput(e) => AppError::ValidationError(e),
            e @ CatalogError::DuplicateReview { .. } => AppError::BadRequest(e.to_string()),
            CatalogError::NotFound(_) | CatalogError::SlugNotFound(_) => {
                AppError::NotFound("Product Not Found".to_string())
            }
            e @ CatalogError::DuplicateSlug(_) => AppError::Conflict(e.to_string()),
            e @ CatalogError::Conflict { .. } => AppError::Conflict(e.to_string()),
            e @ CatalogError::ConcurrentUpdate(_) => AppError::ServiceUnavailable(e.to_string()),
            CatalogError::Database(msg) => AppError::InternalServerError(msg),
            CatalogError::Internal(msg) => AppError::InternalServerError(msg),
        }
    }
}

impl IntoResponse for CatalogError {
    fn into_response(self) -> Response {
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}

impl From<mongodb::error::Error> for CatalogError {
    fn from(err: mongodb::error::Error) -> Self {
        CatalogError::Database(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    fn status(err: CatalogError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_status_mapping() {
        let id = Uuid::now_v7();
        assert_eq!(
            status(ValidationError::new("price", "bad").into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(CatalogError::DuplicateReview {
                product_id: id,
                reviewer: "u1".to_string()
            }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status(CatalogError::NotFound(id)), StatusCode::NOT_FOUND);
        assert_eq!(
            status(CatalogError::DuplicateSlug("shirt".to_string())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status(CatalogError::ConcurrentUpdate(id)),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status(CatalogError::Database("down".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_duplicate_review_message_is_fixed() {
        let err = CatalogError::from_review(
            Uuid::now_v7(),
            ReviewError::Duplicate {
                reviewer: "u1".to_string(),
            },
        );
        assert_eq!(err.to_string(), "You already submitted a review");
    }
}
