use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

/// Error body returned by every failing endpoint.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "Not Found",
    "message": "Order 550e8400-e29b-41d4-a716-446655440000 not found",
    "timestamp": "2026-08-06T10:30:00.000Z"
}))]
pub struct ErrorResponse {
    /// HTTP status category (e.g. "Not Found", "Unprocessable Entity")
    pub error: String,
    /// Human-readable error description
    pub message: String,
    /// ISO 8601 timestamp when the error occurred
    pub timestamp: String,
}

/// Unified error type for the service layer.
///
/// Every externally visible failure mode of the storefront maps onto one of
/// these variants; `status_code` is the single source of truth for the HTTP
/// mapping.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sea_orm::error::DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    #[error("Duplicate order: {0}")]
    DuplicateOrder(String),

    #[error("Invalid order total: {0}")]
    InvalidOrderTotal(String),

    #[error("Payment failed: {0}")]
    PaymentFailed(String),

    #[error("Payment not succeeded: {0}")]
    PaymentNotSucceeded(String),

    #[error("Already reviewed: {0}")]
    AlreadyReviewed(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Email delivery failed: {0}")]
    EmailDeliveryError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_) | Self::InvalidOperation(_) | Self::InvalidOrderTotal(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::InsufficientStock(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::DuplicateOrder(_) | Self::AlreadyReviewed(_) => StatusCode::CONFLICT,
            Self::PaymentFailed(_) | Self::PaymentNotSucceeded(_) => StatusCode::PAYMENT_REQUIRED,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::EmailDeliveryError(_) => StatusCode::BAD_GATEWAY,
            Self::DatabaseError(_) | Self::InternalError(_) | Self::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns the message suitable for HTTP responses. Internal errors are
    /// collapsed to a generic message so implementation details never leak.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::InternalError(_) | Self::Other(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.response_message(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(err)).into_response()
    }
}

/// Error type for the HTTP handler boundary.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Service error: {0}")]
    ServiceError(#[from] ServiceError),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Internal server error")]
    InternalServerError,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::ServiceError(service_error) => (
                service_error.status_code(),
                service_error.response_message(),
            ),
            ApiError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            ApiError::InternalServerError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(err)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_stock_maps_to_unprocessable_entity() {
        let err = ServiceError::InsufficientStock("Only 1 of Boot available".into());
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn duplicate_order_and_already_reviewed_conflict() {
        assert_eq!(
            ServiceError::DuplicateOrder("recent identical order".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::AlreadyReviewed("product already reviewed".into()).status_code(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn payment_errors_map_to_payment_required() {
        assert_eq!(
            ServiceError::PaymentFailed("card declined".into()).status_code(),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(
            ServiceError::PaymentNotSucceeded("requires_action".into()).status_code(),
            StatusCode::PAYMENT_REQUIRED
        );
    }

    #[test]
    fn internal_errors_hide_details() {
        let err = ServiceError::InternalError("connection pool exhausted".into());
        assert_eq!(err.response_message(), "Internal server error");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let err = ServiceError::DatabaseError(sea_orm::error::DbErr::Custom("boom".into()));
        assert_eq!(err.response_message(), "Database error");
    }

    #[test]
    fn user_facing_errors_keep_their_message() {
        let err = ServiceError::InvalidOrderTotal("Order total must be greater than zero".into());
        assert!(err
            .response_message()
            .contains("Order total must be greater than zero"));
    }

    #[test]
    fn validation_errors_convert() {
        use validator::Validate;

        #[derive(Validate)]
        struct Probe {
            #[validate(length(min = 1))]
            name: String,
        }

        let probe = Probe {
            name: String::new(),
        };
        let err: ServiceError = probe.validate().unwrap_err().into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
