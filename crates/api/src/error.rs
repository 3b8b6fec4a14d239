//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use checkout::CheckoutError;
use domain::DomainError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// Uniform authorization failure; never says why.
    Forbidden,
    /// Pipeline or domain error.
    Checkout(CheckoutError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, "Not authorized".to_string()),
            ApiError::Checkout(err) => checkout_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn checkout_error_to_response(err: CheckoutError) -> (StatusCode, String) {
    match &err {
        CheckoutError::Domain(domain_err) => match domain_err {
            DomainError::NotFound { .. } => (StatusCode::NOT_FOUND, err.to_string()),
            DomainError::QuantityExceeded
            | DomainError::EmptyCart
            | DomainError::CartExpired
            | DomainError::CouponExpired
            | DomainError::CouponAlreadyApplied
            | DomainError::CouponNotApplicable => (StatusCode::BAD_REQUEST, err.to_string()),
            DomainError::InsufficientStock { .. } | DomainError::InvalidTransition { .. } => {
                (StatusCode::CONFLICT, err.to_string())
            }
            DomainError::Unauthorized => {
                (StatusCode::FORBIDDEN, "Not authorized".to_string())
            }
        },
        CheckoutError::SignatureMismatch => {
            (StatusCode::FORBIDDEN, "Not authorized".to_string())
        }
        CheckoutError::PaymentFailed
        | CheckoutError::InvalidPayload(_)
        | CheckoutError::AmountMismatch { .. } => (StatusCode::BAD_REQUEST, err.to_string()),
        CheckoutError::TransactionAborted => (StatusCode::CONFLICT, err.to_string()),
        CheckoutError::Store(store_err) => {
            // Store details stay out of responses.
            tracing::error!(error = %store_err, "store error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        ApiError::Checkout(err)
    }
}

impl From<doc_store::DocStoreError> for ApiError {
    fn from(err: doc_store::DocStoreError) -> Self {
        ApiError::Checkout(CheckoutError::Store(err))
    }
}
