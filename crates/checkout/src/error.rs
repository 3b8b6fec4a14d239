//! Pipeline error types.

use doc_store::DocStoreError;
use domain::DomainError;
use thiserror::Error;

/// Errors surfaced by the cart, coupon, checkout and cancellation
/// pipelines.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// A business rule was violated.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// The document store failed.
    #[error("Store error: {0}")]
    Store(#[from] DocStoreError),

    /// The webhook signature did not match the shared secret.
    #[error("Payment signature mismatch")]
    SignatureMismatch,

    /// The provider reported the transaction as failed or still pending.
    #[error("Payment was not successful")]
    PaymentFailed,

    /// The charged amount does not match what the payment intention
    /// recorded.
    #[error("Paid amount {actual} does not match the expected total {expected}")]
    AmountMismatch { expected: i64, actual: i64 },

    /// A required field of the webhook payload was missing or malformed.
    #[error("Malformed payment payload: {0}")]
    InvalidPayload(String),

    /// Concurrent writers kept invalidating this attempt; nothing was
    /// written. The caller may retry.
    #[error("Transaction aborted after repeated write conflicts")]
    TransactionAborted,
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, CheckoutError>;
