//! Domain error types.

use common::VariantId;
use thiserror::Error;

use crate::order::OrderStatus;

/// Errors that can occur during domain operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    /// A referenced record does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// A cart mutation asked for more units than the variant has in stock.
    #[error("The requested quantity is not available")]
    QuantityExceeded,

    /// A reservation would have driven a variant's quantity below zero.
    #[error("Insufficient stock for variant {variant}: requested {requested}, available {available}")]
    InsufficientStock {
        variant: VariantId,
        requested: u32,
        available: i64,
    },

    /// An order status change that the lifecycle does not allow.
    #[error("Cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// The coupon's expiry date has passed.
    #[error("This coupon has expired")]
    CouponExpired,

    /// The coupon, or another coupon from the same company, is already on
    /// the cart.
    #[error("A coupon from this company is already applied")]
    CouponAlreadyApplied,

    /// No line in the cart belongs to the coupon's company.
    #[error("This coupon does not apply to any item in the cart")]
    CouponNotApplicable,

    /// Checkout requires at least one line item.
    #[error("Cannot place an order from an empty cart")]
    EmptyCart,

    /// The cart passed its abandonment deadline.
    #[error("This cart has expired")]
    CartExpired,

    /// The actor may not perform this operation.
    #[error("Not authorized")]
    Unauthorized,
}

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, DomainError>;
