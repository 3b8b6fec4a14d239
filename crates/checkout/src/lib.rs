//! Cart, coupon, checkout and cancellation pipelines.
//!
//! Every pipeline follows the same discipline: read the records it needs,
//! run the pure domain logic, and submit one guard-checked write batch.
//! A conflict means another writer moved first; the pipeline re-reads and
//! retries a bounded number of times before giving up with
//! [`CheckoutError::TransactionAborted`], having written nothing.

pub mod cancel;
pub mod carts;
pub mod commit;
pub mod counters;
pub mod coupons;
pub mod error;
pub mod webhook;

pub use cancel::CancellationPipeline;
pub use carts::{CartOwner, CartService};
pub use commit::CheckoutPipeline;
pub use counters::CounterSynchronizer;
pub use coupons::CouponService;
pub use error::{CheckoutError, Result};
pub use webhook::PaymentConfirmation;

/// How many times a pipeline re-reads and retries after a write conflict
/// before aborting.
pub(crate) const MAX_WRITE_ATTEMPTS: usize = 3;
