//! HTTP route handlers.

pub mod cart;
pub mod coupons;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod payment;

use checkout::{
    CancellationPipeline, CartService, CheckoutPipeline, CounterSynchronizer, CouponService,
};

use crate::config::Config;

/// Shared application state accessible from all handlers.
pub struct AppState<S> {
    pub carts: CartService<S>,
    pub coupons: CouponService<S>,
    pub checkout: CheckoutPipeline<S>,
    pub cancellation: CancellationPipeline<S>,
    pub counters: CounterSynchronizer<S>,
    pub store: S,
    pub config: Config,
}
