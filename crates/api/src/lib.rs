//! HTTP API server with observability for the commerce platform.
//!
//! Thin handlers over the checkout pipelines, with structured logging
//! (tracing) and Prometheus metrics. Identity is resolved upstream and
//! handed in via `x-user-id` / `x-cart-id` headers.

pub mod config;
pub mod error;
pub mod identity;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post};
use checkout::{
    CancellationPipeline, CartService, CheckoutPipeline, CounterSynchronizer, CouponService,
};
use common::Money;
use doc_store::DocumentStore;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: DocumentStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/cart", get(routes::cart::get::<S>))
        .route("/cart", delete(routes::cart::clear::<S>))
        .route("/cart/items", post(routes::cart::add_item::<S>))
        .route(
            "/cart/items/{id}/increment",
            post(routes::cart::increment_item::<S>),
        )
        .route(
            "/cart/items/{id}/decrement",
            post(routes::cart::decrement_item::<S>),
        )
        .route("/cart/items/{id}", delete(routes::cart::remove_item::<S>))
        .route("/cart/merge", post(routes::cart::merge::<S>))
        .route("/cart/coupons", post(routes::coupons::apply::<S>))
        .route("/cart/coupons/{id}", delete(routes::coupons::remove::<S>))
        .route("/orders", post(routes::orders::place::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/orders/{id}/cancel", post(routes::orders::cancel::<S>))
        .route(
            "/payment/intentions",
            post(routes::payment::create_intention::<S>),
        )
        .route("/payment/webhook", post(routes::payment::paymob::<S>))
        .route("/admin/sync-counters", post(routes::orders::sync_counters::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Wires the pipelines over a store into the shared application state.
pub fn create_default_state<S: DocumentStore + Clone + 'static>(
    store: S,
    config: Config,
) -> Arc<AppState<S>> {
    let shipping_fee = Money::from_cents(config.shipping_fee_cents);
    Arc::new(AppState {
        carts: CartService::new(store.clone(), config.cart_ttl_days),
        coupons: CouponService::new(store.clone(), config.cart_ttl_days),
        checkout: CheckoutPipeline::new(store.clone(), shipping_fee, config.cart_ttl_days),
        cancellation: CancellationPipeline::new(store.clone()),
        counters: CounterSynchronizer::new(store.clone()),
        store,
        config,
    })
}
