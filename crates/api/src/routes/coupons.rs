//! Coupon endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::CouponId;
use doc_store::DocumentStore;
use domain::Cart;
use serde::Deserialize;
use uuid::Uuid;

use super::AppState;
use crate::error::ApiError;
use crate::identity::Identity;

#[derive(Deserialize)]
pub struct ApplyCouponRequest {
    pub code: String,
}

/// POST /cart/coupons — applies a coupon code to the caller's cart.
pub async fn apply<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Json(req): Json<ApplyCouponRequest>,
) -> Result<Json<Cart>, ApiError> {
    let cart = state.coupons.apply(identity.owner(), &req.code).await?;
    Ok(Json(cart))
}

/// DELETE /cart/coupons/{id} — removes an applied coupon.
pub async fn remove<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Path(coupon_id): Path<Uuid>,
) -> Result<Json<Cart>, ApiError> {
    let cart = state
        .coupons
        .remove(identity.owner(), CouponId::from_uuid(coupon_id))
        .await?;
    Ok(Json(cart))
}
