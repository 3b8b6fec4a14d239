//! Cart endpoints.
//!
//! Responses always include the cart id; a guest session binds it as its
//! `x-cart-id` after the first add.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{CartItemId, VariantId};
use doc_store::DocumentStore;
use domain::Cart;
use serde::Deserialize;
use uuid::Uuid;

use super::AppState;
use crate::error::ApiError;
use crate::identity::Identity;

#[derive(Deserialize)]
pub struct AddItemRequest {
    pub variant_id: Uuid,
    pub amount: u32,
}

#[derive(Deserialize)]
pub struct MergeRequest {
    pub guest_cart_id: Uuid,
}

/// GET /cart — the caller's cart, or 404 when they have none.
pub async fn get<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
) -> Result<Json<Cart>, ApiError> {
    match state.carts.get_cart(identity.owner()).await? {
        Some(cart) => Ok(Json(cart)),
        None => Err(ApiError::Checkout(
            domain::DomainError::NotFound {
                kind: "cart",
                id: "current".to_string(),
            }
            .into(),
        )),
    }
}

/// POST /cart/items — adds units of a variant, creating the cart on first
/// add.
pub async fn add_item<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Json(req): Json<AddItemRequest>,
) -> Result<(StatusCode, Json<Cart>), ApiError> {
    if req.amount == 0 {
        return Err(ApiError::BadRequest("amount must be positive".to_string()));
    }
    let cart = state
        .carts
        .add_item(
            identity.owner(),
            VariantId::from_uuid(req.variant_id),
            req.amount,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(cart)))
}

/// POST /cart/items/{id}/increment — one more unit at today's price.
pub async fn increment_item<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Path(item_id): Path<Uuid>,
) -> Result<Json<Cart>, ApiError> {
    let cart = state
        .carts
        .increment_item(identity.owner(), CartItemId::from_uuid(item_id))
        .await?;
    Ok(Json(cart))
}

/// POST /cart/items/{id}/decrement — one unit fewer; the last one removes
/// the line.
pub async fn decrement_item<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Path(item_id): Path<Uuid>,
) -> Result<Json<Cart>, ApiError> {
    let cart = state
        .carts
        .decrement_item(identity.owner(), CartItemId::from_uuid(item_id))
        .await?;
    Ok(Json(cart))
}

/// DELETE /cart/items/{id} — drops a whole line.
pub async fn remove_item<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Path(item_id): Path<Uuid>,
) -> Result<Json<Cart>, ApiError> {
    let cart = state
        .carts
        .remove_item(identity.owner(), CartItemId::from_uuid(item_id))
        .await?;
    Ok(Json(cart))
}

/// DELETE /cart — empties the cart but keeps it.
pub async fn clear<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
) -> Result<Json<Cart>, ApiError> {
    let cart = state.carts.clear(identity.owner()).await?;
    Ok(Json(cart))
}

/// POST /cart/merge — folds the given guest cart into the signed-in
/// user's cart after login.
pub async fn merge<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Json(req): Json<MergeRequest>,
) -> Result<Json<Option<Cart>>, ApiError> {
    let user = identity.require_user()?;
    let cart = state
        .carts
        .merge(common::CartId::from_uuid(req.guest_cart_id), user)
        .await?;
    Ok(Json(cart))
}
