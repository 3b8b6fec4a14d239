//! Checkout and order lifecycle endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{AddressId, OrderId, UserId};
use doc_store::{DocumentId, DocumentStore, DocumentStoreExt};
use domain::{Order, User};
use serde::Deserialize;
use uuid::Uuid;

use super::AppState;
use crate::error::ApiError;
use crate::identity::Identity;

#[derive(Deserialize)]
pub struct PlaceOrderRequest {
    pub address_id: Uuid,
}

/// POST /orders — commits the signed-in user's cart as a cash-on-delivery
/// order.
pub async fn place<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Json(req): Json<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let user = identity.require_user()?;
    let order = state
        .checkout
        .commit_cash_on_delivery(user, AddressId::from_uuid(req.address_id))
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /orders/{id} — fetches one order.
///
/// Non-admins asking about another user's order, or an order that does
/// not exist, get the same uniform answer.
pub async fn get<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Order>, ApiError> {
    let user = identity.require_user()?;
    let actor = load_user(&state.store, user).await?;

    let stored = state
        .store
        .get_record::<Order>(DocumentId::from(order_id))
        .await?;
    match stored {
        Some(stored) if stored.record.user == actor.id || actor.is_admin() => {
            Ok(Json(stored.record))
        }
        None if actor.is_admin() => Err(ApiError::Checkout(
            domain::DomainError::NotFound {
                kind: "order",
                id: order_id.to_string(),
            }
            .into(),
        )),
        _ => Err(ApiError::Forbidden),
    }
}

/// POST /orders/{id}/cancel — cancels a processing order.
pub async fn cancel<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Order>, ApiError> {
    let user = identity.require_user()?;
    let order = state
        .cancellation
        .cancel(OrderId::from_uuid(order_id), user)
        .await?;
    Ok(Json(order))
}

/// POST /admin/sync-counters — recomputes the catalog's product counters.
pub async fn sync_counters<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
) -> Result<StatusCode, ApiError> {
    let user = identity.require_user()?;
    let actor = load_user(&state.store, user).await?;
    if !actor.is_admin() {
        return Err(ApiError::Forbidden);
    }
    state.counters.sync_product_counts().await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn load_user<S: DocumentStore>(store: &S, user: UserId) -> Result<User, ApiError> {
    store
        .get_record::<User>(DocumentId::from(user.as_uuid()))
        .await?
        .map(|stored| stored.record)
        .ok_or(ApiError::Forbidden)
}
