//! Online payment endpoints: intention creation and the provider
//! callback.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use checkout::webhook;
use common::AddressId;
use doc_store::DocumentStore;
use domain::{Order, PaymentIntent};
use serde::Deserialize;
use uuid::Uuid;

use super::AppState;
use crate::error::ApiError;
use crate::identity::Identity;

#[derive(Deserialize)]
pub struct CreateIntentionRequest {
    pub address_id: Uuid,
    pub provider_order_id: String,
}

#[derive(Deserialize)]
pub struct WebhookParams {
    pub hmac: String,
}

/// POST /payment/intentions — records a payment intention for the
/// signed-in user's cart.
///
/// Pins the buyer, address and amount under the provider's order id
/// before the buyer is redirected; the webhook trusts only this record.
pub async fn create_intention<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Json(req): Json<CreateIntentionRequest>,
) -> Result<(StatusCode, Json<PaymentIntent>), ApiError> {
    let user = identity.require_user()?;
    let intent = state
        .checkout
        .begin_online_payment(
            user,
            AddressId::from_uuid(req.address_id),
            req.provider_order_id,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(intent)))
}

/// POST /payment/webhook — Paymob transaction callback.
///
/// The signature rides in the `hmac` query parameter; the transaction
/// object arrives either bare or wrapped in an `obj` envelope. Nothing is
/// acted on before the signature verifies, the buyer and amount are
/// resolved from the recorded intention, and re-delivery of an already
/// committed confirmation returns the existing order.
pub async fn paymob<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(params): Query<WebhookParams>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<Order>, ApiError> {
    let payload = match body.get("obj") {
        Some(obj) => obj.clone(),
        None => body,
    };
    let confirmation = webhook::verify(&payload, &params.hmac, &state.config.paymob_hmac_secret)?;
    let order = state.checkout.commit_online(confirmation).await?;
    Ok(Json(order))
}
