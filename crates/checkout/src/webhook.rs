//! Payment provider webhook verification.
//!
//! Paymob signs its transaction callbacks with HMAC-SHA512 over a fixed
//! concatenation of twenty payload fields. Nothing in the payload is
//! trusted before that signature checks out against the shared secret.

use hmac::{Hmac, Mac};
use sha2::Sha512;

use crate::error::{CheckoutError, Result};

type HmacSha512 = Hmac<Sha512>;

/// The payload fields covered by the signature, in the documented order.
/// Dotted paths descend into nested objects.
const SIGNED_FIELDS: [&str; 20] = [
    "amount_cents",
    "created_at",
    "currency",
    "error_occured",
    "has_parent_transaction",
    "id",
    "integration_id",
    "is_3d_secure",
    "is_auth",
    "is_capture",
    "is_refunded",
    "is_standalone_payment",
    "is_voided",
    "order.id",
    "owner",
    "pending",
    "source_data.pan",
    "source_data.sub_type",
    "source_data.type",
    "success",
];

/// The facts a verified callback asserts, extracted after the signature
/// check.
///
/// Only data covered by the signature is carried. The buyer and address
/// come from the payment intention recorded at initiation, keyed by
/// `provider_order_id`, never from unsigned payload fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentConfirmation {
    /// The provider's order id; the idempotency key for the commit.
    pub provider_order_id: String,
    /// The charged amount, checked against the intention at commit.
    pub amount_cents: i64,
}

fn lookup<'a>(payload: &'a serde_json::Value, path: &str) -> Result<&'a serde_json::Value> {
    let mut current = payload;
    for part in path.split('.') {
        current = current
            .get(part)
            .ok_or_else(|| CheckoutError::InvalidPayload(format!("missing field {path}")))?;
    }
    Ok(current)
}

/// Renders a field the way the provider does when building the signed
/// string: booleans and numbers as their literals, strings as-is.
fn render(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// Computes the expected signature for a transaction payload.
pub fn compute_signature(payload: &serde_json::Value, secret: &str) -> Result<String> {
    let mut concatenated = String::new();
    for field in SIGNED_FIELDS {
        concatenated.push_str(&render(lookup(payload, field)?));
    }

    let mut mac = HmacSha512::new_from_slice(secret.as_bytes())
        .map_err(|_| CheckoutError::InvalidPayload("empty hmac secret".to_string()))?;
    mac.update(concatenated.as_bytes());
    let digest = mac.finalize().into_bytes();
    Ok(digest.iter().map(|b| format!("{b:02x}")).collect())
}

/// Verifies a callback and extracts the confirmation.
///
/// Rejects with [`CheckoutError::SignatureMismatch`] when the signature
/// does not match, and with [`CheckoutError::PaymentFailed`] when the
/// provider reports the transaction as unsuccessful or still pending.
pub fn verify(
    payload: &serde_json::Value,
    provided_hmac: &str,
    secret: &str,
) -> Result<PaymentConfirmation> {
    let expected = compute_signature(payload, secret)?;
    if !expected.eq_ignore_ascii_case(provided_hmac) {
        return Err(CheckoutError::SignatureMismatch);
    }

    let success = lookup(payload, "success")?.as_bool().unwrap_or(false);
    let pending = lookup(payload, "pending")?.as_bool().unwrap_or(true);
    let error_occured = lookup(payload, "error_occured")?.as_bool().unwrap_or(true);
    if !success || pending || error_occured {
        return Err(CheckoutError::PaymentFailed);
    }

    let provider_order_id = render(lookup(payload, "order.id")?);
    let amount_cents = lookup(payload, "amount_cents")?
        .as_i64()
        .ok_or_else(|| CheckoutError::InvalidPayload("amount_cents is not a number".to_string()))?;

    Ok(PaymentConfirmation {
        provider_order_id,
        amount_cents,
    })
}
