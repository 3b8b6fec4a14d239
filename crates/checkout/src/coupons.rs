//! Coupon application and removal.

use chrono::Utc;
use common::CouponId;
use doc_store::{DocumentStore, DocumentStoreExt, WriteBatch};
use domain::{Cart, Coupon, DomainError};

use crate::MAX_WRITE_ATTEMPTS;
use crate::carts::{CartOwner, CartService};
use crate::error::{CheckoutError, Result};

/// Resolves coupon codes against a cart.
///
/// Application is validation plus a full discount re-derivation on the
/// cart aggregate; the save uses the same compare-and-swap discipline as
/// every other cart mutation.
#[derive(Clone)]
pub struct CouponService<S> {
    store: S,
    carts: CartService<S>,
}

impl<S: DocumentStore + Clone> CouponService<S> {
    pub fn new(store: S, ttl_days: i64) -> Self {
        let carts = CartService::new(store.clone(), ttl_days);
        Self { store, carts }
    }

    async fn find_by_code(&self, code: &str) -> Result<Coupon> {
        let value = serde_json::Value::String(code.to_string());
        self.store
            .find_records::<Coupon>("code", &value)
            .await?
            .into_iter()
            .next()
            .map(|stored| stored.record)
            .ok_or_else(|| {
                CheckoutError::Domain(DomainError::NotFound {
                    kind: "coupon",
                    id: code.to_string(),
                })
            })
    }

    /// Applies a coupon code to the owner's cart.
    #[tracing::instrument(skip(self))]
    pub async fn apply(&self, owner: CartOwner, code: &str) -> Result<Cart> {
        for _ in 0..MAX_WRITE_ATTEMPTS {
            let coupon = self.find_by_code(code).await?;
            let stored = self.carts.require(owner).await?;
            let guard = stored.guard();
            let mut cart = stored.record;
            let applied = self.carts.load_coupons(&cart).await?;
            cart.apply_coupon(&coupon, &applied, Utc::now())?;

            let mut batch = WriteBatch::new();
            batch.put(&cart, guard)?;
            match self.store.apply(batch).await {
                Ok(()) => return Ok(cart),
                Err(e) if e.is_conflict() => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(CheckoutError::TransactionAborted)
    }

    /// Removes an applied coupon and re-derives the remaining discounts.
    #[tracing::instrument(skip(self))]
    pub async fn remove(&self, owner: CartOwner, coupon_id: CouponId) -> Result<Cart> {
        for _ in 0..MAX_WRITE_ATTEMPTS {
            let stored = self.carts.require(owner).await?;
            let guard = stored.guard();
            let mut cart = stored.record;
            let remaining: Vec<Coupon> = self
                .carts
                .load_coupons(&cart)
                .await?
                .into_iter()
                .filter(|c| c.id != coupon_id)
                .collect();
            cart.remove_coupon(coupon_id, &remaining)?;

            let mut batch = WriteBatch::new();
            batch.put(&cart, guard)?;
            match self.store.apply(batch).await {
                Ok(()) => return Ok(cart),
                Err(e) if e.is_conflict() => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(CheckoutError::TransactionAborted)
    }
}
