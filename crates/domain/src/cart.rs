//! The cart aggregate.
//!
//! A cart is a list of line items plus derived totals. The totals are
//! never patched incrementally: every mutation ends with
//! [`Cart::recompute`], which re-derives `total_items`, `total_price` and
//! the coupon discounts from the item list, so the invariant
//! `total_price == Σ line totals` holds after any sequence of operations.

use chrono::{DateTime, Duration, Utc};
use common::{CartId, CartItemId, CompanyId, CouponId, Money, ProductId, UserId, VariantId};
use doc_store::{Collection, DocumentId, Record};
use serde::{Deserialize, Serialize};

use crate::coupon::Coupon;
use crate::error::{DomainError, Result};
use crate::variant::Variant;

/// One line of a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: CartItemId,
    pub product: ProductId,
    pub company: CompanyId,
    pub variant: VariantId,
    pub amount: u32,
    /// Accumulated price of the line, at the effective unit prices that
    /// were current when each unit was added.
    pub total_price: Money,
    /// Line price after company coupons; absent when no coupon touches
    /// this line.
    pub total_after_coupons: Option<Money>,
}

/// A shopping cart, owned by a user or anonymous.
///
/// Anonymous carts have no `user` and are addressed by their id, which the
/// caller holds in its session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub id: CartId,
    pub user: Option<UserId>,
    pub items: Vec<CartItem>,
    /// Ids of applied coupons; at most one per company.
    pub coupons: Vec<CouponId>,
    pub total_items: u32,
    pub total_price: Money,
    pub total_after_coupons: Option<Money>,
    pub created_at: DateTime<Utc>,
    /// Abandonment deadline, checked when the cart is resolved.
    pub expires_at: DateTime<Utc>,
}

impl Cart {
    /// Creates an empty cart.
    pub fn new(user: Option<UserId>, now: DateTime<Utc>, ttl_days: i64) -> Self {
        Self {
            id: CartId::new(),
            user,
            items: Vec::new(),
            coupons: Vec::new(),
            total_items: 0,
            total_price: Money::zero(),
            total_after_coupons: None,
            created_at: now,
            expires_at: now + Duration::days(ttl_days),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The total a buyer pays for the items, after any coupons.
    pub fn payable_total(&self) -> Money {
        self.total_after_coupons.unwrap_or(self.total_price)
    }

    /// Line identity for adds: a product can be carted in several
    /// variants, each on its own line.
    fn item_index_by_line(&self, product: ProductId, variant: VariantId) -> Option<usize> {
        self.items
            .iter()
            .position(|item| item.product == product && item.variant == variant)
    }

    fn item_index_by_product(&self, product: ProductId) -> Option<usize> {
        self.items.iter().position(|item| item.product == product)
    }

    pub fn item(&self, item_id: CartItemId) -> Option<&CartItem> {
        self.items.iter().find(|item| item.id == item_id)
    }

    fn item_mut(&mut self, item_id: CartItemId) -> Result<&mut CartItem> {
        self.items
            .iter_mut()
            .find(|item| item.id == item_id)
            .ok_or(DomainError::NotFound {
                kind: "cart item",
                id: item_id.to_string(),
            })
    }

    /// Adds `amount` units of a variant, merging into an existing line for
    /// the same product and variant.
    ///
    /// Rejects with [`DomainError::QuantityExceeded`] when the line's new
    /// amount would exceed the variant's stock.
    pub fn add_item(&mut self, variant: &Variant, amount: u32, coupons: &[Coupon]) -> Result<()> {
        let already = self
            .items
            .iter()
            .find(|item| item.product == variant.product && item.variant == variant.id)
            .map(|item| item.amount)
            .unwrap_or(0);
        variant.check_availability(already + amount)?;

        let added = variant.effective_price().multiply(amount);
        match self.item_index_by_line(variant.product, variant.id) {
            Some(idx) => {
                let item = &mut self.items[idx];
                item.amount += amount;
                item.total_price += added;
            }
            None => self.items.push(CartItem {
                id: CartItemId::new(),
                product: variant.product,
                company: variant.company,
                variant: variant.id,
                amount,
                total_price: added,
                total_after_coupons: None,
            }),
        }

        self.recompute(coupons);
        Ok(())
    }

    /// Adds one unit to a line at the variant's current effective price.
    pub fn increment_item(
        &mut self,
        item_id: CartItemId,
        variant: &Variant,
        coupons: &[Coupon],
    ) -> Result<()> {
        let item = self.item_mut(item_id)?;
        variant.check_availability(item.amount + 1)?;
        item.amount += 1;
        item.total_price += variant.effective_price();
        self.recompute(coupons);
        Ok(())
    }

    /// Removes one unit from a line; removing the last unit drops the line.
    pub fn decrement_item(
        &mut self,
        item_id: CartItemId,
        variant: &Variant,
        coupons: &[Coupon],
    ) -> Result<()> {
        let idx = self
            .items
            .iter()
            .position(|item| item.id == item_id)
            .ok_or(DomainError::NotFound {
                kind: "cart item",
                id: item_id.to_string(),
            })?;
        let item = &mut self.items[idx];
        item.amount -= 1;
        if item.amount == 0 {
            self.items.remove(idx);
        } else {
            item.total_price -= variant.effective_price();
        }
        self.recompute(coupons);
        Ok(())
    }

    /// Drops a whole line.
    pub fn remove_item(&mut self, item_id: CartItemId, coupons: &[Coupon]) -> Result<()> {
        self.item_mut(item_id)?;
        self.items.retain(|item| item.id != item_id);
        self.recompute(coupons);
        Ok(())
    }

    /// Empties the cart but keeps the document.
    pub fn clear(&mut self) {
        self.items.clear();
        self.coupons.clear();
        self.recompute(&[]);
    }

    /// Folds a guest cart into this one, summing lines by product identity.
    ///
    /// The guest cart's coupons are discarded; the surviving coupon set is
    /// this cart's, re-derived over the merged items.
    pub fn merge_from(&mut self, guest: Cart, coupons: &[Coupon]) {
        for incoming in guest.items {
            match self.item_index_by_product(incoming.product) {
                Some(idx) => {
                    let item = &mut self.items[idx];
                    item.amount += incoming.amount;
                    item.total_price += incoming.total_price;
                }
                None => self.items.push(incoming),
            }
        }
        self.recompute(coupons);
    }

    /// Validates a coupon against this cart and applies it.
    ///
    /// `applied` is the set of coupon records already on the cart; at most
    /// one coupon per company is allowed, so a second code from the same
    /// company is rejected as already applied.
    pub fn apply_coupon(
        &mut self,
        coupon: &Coupon,
        applied: &[Coupon],
        now: DateTime<Utc>,
    ) -> Result<()> {
        if coupon.is_expired(now) {
            return Err(DomainError::CouponExpired);
        }
        if self.coupons.contains(&coupon.id)
            || applied.iter().any(|c| c.company == coupon.company)
        {
            return Err(DomainError::CouponAlreadyApplied);
        }
        if !self.items.iter().any(|item| item.company == coupon.company) {
            return Err(DomainError::CouponNotApplicable);
        }

        self.coupons.push(coupon.id);
        let mut all: Vec<Coupon> = applied.to_vec();
        all.push(coupon.clone());
        self.recompute(&all);
        Ok(())
    }

    /// Removes a coupon and re-derives the discounts without it.
    pub fn remove_coupon(&mut self, coupon_id: CouponId, remaining: &[Coupon]) -> Result<()> {
        if !self.coupons.contains(&coupon_id) {
            return Err(DomainError::NotFound {
                kind: "coupon",
                id: coupon_id.to_string(),
            });
        }
        self.coupons.retain(|id| *id != coupon_id);
        self.recompute(remaining);
        Ok(())
    }

    /// Re-derives every total from the item list and the coupon set.
    ///
    /// Discounts are a pure function of items and coupons: each line
    /// belonging to a coupon's company pays
    /// `floor(total_price * (100 - sale) / 100)`.
    pub fn recompute(&mut self, coupons: &[Coupon]) {
        self.coupons.retain(|id| coupons.iter().any(|c| c.id == *id));

        self.total_items = self.items.iter().map(|item| item.amount).sum();
        self.total_price = self.items.iter().map(|item| item.total_price).sum();

        let mut any_discount = false;
        for item in &mut self.items {
            item.total_after_coupons = coupons
                .iter()
                .find(|c| c.company == item.company)
                .map(|c| item.total_price.percent_off(c.sale));
            any_discount |= item.total_after_coupons.is_some();
        }

        self.total_after_coupons = any_discount.then(|| {
            self.items
                .iter()
                .map(|item| item.total_after_coupons.unwrap_or(item.total_price))
                .sum()
        });
    }
}

impl Record for Cart {
    const COLLECTION: Collection = Collection::Carts;

    fn document_id(&self) -> DocumentId {
        self.id.as_uuid().into()
    }
}
