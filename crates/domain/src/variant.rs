//! Purchasable variants and the inventory ledger.

use common::{CompanyId, Money, ProductId, VariantId};
use doc_store::{Collection, DocumentId, Record};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, Result};

/// A purchasable variant (SKU) of a product.
///
/// `quantity` and `sold` form the inventory ledger. They are mutated only
/// through [`Variant::reserve`] and [`Variant::release`], and the store's
/// version guard on the variant document makes the read-check-write of a
/// checkout race-free.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub id: VariantId,
    pub product: ProductId,
    pub company: CompanyId,
    pub name: String,
    /// List price in cents.
    pub price: Money,
    /// Promotional price; wins over the list price when present.
    pub price_after_discount: Option<Money>,
    /// Units on hand. Never negative.
    pub quantity: i64,
    /// Units reserved by non-cancelled orders.
    pub sold: i64,
}

impl Variant {
    /// The price a buyer actually pays per unit.
    pub fn effective_price(&self) -> Money {
        self.price_after_discount.unwrap_or(self.price)
    }

    /// Checks that `amount` more units could be taken from stock.
    pub fn check_availability(&self, amount: u32) -> Result<()> {
        if i64::from(amount) > self.quantity {
            return Err(DomainError::QuantityExceeded);
        }
        Ok(())
    }

    /// Moves `amount` units from stock to sold.
    pub fn reserve(&mut self, amount: u32) -> Result<()> {
        let amount = i64::from(amount);
        if amount > self.quantity {
            return Err(DomainError::InsufficientStock {
                variant: self.id,
                requested: amount as u32,
                available: self.quantity,
            });
        }
        self.quantity -= amount;
        self.sold += amount;
        Ok(())
    }

    /// Returns `amount` units from sold back to stock.
    ///
    /// The inverse of [`Variant::reserve`]; `sold` is clamped so a release
    /// that was never reserved cannot drive it negative.
    pub fn release(&mut self, amount: u32) {
        let amount = i64::from(amount).min(self.sold);
        self.quantity += amount;
        self.sold -= amount;
    }
}

impl Record for Variant {
    const COLLECTION: Collection = Collection::Variants;

    fn document_id(&self) -> DocumentId {
        self.id.as_uuid().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variant(quantity: i64, sold: i64) -> Variant {
        Variant {
            id: VariantId::new(),
            product: ProductId::new(),
            company: CompanyId::new(),
            name: "500mg / 20 tablets".to_string(),
            price: Money::from_cents(1_000),
            price_after_discount: None,
            quantity,
            sold,
        }
    }

    #[test]
    fn discounted_price_wins() {
        let mut v = variant(10, 0);
        assert_eq!(v.effective_price(), Money::from_cents(1_000));
        v.price_after_discount = Some(Money::from_cents(800));
        assert_eq!(v.effective_price(), Money::from_cents(800));
    }

    #[test]
    fn reserve_moves_stock_to_sold() {
        let mut v = variant(5, 10);
        v.reserve(5).unwrap();
        assert_eq!(v.quantity, 0);
        assert_eq!(v.sold, 15);
    }

    #[test]
    fn reserve_rejects_overdraw() {
        let mut v = variant(2, 0);
        let err = v.reserve(3).unwrap_err();
        assert!(matches!(err, DomainError::InsufficientStock { available: 2, .. }));
        assert_eq!(v.quantity, 2);
        assert_eq!(v.sold, 0);
    }

    #[test]
    fn release_is_the_inverse_of_reserve() {
        let mut v = variant(5, 10);
        v.reserve(5).unwrap();
        v.release(5);
        assert_eq!(v.quantity, 5);
        assert_eq!(v.sold, 10);
    }

    #[test]
    fn release_clamps_at_zero_sold() {
        let mut v = variant(5, 2);
        v.release(10);
        assert_eq!(v.sold, 0);
        assert_eq!(v.quantity, 7);
    }

    #[test]
    fn availability_check_does_not_mutate() {
        let v = variant(3, 0);
        assert!(v.check_availability(3).is_ok());
        assert_eq!(
            v.check_availability(4).unwrap_err(),
            DomainError::QuantityExceeded
        );
        assert_eq!(v.quantity, 3);
    }
}
