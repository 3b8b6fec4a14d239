//! Company coupons.

use chrono::{DateTime, Utc};
use common::{CompanyId, CouponId, OrderId};
use doc_store::{Collection, DocumentId, Record};
use serde::{Deserialize, Serialize};

/// A percentage discount issued by a company, redeemable by code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coupon {
    pub id: CouponId,
    pub company: CompanyId,
    /// Redemption code, unique across the coupons collection.
    pub code: String,
    /// Discount percent, 0..=100.
    pub sale: u8,
    pub expires_at: DateTime<Utc>,
    /// Orders that consumed this coupon, appended at checkout.
    pub orders: Vec<OrderId>,
}

impl Coupon {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

impl Record for Coupon {
    const COLLECTION: Collection = Collection::Coupons;

    fn document_id(&self) -> DocumentId {
        self.id.as_uuid().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn expiry_is_inclusive_of_the_deadline() {
        let now = Utc::now();
        let coupon = Coupon {
            id: CouponId::new(),
            company: CompanyId::new(),
            code: "SPRING20".to_string(),
            sale: 20,
            expires_at: now,
            orders: Vec::new(),
        };
        assert!(coupon.is_expired(now));
        assert!(!coupon.is_expired(now - Duration::seconds(1)));
    }
}
