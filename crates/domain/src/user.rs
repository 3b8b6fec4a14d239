//! User accounts.

use std::collections::BTreeSet;

use common::{ProductId, UserId};
use doc_store::{Collection, DocumentId, Record};
use serde::{Deserialize, Serialize};

use crate::order::{Order, OrderStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Admin,
}

/// A registered account.
///
/// `purchased_products` is the set of products in the user's non-cancelled
/// orders; it feeds review eligibility and is kept in step by the checkout
/// and cancellation pipelines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub orders_count: i64,
    pub purchased_products: BTreeSet<ProductId>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Records a placed order.
    pub fn record_order(&mut self, order: &Order) {
        self.orders_count += 1;
        self.purchased_products.extend(order.products());
    }

    /// Undoes a cancelled order.
    ///
    /// `remaining_orders` is the user's full order history; the purchased
    /// set is recomputed from the non-cancelled ones so a product bought
    /// in another order survives the cancellation.
    pub fn record_cancellation(&mut self, remaining_orders: &[Order]) {
        self.orders_count = (self.orders_count - 1).max(0);
        self.purchased_products = remaining_orders
            .iter()
            .filter(|o| o.status != OrderStatus::Cancelled)
            .flat_map(|o| o.products())
            .collect();
    }
}

impl Record for User {
    const COLLECTION: Collection = Collection::Users;

    fn document_id(&self) -> DocumentId {
        self.id.as_uuid().into()
    }
}
