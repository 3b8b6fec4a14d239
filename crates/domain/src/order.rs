//! Orders and their lifecycle.

use chrono::{DateTime, Utc};
use common::{AddressId, CompanyId, CouponId, Money, OrderId, ProductId, UserId, VariantId};
use doc_store::{Collection, DocumentId, Record};
use serde::{Deserialize, Serialize};

use crate::cart::Cart;
use crate::error::{DomainError, Result};

/// Order lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    fn can_move_to(self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Processing, OrderStatus::Shipped)
                | (OrderStatus::Processing, OrderStatus::Delivered)
                | (OrderStatus::Processing, OrderStatus::Cancelled)
                | (OrderStatus::Shipped, OrderStatus::Delivered)
        )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// How an order was (or will be) paid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "method")]
pub enum PaymentMethod {
    CashOnDelivery,
    Online { provider_order_id: String },
}

/// Shipping details copied from the address book at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub first_name: String,
    pub last_name: String,
    pub street: String,
    pub building: String,
    pub phone: String,
    pub city: String,
}

/// A line of an order, snapshotted from the cart at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product: ProductId,
    pub company: CompanyId,
    pub variant: VariantId,
    pub amount: u32,
    pub total_price: Money,
    pub total_after_coupons: Option<Money>,
}

/// A placed order.
///
/// Items, totals and the shipping address are copies taken at checkout;
/// later catalog or address edits do not reach back into history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user: UserId,
    pub items: Vec<OrderItem>,
    pub subtotal: Money,
    pub shipping_fee: Money,
    pub total: Money,
    pub status: OrderStatus,
    pub shipping_address: ShippingAddress,
    pub payment: PaymentMethod,
    pub paid: bool,
    pub coupons: Vec<CouponId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Builds an order from a cart at checkout time.
    pub fn from_cart(
        cart: &Cart,
        user: UserId,
        shipping_address: ShippingAddress,
        payment: PaymentMethod,
        shipping_fee: Money,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        if cart.is_empty() {
            return Err(DomainError::EmptyCart);
        }

        let items: Vec<OrderItem> = cart
            .items
            .iter()
            .map(|item| OrderItem {
                product: item.product,
                company: item.company,
                variant: item.variant,
                amount: item.amount,
                total_price: item.total_price,
                total_after_coupons: item.total_after_coupons,
            })
            .collect();

        let subtotal = cart.payable_total();
        let paid = matches!(payment, PaymentMethod::Online { .. });

        Ok(Self {
            id: OrderId::new(),
            user,
            items,
            subtotal,
            shipping_fee,
            total: subtotal + shipping_fee,
            status: OrderStatus::Processing,
            shipping_address,
            payment,
            paid,
            coupons: cart.coupons.clone(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Moves the order to a new lifecycle state.
    pub fn set_status(&mut self, next: OrderStatus, now: DateTime<Utc>) -> Result<()> {
        if !self.status.can_move_to(next) {
            return Err(DomainError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    /// Cancels the order. Allowed only while it is still processing.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.set_status(OrderStatus::Cancelled, now)
    }

    /// The distinct companies with at least one line in this order, in
    /// first-seen order.
    pub fn companies(&self) -> Vec<CompanyId> {
        let mut out: Vec<CompanyId> = Vec::new();
        for item in &self.items {
            if !out.contains(&item.company) {
                out.push(item.company);
            }
        }
        out
    }

    /// The distinct products in this order.
    pub fn products(&self) -> Vec<ProductId> {
        let mut out: Vec<ProductId> = Vec::new();
        for item in &self.items {
            if !out.contains(&item.product) {
                out.push(item.product);
            }
        }
        out
    }
}

impl Record for Order {
    const COLLECTION: Collection = Collection::Orders;

    fn document_id(&self) -> DocumentId {
        self.id.as_uuid().into()
    }
}

/// A payment intention, keyed by the provider's order id.
///
/// Written when an online payment is initiated, before the buyer is sent
/// to the provider. The webhook resolves the buyer and address from this
/// record, never from anything echoed back in the callback, and the
/// recorded amount is what the provider was asked to charge. `order` is
/// filled in by the commit through a version-guarded update, which
/// doubles as the idempotency marker: a re-delivered webhook finds the
/// order already set and cannot commit a second one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub provider_order_id: String,
    pub user: UserId,
    pub address: AddressId,
    pub amount_cents: i64,
    pub order: Option<OrderId>,
    pub created_at: DateTime<Utc>,
}

impl Record for PaymentIntent {
    const COLLECTION: Collection = Collection::PaymentIntents;

    fn document_id(&self) -> DocumentId {
        DocumentId::new(self.provider_order_id.clone())
    }
}
