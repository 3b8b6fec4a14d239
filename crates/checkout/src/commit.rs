//! The order commit pipeline.
//!
//! A checkout turns a cart into an order in one atomic write batch:
//! order create, per-variant stock reservation, counter bumps, coupon
//! back-references and the cart delete all land together or not at all.
//! Stock is re-validated from freshly read variants on every attempt, and
//! the variant writes are guarded on the versions those reads saw, so two
//! concurrent checkouts can never both take the last units.

use std::time::Instant;

use chrono::Utc;
use common::{AddressId, Money, OrderId, UserId};
use doc_store::{
    Collection, DocStoreError, DocumentId, DocumentStore, DocumentStoreExt, Expected, Record,
    Stored, WriteBatch,
};
use domain::{
    Address, Company, Coupon, DomainError, Order, PaymentIntent, PaymentMethod, User, Variant,
};

use crate::MAX_WRITE_ATTEMPTS;
use crate::carts::{CartOwner, CartService};
use crate::error::{CheckoutError, Result};
use crate::webhook::PaymentConfirmation;

/// Commits carts into orders.
#[derive(Clone)]
pub struct CheckoutPipeline<S> {
    store: S,
    carts: CartService<S>,
    shipping_fee: Money,
}

impl<S: DocumentStore + Clone> CheckoutPipeline<S> {
    pub fn new(store: S, shipping_fee: Money, cart_ttl_days: i64) -> Self {
        let carts = CartService::new(store.clone(), cart_ttl_days);
        Self {
            store,
            carts,
            shipping_fee,
        }
    }

    /// Commits the user's cart as a cash-on-delivery order.
    #[tracing::instrument(skip(self))]
    pub async fn commit_cash_on_delivery(
        &self,
        user: UserId,
        address: AddressId,
    ) -> Result<Order> {
        self.commit(user, address, PaymentMethod::CashOnDelivery, None)
            .await
    }

    /// Records a payment intention before the buyer is sent to the
    /// provider.
    ///
    /// The intention pins the buyer, the shipping address and the amount
    /// the provider was asked to charge, keyed by the provider's order
    /// id. The webhook later trusts this record, not its own payload,
    /// for all three.
    #[tracing::instrument(skip(self))]
    pub async fn begin_online_payment(
        &self,
        user: UserId,
        address: AddressId,
        provider_order_id: String,
    ) -> Result<PaymentIntent> {
        let cart = self.carts.require(CartOwner::User(user)).await?;

        let stored: Stored<Address> = self
            .store
            .get_record(DocumentId::from(address.as_uuid()))
            .await?
            .ok_or(DomainError::NotFound {
                kind: "address",
                id: address.to_string(),
            })?;
        if stored.record.user != user {
            return Err(DomainError::Unauthorized.into());
        }

        let amount = cart.record.payable_total() + self.shipping_fee;
        let intent = PaymentIntent {
            provider_order_id,
            user,
            address,
            amount_cents: amount.cents(),
            order: None,
            created_at: Utc::now(),
        };
        let mut batch = WriteBatch::new();
        batch.put(&intent, Expected::New)?;
        match self.store.apply(batch).await {
            Ok(()) => Ok(intent),
            Err(e) if e.is_conflict() => Err(CheckoutError::InvalidPayload(
                "a payment was already initiated for this provider order id".to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    /// Commits the user's cart after a verified online payment.
    ///
    /// The buyer, address and expected amount come from the intention
    /// recorded at initiation; the callback only proves the provider
    /// charged that provider order id. Idempotent: a re-delivered
    /// confirmation finds the order the intention already committed and
    /// returns it.
    #[tracing::instrument(skip(self, confirmation), fields(provider_order_id = %confirmation.provider_order_id))]
    pub async fn commit_online(&self, confirmation: PaymentConfirmation) -> Result<Order> {
        let intent = self
            .payment_intent(&confirmation.provider_order_id)
            .await?
            .ok_or_else(|| DomainError::NotFound {
                kind: "payment intention",
                id: confirmation.provider_order_id.clone(),
            })?;

        if let Some(order_id) = intent.record.order
            && let Some(order) = self.order_by_id(order_id).await?
        {
            return Ok(order);
        }

        if confirmation.amount_cents != intent.record.amount_cents {
            return Err(CheckoutError::AmountMismatch {
                expected: intent.record.amount_cents,
                actual: confirmation.amount_cents,
            });
        }

        let payment = PaymentMethod::Online {
            provider_order_id: confirmation.provider_order_id.clone(),
        };
        self.commit(
            intent.record.user,
            intent.record.address,
            payment,
            Some(confirmation),
        )
        .await
    }

    async fn payment_intent(
        &self,
        provider_order_id: &str,
    ) -> Result<Option<Stored<PaymentIntent>>> {
        Ok(self
            .store
            .get_record::<PaymentIntent>(DocumentId::new(provider_order_id.to_string()))
            .await?)
    }

    async fn order_by_id(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self
            .store
            .get_record::<Order>(DocumentId::from(id.as_uuid()))
            .await?
            .map(|stored| stored.record))
    }

    /// The order a provider order id already committed, if any.
    async fn committed_order(&self, provider_order_id: &str) -> Result<Option<Order>> {
        match self.payment_intent(provider_order_id).await? {
            Some(intent) => match intent.record.order {
                Some(order_id) => self.order_by_id(order_id).await,
                None => Ok(None),
            },
            None => Ok(None),
        }
    }

    async fn commit(
        &self,
        user: UserId,
        address: AddressId,
        payment: PaymentMethod,
        confirmation: Option<PaymentConfirmation>,
    ) -> Result<Order> {
        let started = Instant::now();

        for _ in 0..MAX_WRITE_ATTEMPTS {
            match self
                .try_commit(user, address, payment.clone(), confirmation.as_ref())
                .await
            {
                Ok(order) => {
                    metrics::counter!("orders_committed_total").increment(1);
                    metrics::histogram!("checkout_duration_seconds")
                        .record(started.elapsed().as_secs_f64());
                    return Ok(order);
                }
                Err(CheckoutError::Store(DocStoreError::Conflict {
                    collection: Collection::PaymentIntents,
                    ..
                })) => {
                    // A concurrent delivery of the same confirmation won
                    // the marker; hand back its order.
                    if let Some(conf) = &confirmation
                        && let Some(order) = self.committed_order(&conf.provider_order_id).await?
                    {
                        return Ok(order);
                    }
                    return Err(CheckoutError::TransactionAborted);
                }
                Err(CheckoutError::Store(e)) if e.is_conflict() => {
                    metrics::counter!("checkout_conflicts_total").increment(1);
                    continue;
                }
                Err(err @ CheckoutError::Domain(DomainError::NotFound { kind: "cart", .. })) => {
                    // The cart is consumed by the commit, so a concurrent
                    // delivery that won the race leaves this one cartless.
                    if let Some(conf) = &confirmation
                        && let Some(order) = self.committed_order(&conf.provider_order_id).await?
                    {
                        return Ok(order);
                    }
                    return Err(err);
                }
                Err(e) => return Err(e),
            }
        }
        Err(CheckoutError::TransactionAborted)
    }

    async fn try_commit(
        &self,
        user_id: UserId,
        address_id: AddressId,
        payment: PaymentMethod,
        confirmation: Option<&PaymentConfirmation>,
    ) -> Result<Order> {
        let now = Utc::now();

        let user: Stored<User> = self
            .store
            .get_record(DocumentId::from(user_id.as_uuid()))
            .await?
            .ok_or(DomainError::NotFound {
                kind: "user",
                id: user_id.to_string(),
            })?;

        let cart = self.carts.require(CartOwner::User(user_id)).await?;
        let cart_guard = cart.guard();
        let cart_doc = cart.record.document_id();
        let cart = cart.record;

        let address: Stored<Address> = self
            .store
            .get_record(DocumentId::from(address_id.as_uuid()))
            .await?
            .ok_or(DomainError::NotFound {
                kind: "address",
                id: address_id.to_string(),
            })?;
        if address.record.user != user_id {
            return Err(DomainError::Unauthorized.into());
        }

        let mut batch = WriteBatch::new();

        // Reserve stock against the variant versions just read; any
        // concurrent sale invalidates the batch through these guards.
        for item in &cart.items {
            let mut variant: Stored<Variant> = self
                .store
                .get_record(DocumentId::from(item.variant.as_uuid()))
                .await?
                .ok_or(DomainError::NotFound {
                    kind: "variant",
                    id: item.variant.to_string(),
                })?;
            variant.record.reserve(item.amount)?;
            let guard = variant.guard();
            batch.put(&variant.record, guard)?;
        }

        let order = Order::from_cart(
            &cart,
            user_id,
            address.record.snapshot(),
            payment,
            self.shipping_fee,
            now,
        )?;
        batch.put(&order, Expected::New)?;

        for company_id in order.companies() {
            let mut company: Stored<Company> = self
                .store
                .get_record(DocumentId::from(company_id.as_uuid()))
                .await?
                .ok_or(DomainError::NotFound {
                    kind: "company",
                    id: company_id.to_string(),
                })?;
            company.record.orders_count += 1;
            let guard = company.guard();
            batch.put(&company.record, guard)?;
        }

        let mut buyer = user;
        buyer.record.record_order(&order);
        let guard = buyer.guard();
        batch.put(&buyer.record, guard)?;

        for coupon_id in &order.coupons {
            if let Some(mut coupon) = self
                .store
                .get_record::<Coupon>(DocumentId::from(coupon_id.as_uuid()))
                .await?
            {
                coupon.record.orders.push(order.id);
                let guard = coupon.guard();
                batch.put(&coupon.record, guard)?;
            }
        }

        batch.delete(Collection::Carts, cart_doc, cart_guard);

        if let Some(conf) = confirmation {
            // The order is rebuilt from the cart as it stands now; the
            // buyer must have paid exactly that.
            if order.total.cents() != conf.amount_cents {
                return Err(CheckoutError::AmountMismatch {
                    expected: order.total.cents(),
                    actual: conf.amount_cents,
                });
            }

            let intent = self
                .payment_intent(&conf.provider_order_id)
                .await?
                .ok_or_else(|| DomainError::NotFound {
                    kind: "payment intention",
                    id: conf.provider_order_id.clone(),
                })?;
            if intent.record.order.is_some() {
                // Another delivery completed between the caller's check
                // and this read; surface it as a marker conflict so the
                // retry loop resolves the order it committed.
                return Err(DocStoreError::Conflict {
                    collection: Collection::PaymentIntents,
                    id: intent.record.document_id(),
                    expected: None,
                    actual: None,
                }
                .into());
            }
            let guard = intent.guard();
            let mut marker = intent.record;
            marker.order = Some(order.id);
            batch.put(&marker, guard)?;
        }

        self.store.apply(batch).await?;
        Ok(order)
    }
}
