//! The order cancellation pipeline.
//!
//! Cancellation is the exact inverse of a commit for stock and counters:
//! every reserved unit is released, every company and user counter comes
//! back down, and the purchased-products set is recomputed from the
//! orders that remain. The order record itself stays as queryable history
//! with status `cancelled`.

use chrono::Utc;
use common::{OrderId, UserId};
use doc_store::{DocumentId, DocumentStore, DocumentStoreExt, Stored, WriteBatch};
use domain::{Company, DomainError, Order, User, Variant};

use crate::MAX_WRITE_ATTEMPTS;
use crate::error::{CheckoutError, Result};

/// Cancels processing orders.
#[derive(Clone)]
pub struct CancellationPipeline<S> {
    store: S,
}

impl<S: DocumentStore> CancellationPipeline<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Cancels an order on behalf of `actor`.
    ///
    /// The actor must own the order or be an admin. Non-admins get the
    /// same `Unauthorized` whether the order is missing or belongs to
    /// someone else, so probing cannot reveal which orders exist.
    #[tracing::instrument(skip(self))]
    pub async fn cancel(&self, order_id: OrderId, actor: UserId) -> Result<Order> {
        let actor: Stored<User> = self
            .store
            .get_record(DocumentId::from(actor.as_uuid()))
            .await?
            .ok_or(DomainError::Unauthorized)?;

        for _ in 0..MAX_WRITE_ATTEMPTS {
            match self.try_cancel(order_id, &actor.record).await {
                Ok(order) => {
                    metrics::counter!("orders_cancelled_total").increment(1);
                    return Ok(order);
                }
                Err(CheckoutError::Store(e)) if e.is_conflict() => continue,
                Err(e) => return Err(e),
            }
        }
        Err(CheckoutError::TransactionAborted)
    }

    async fn try_cancel(&self, order_id: OrderId, actor: &User) -> Result<Order> {
        let now = Utc::now();

        let stored: Option<Stored<Order>> = self
            .store
            .get_record(DocumentId::from(order_id.as_uuid()))
            .await?;
        let stored = match stored {
            Some(stored) => stored,
            None if actor.is_admin() => {
                return Err(DomainError::NotFound {
                    kind: "order",
                    id: order_id.to_string(),
                }
                .into());
            }
            None => return Err(DomainError::Unauthorized.into()),
        };
        if stored.record.user != actor.id && !actor.is_admin() {
            return Err(DomainError::Unauthorized.into());
        }

        let order_guard = stored.guard();
        let mut order = stored.record;
        order.cancel(now)?;

        let mut batch = WriteBatch::new();

        for item in &order.items {
            // A variant deleted from the catalog after the sale has no
            // stock left to restore.
            if let Some(mut variant) = self
                .store
                .get_record::<Variant>(DocumentId::from(item.variant.as_uuid()))
                .await?
            {
                variant.record.release(item.amount);
                let guard = variant.guard();
                batch.put(&variant.record, guard)?;
            }
        }

        for company_id in order.companies() {
            if let Some(mut company) = self
                .store
                .get_record::<Company>(DocumentId::from(company_id.as_uuid()))
                .await?
            {
                company.record.orders_count = (company.record.orders_count - 1).max(0);
                let guard = company.guard();
                batch.put(&company.record, guard)?;
            }
        }

        let mut buyer: Stored<User> = self
            .store
            .get_record(DocumentId::from(order.user.as_uuid()))
            .await?
            .ok_or(DomainError::NotFound {
                kind: "user",
                id: order.user.to_string(),
            })?;
        let history = self.order_history(order.user, &order).await?;
        buyer.record.record_cancellation(&history);
        let guard = buyer.guard();
        batch.put(&buyer.record, guard)?;

        batch.put(&order, order_guard)?;

        self.store.apply(batch).await?;
        Ok(order)
    }

    /// The buyer's full order history with the order being cancelled
    /// replaced by its cancelled version.
    async fn order_history(&self, user: UserId, cancelled: &Order) -> Result<Vec<Order>> {
        let value = serde_json::Value::String(user.to_string());
        Ok(self
            .store
            .find_records::<Order>("user", &value)
            .await?
            .into_iter()
            .map(|stored| {
                if stored.record.id == cancelled.id {
                    cancelled.clone()
                } else {
                    stored.record
                }
            })
            .collect())
    }
}
