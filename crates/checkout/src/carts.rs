//! Cart resolution and mutation.

use chrono::Utc;
use common::{CartId, CartItemId, UserId, VariantId};
use doc_store::{
    Collection, DocumentId, DocumentStore, DocumentStoreExt, Expected, Record, Stored, WriteBatch,
};
use domain::{Cart, Coupon, DomainError, Variant};

use crate::MAX_WRITE_ATTEMPTS;
use crate::error::{CheckoutError, Result};

/// Whose cart an operation targets.
///
/// Exactly one resolution path: an authenticated user's cart is found by
/// their user id, an anonymous cart by the cart id the session holds. A
/// guest without a cart yet passes `Anonymous(None)` and gets one created
/// on first add.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartOwner {
    User(UserId),
    Anonymous(Option<CartId>),
}

/// Loads, mutates and saves carts with optimistic concurrency.
#[derive(Clone)]
pub struct CartService<S> {
    store: S,
    ttl_days: i64,
}

impl<S: DocumentStore> CartService<S> {
    pub fn new(store: S, ttl_days: i64) -> Self {
        Self { store, ttl_days }
    }

    /// Finds the owner's cart, enforcing the abandonment deadline: an
    /// expired cart is deleted here and reported as absent.
    pub async fn resolve(&self, owner: CartOwner) -> Result<Option<Stored<Cart>>> {
        let found = match owner {
            CartOwner::User(user) => {
                let value = serde_json::Value::String(user.to_string());
                self.store
                    .find_records::<Cart>("user", &value)
                    .await?
                    .into_iter()
                    .next()
            }
            CartOwner::Anonymous(Some(id)) => {
                self.store
                    .get_record::<Cart>(DocumentId::from(id.as_uuid()))
                    .await?
            }
            CartOwner::Anonymous(None) => None,
        };

        match found {
            Some(stored) if stored.record.is_expired(Utc::now()) => {
                let mut batch = WriteBatch::new();
                batch.delete(
                    Collection::Carts,
                    stored.record.document_id(),
                    stored.guard(),
                );
                match self.store.apply(batch).await {
                    // A concurrent writer beat us to it; absent either way.
                    Err(e) if e.is_conflict() => {}
                    other => other?,
                }
                Ok(None)
            }
            other => Ok(other),
        }
    }

    /// Returns the owner's cart, if any.
    pub async fn get_cart(&self, owner: CartOwner) -> Result<Option<Cart>> {
        Ok(self.resolve(owner).await?.map(|stored| stored.record))
    }

    pub(crate) async fn require(&self, owner: CartOwner) -> Result<Stored<Cart>> {
        self.resolve(owner).await?.ok_or_else(|| {
            CheckoutError::Domain(DomainError::NotFound {
                kind: "cart",
                id: match owner {
                    CartOwner::User(user) => user.to_string(),
                    CartOwner::Anonymous(Some(id)) => id.to_string(),
                    CartOwner::Anonymous(None) => "anonymous".to_string(),
                },
            })
        })
    }

    async fn load_variant(&self, id: VariantId) -> Result<Stored<Variant>> {
        self.store
            .get_record::<Variant>(DocumentId::from(id.as_uuid()))
            .await?
            .ok_or_else(|| {
                CheckoutError::Domain(DomainError::NotFound {
                    kind: "variant",
                    id: id.to_string(),
                })
            })
    }

    /// Loads the coupon records a cart references; ids whose coupon has
    /// since been deleted drop out of the derivation.
    pub(crate) async fn load_coupons(&self, cart: &Cart) -> Result<Vec<Coupon>> {
        let mut coupons = Vec::with_capacity(cart.coupons.len());
        for id in &cart.coupons {
            if let Some(stored) = self
                .store
                .get_record::<Coupon>(DocumentId::from(id.as_uuid()))
                .await?
            {
                coupons.push(stored.record);
            }
        }
        Ok(coupons)
    }

    /// Saves a cart, deleting the document instead when it has emptied.
    async fn save(&self, cart: &Cart, guard: Expected) -> std::result::Result<(), doc_store::DocStoreError> {
        let mut batch = WriteBatch::new();
        if cart.is_empty() {
            batch.delete(Collection::Carts, cart.document_id(), guard);
        } else {
            batch.put(cart, guard)?;
        }
        self.store.apply(batch).await
    }

    /// Adds `amount` units of a variant to the owner's cart, creating the
    /// cart on first add. The returned cart carries the id a guest session
    /// should bind to.
    #[tracing::instrument(skip(self))]
    pub async fn add_item(
        &self,
        owner: CartOwner,
        variant_id: VariantId,
        amount: u32,
    ) -> Result<Cart> {
        for _ in 0..MAX_WRITE_ATTEMPTS {
            let variant = self.load_variant(variant_id).await?;
            let (mut cart, guard) = match self.resolve(owner).await? {
                Some(stored) => {
                    let guard = stored.guard();
                    (stored.record, guard)
                }
                None => {
                    let user = match owner {
                        CartOwner::User(user) => Some(user),
                        CartOwner::Anonymous(_) => None,
                    };
                    (Cart::new(user, Utc::now(), self.ttl_days), Expected::New)
                }
            };
            let coupons = self.load_coupons(&cart).await?;
            cart.add_item(&variant.record, amount, &coupons)?;

            match self.save(&cart, guard).await {
                Ok(()) => return Ok(cart),
                Err(e) if e.is_conflict() => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(CheckoutError::TransactionAborted)
    }

    /// Adds one unit to a line at the variant's current effective price.
    #[tracing::instrument(skip(self))]
    pub async fn increment_item(&self, owner: CartOwner, item_id: CartItemId) -> Result<Cart> {
        for _ in 0..MAX_WRITE_ATTEMPTS {
            let stored = self.require(owner).await?;
            let guard = stored.guard();
            let mut cart = stored.record;
            let variant_id = cart
                .item(item_id)
                .ok_or(DomainError::NotFound {
                    kind: "cart item",
                    id: item_id.to_string(),
                })?
                .variant;
            let variant = self.load_variant(variant_id).await?;
            let coupons = self.load_coupons(&cart).await?;
            cart.increment_item(item_id, &variant.record, &coupons)?;

            match self.save(&cart, guard).await {
                Ok(()) => return Ok(cart),
                Err(e) if e.is_conflict() => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(CheckoutError::TransactionAborted)
    }

    /// Removes one unit from a line; the line disappears at zero, and an
    /// emptied cart is deleted.
    #[tracing::instrument(skip(self))]
    pub async fn decrement_item(&self, owner: CartOwner, item_id: CartItemId) -> Result<Cart> {
        for _ in 0..MAX_WRITE_ATTEMPTS {
            let stored = self.require(owner).await?;
            let guard = stored.guard();
            let mut cart = stored.record;
            let variant_id = cart
                .item(item_id)
                .ok_or(DomainError::NotFound {
                    kind: "cart item",
                    id: item_id.to_string(),
                })?
                .variant;
            let variant = self.load_variant(variant_id).await?;
            let coupons = self.load_coupons(&cart).await?;
            cart.decrement_item(item_id, &variant.record, &coupons)?;

            match self.save(&cart, guard).await {
                Ok(()) => return Ok(cart),
                Err(e) if e.is_conflict() => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(CheckoutError::TransactionAborted)
    }

    /// Drops a whole line; an emptied cart is deleted.
    #[tracing::instrument(skip(self))]
    pub async fn remove_item(&self, owner: CartOwner, item_id: CartItemId) -> Result<Cart> {
        for _ in 0..MAX_WRITE_ATTEMPTS {
            let stored = self.require(owner).await?;
            let guard = stored.guard();
            let mut cart = stored.record;
            let coupons = self.load_coupons(&cart).await?;
            cart.remove_item(item_id, &coupons)?;

            match self.save(&cart, guard).await {
                Ok(()) => return Ok(cart),
                Err(e) if e.is_conflict() => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(CheckoutError::TransactionAborted)
    }

    /// Empties the cart but keeps the document (an administrative reset).
    #[tracing::instrument(skip(self))]
    pub async fn clear(&self, owner: CartOwner) -> Result<Cart> {
        for _ in 0..MAX_WRITE_ATTEMPTS {
            let stored = self.require(owner).await?;
            let guard = stored.guard();
            let mut cart = stored.record;
            cart.clear();

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

    /// Folds a guest cart into a user's cart at login.
    ///
    /// Without a guest cart this is a no-op; when the user has no cart of
    /// their own, the guest cart is re-homed to them instead of copied.
    #[tracing::instrument(skip(self))]
    pub async fn merge(&self, guest_id: CartId, user: UserId) -> Result<Option<Cart>> {
        for _ in 0..MAX_WRITE_ATTEMPTS {
            let guest = match self.resolve(CartOwner::Anonymous(Some(guest_id))).await? {
                Some(stored) => stored,
                None => return self.get_cart(CartOwner::User(user)).await,
            };

            match self.resolve(CartOwner::User(user)).await? {
                None => {
                    let guard = guest.guard();
                    let mut cart = guest.record;
                    cart.user = Some(user);
                    let mut batch = WriteBatch::new();
                    batch.put(&cart, guard)?;
                    match self.store.apply(batch).await {
                        Ok(()) => return Ok(Some(cart)),
                        Err(e) if e.is_conflict() => continue,
                        Err(e) => return Err(e.into()),
                    }
                }
                Some(mine) => {
                    let guard = mine.guard();
                    let mut cart = mine.record;
                    let coupons = self.load_coupons(&cart).await?;
                    let guest_guard = guest.guard();
                    let guest_doc = guest.record.document_id();
                    cart.merge_from(guest.record, &coupons);

                    let mut batch = WriteBatch::new();
                    batch.put(&cart, guard)?;
                    batch.delete(Collection::Carts, guest_doc, guest_guard);
                    match self.store.apply(batch).await {
                        Ok(()) => return Ok(Some(cart)),
                        Err(e) if e.is_conflict() => continue,
                        Err(e) => return Err(e.into()),
                    }
                }
            }
        }
        Err(CheckoutError::TransactionAborted)
    }
}
