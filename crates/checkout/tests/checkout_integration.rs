//! End-to-end pipeline tests against the in-memory store.

use std::collections::BTreeSet;

use chrono::{Duration, Utc};
use checkout::{
    CancellationPipeline, CartOwner, CartService, CheckoutError, CheckoutPipeline,
    CounterSynchronizer, CouponService, PaymentConfirmation,
};
use common::{
    AddressId, CategoryId, CompanyId, CouponId, Money, ProductId, UserId, VariantId,
};
use doc_store::{DocumentId, DocumentStoreExt, Expected, InMemoryDocumentStore};
use domain::{
    Address, Category, Company, Coupon, DomainError, OrderStatus, Product, Role, User, Variant,
};

const TTL_DAYS: i64 = 15;

struct Fixture {
    store: InMemoryDocumentStore,
    user: UserId,
    address: AddressId,
    company: CompanyId,
}

impl Fixture {
    async fn new() -> Self {
        let store = InMemoryDocumentStore::new();
        let company = CompanyId::new();
        store
            .put_record(
                &Company {
                    id: company,
                    name: "Pharma Co".to_string(),
                    products_count: 0,
                    orders_count: 0,
                },
                Expected::New,
            )
            .await
            .unwrap();
        let user = seed_user(&store, Role::Customer).await;
        let address = seed_address(&store, user).await;
        Self {
            store,
            user,
            address,
            company,
        }
    }

    async fn seed_variant(&self, price: i64, quantity: i64, sold: i64) -> Variant {
        let variant = Variant {
            id: VariantId::new(),
            product: ProductId::new(),
            company: self.company,
            name: "500mg / 20 tablets".to_string(),
            price: Money::from_cents(price),
            price_after_discount: None,
            quantity,
            sold,
        };
        self.store.put_record(&variant, Expected::New).await.unwrap();
        variant
    }

    fn carts(&self) -> CartService<InMemoryDocumentStore> {
        CartService::new(self.store.clone(), TTL_DAYS)
    }

    fn pipeline(&self) -> CheckoutPipeline<InMemoryDocumentStore> {
        CheckoutPipeline::new(self.store.clone(), Money::zero(), TTL_DAYS)
    }

    async fn variant(&self, id: VariantId) -> Variant {
        self.store
            .get_record::<Variant>(DocumentId::from(id.as_uuid()))
            .await
            .unwrap()
            .unwrap()
            .record
    }

    async fn company_record(&self) -> Company {
        self.store
            .get_record::<Company>(DocumentId::from(self.company.as_uuid()))
            .await
            .unwrap()
            .unwrap()
            .record
    }

    async fn user_record(&self, id: UserId) -> User {
        self.store
            .get_record::<User>(DocumentId::from(id.as_uuid()))
            .await
            .unwrap()
            .unwrap()
            .record
    }
}

async fn seed_user(store: &InMemoryDocumentStore, role: Role) -> UserId {
    let user = User {
        id: UserId::new(),
        name: "Nour".to_string(),
        email: "nour@example.com".to_string(),
        role,
        orders_count: 0,
        purchased_products: BTreeSet::new(),
    };
    store.put_record(&user, Expected::New).await.unwrap();
    user.id
}

async fn seed_address(store: &InMemoryDocumentStore, user: UserId) -> AddressId {
    let address = Address {
        id: AddressId::new(),
        user,
        first_name: "Nour".to_string(),
        last_name: "Hassan".to_string(),
        street: "12 Tahrir St".to_string(),
        building: "4B".to_string(),
        phone: "+20100000000".to_string(),
        city: "Cairo".to_string(),
    };
    store.put_record(&address, Expected::New).await.unwrap();
    address.id
}

#[tokio::test]
async fn commit_then_cancel_restores_stock_and_counters() {
    let fx = Fixture::new().await;
    let variant = fx.seed_variant(1_000, 5, 10).await;

    let carts = fx.carts();
    carts
        .add_item(CartOwner::User(fx.user), variant.id, 5)
        .await
        .unwrap();

    let order = fx
        .pipeline()
        .commit_cash_on_delivery(fx.user, fx.address)
        .await
        .unwrap();

    let after_commit = fx.variant(variant.id).await;
    assert_eq!(after_commit.quantity, 0);
    assert_eq!(after_commit.sold, 15);
    assert_eq!(fx.company_record().await.orders_count, 1);
    let buyer = fx.user_record(fx.user).await;
    assert_eq!(buyer.orders_count, 1);
    assert!(buyer.purchased_products.contains(&variant.product));
    assert!(
        carts.get_cart(CartOwner::User(fx.user)).await.unwrap().is_none(),
        "cart is consumed by the commit"
    );

    let cancelled = CancellationPipeline::new(fx.store.clone())
        .cancel(order.id, fx.user)
        .await
        .unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);

    let after_cancel = fx.variant(variant.id).await;
    assert_eq!(after_cancel.quantity, 5);
    assert_eq!(after_cancel.sold, 10);
    assert_eq!(fx.company_record().await.orders_count, 0);
    let buyer = fx.user_record(fx.user).await;
    assert_eq!(buyer.orders_count, 0);
    assert!(buyer.purchased_products.is_empty());
}

#[tokio::test]
async fn concurrent_commits_cannot_oversell() {
    let fx = Fixture::new().await;
    let variant = fx.seed_variant(1_000, 5, 0).await;

    let other_user = seed_user(&fx.store, Role::Customer).await;
    let other_address = seed_address(&fx.store, other_user).await;

    let carts = fx.carts();
    carts
        .add_item(CartOwner::User(fx.user), variant.id, 3)
        .await
        .unwrap();
    carts
        .add_item(CartOwner::User(other_user), variant.id, 3)
        .await
        .unwrap();

    let first = fx.pipeline();
    let second = fx.pipeline();
    let (a, b) = tokio::join!(
        first.commit_cash_on_delivery(fx.user, fx.address),
        second.commit_cash_on_delivery(other_user, other_address),
    );

    let successes = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(successes, 1, "exactly one checkout wins the last stock");
    let loser = if a.is_ok() { b } else { a };
    assert!(matches!(
        loser,
        Err(CheckoutError::Domain(DomainError::InsufficientStock { .. }))
    ));

    let after = fx.variant(variant.id).await;
    assert_eq!(after.quantity, 2);
    assert_eq!(after.sold, 3);
}

#[tokio::test]
async fn failed_commit_writes_nothing() {
    let fx = Fixture::new().await;
    let plenty = fx.seed_variant(1_000, 10, 0).await;
    let scarce = fx.seed_variant(500, 2, 0).await;

    let carts = fx.carts();
    carts
        .add_item(CartOwner::User(fx.user), plenty.id, 2)
        .await
        .unwrap();
    carts
        .add_item(CartOwner::User(fx.user), scarce.id, 2)
        .await
        .unwrap();

    // Someone else takes the scarce stock before the checkout.
    let mut taken = fx.variant(scarce.id).await;
    let stored = fx
        .store
        .get_record::<Variant>(DocumentId::from(scarce.id.as_uuid()))
        .await
        .unwrap()
        .unwrap();
    taken.quantity = 1;
    fx.store.put_record(&taken, stored.guard()).await.unwrap();

    let err = fx
        .pipeline()
        .commit_cash_on_delivery(fx.user, fx.address)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CheckoutError::Domain(DomainError::InsufficientStock { .. })
    ));

    // Nothing moved: the first variant kept its stock, the cart survived
    // and no counters were bumped.
    assert_eq!(fx.variant(plenty.id).await.quantity, 10);
    assert!(carts.get_cart(CartOwner::User(fx.user)).await.unwrap().is_some());
    assert_eq!(fx.company_record().await.orders_count, 0);
    assert_eq!(fx.user_record(fx.user).await.orders_count, 0);
}

fn confirmation(provider_order_id: &str, amount_cents: i64) -> PaymentConfirmation {
    PaymentConfirmation {
        provider_order_id: provider_order_id.to_string(),
        amount_cents,
    }
}

#[tokio::test]
async fn duplicate_webhook_delivery_is_a_noop() {
    let fx = Fixture::new().await;
    let variant = fx.seed_variant(1_000, 5, 0).await;
    fx.carts()
        .add_item(CartOwner::User(fx.user), variant.id, 5)
        .await
        .unwrap();

    let pipeline = fx.pipeline();
    pipeline
        .begin_online_payment(fx.user, fx.address, "77001".to_string())
        .await
        .unwrap();
    let first = pipeline
        .commit_online(confirmation("77001", 5_000))
        .await
        .unwrap();
    let second = pipeline
        .commit_online(confirmation("77001", 5_000))
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    assert!(first.paid);
    let after = fx.variant(variant.id).await;
    assert_eq!(after.quantity, 0, "stock reserved exactly once");
    assert_eq!(fx.user_record(fx.user).await.orders_count, 1);
}

#[tokio::test]
async fn webhook_identity_comes_from_the_recorded_intention() {
    let fx = Fixture::new().await;
    let variant = fx.seed_variant(1_000, 5, 0).await;
    fx.carts()
        .add_item(CartOwner::User(fx.user), variant.id, 2)
        .await
        .unwrap();

    let pipeline = fx.pipeline();

    // No intention recorded for this provider order id, so a signed
    // confirmation alone buys nothing.
    let err = pipeline
        .commit_online(confirmation("90000", 2_000))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CheckoutError::Domain(DomainError::NotFound {
            kind: "payment intention",
            ..
        })
    ));

    let intent = pipeline
        .begin_online_payment(fx.user, fx.address, "90001".to_string())
        .await
        .unwrap();
    assert_eq!(intent.amount_cents, 2_000);

    let order = pipeline
        .commit_online(confirmation("90001", 2_000))
        .await
        .unwrap();
    assert_eq!(order.user, fx.user);
    assert_eq!(fx.user_record(fx.user).await.orders_count, 1);
}

#[tokio::test]
async fn webhook_amount_must_match_the_intention() {
    let fx = Fixture::new().await;
    let variant = fx.seed_variant(1_000, 5, 0).await;
    let carts = fx.carts();
    carts
        .add_item(CartOwner::User(fx.user), variant.id, 5)
        .await
        .unwrap();

    let pipeline = fx.pipeline();
    pipeline
        .begin_online_payment(fx.user, fx.address, "77002".to_string())
        .await
        .unwrap();

    let err = pipeline
        .commit_online(confirmation("77002", 1))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CheckoutError::AmountMismatch {
            expected: 5_000,
            actual: 1
        }
    ));

    // Nothing moved: stock and cart are untouched and the intention is
    // still open for the real confirmation.
    assert_eq!(fx.variant(variant.id).await.quantity, 5);
    assert!(carts.get_cart(CartOwner::User(fx.user)).await.unwrap().is_some());
    pipeline
        .commit_online(confirmation("77002", 5_000))
        .await
        .unwrap();
}

#[tokio::test]
async fn merge_folds_guest_lines_into_the_user_cart() {
    let fx = Fixture::new().await;
    let variant = fx.seed_variant(1_000, 10, 0).await;
    let carts = fx.carts();

    carts
        .add_item(CartOwner::User(fx.user), variant.id, 2)
        .await
        .unwrap();
    let guest = carts
        .add_item(CartOwner::Anonymous(None), variant.id, 3)
        .await
        .unwrap();

    let merged = carts.merge(guest.id, fx.user).await.unwrap().unwrap();
    assert_eq!(merged.items.len(), 1);
    assert_eq!(merged.items[0].amount, 5);
    assert_eq!(merged.total_price, Money::from_cents(5_000));
    assert!(
        carts
            .get_cart(CartOwner::Anonymous(Some(guest.id)))
            .await
            .unwrap()
            .is_none(),
        "guest cart is consumed"
    );

    // Merging again with the same (now gone) guest id changes nothing.
    let again = carts.merge(guest.id, fx.user).await.unwrap().unwrap();
    assert_eq!(again.items[0].amount, 5);
}

#[tokio::test]
async fn merge_rehomes_the_guest_cart_when_the_user_has_none() {
    let fx = Fixture::new().await;
    let variant = fx.seed_variant(1_000, 10, 0).await;
    let carts = fx.carts();

    let guest = carts
        .add_item(CartOwner::Anonymous(None), variant.id, 2)
        .await
        .unwrap();
    let merged = carts.merge(guest.id, fx.user).await.unwrap().unwrap();

    assert_eq!(merged.id, guest.id);
    assert_eq!(merged.user, Some(fx.user));
    let mine = carts.get_cart(CartOwner::User(fx.user)).await.unwrap().unwrap();
    assert_eq!(mine.id, guest.id);
}

#[tokio::test]
async fn coupon_survives_the_commit_as_a_backreference() {
    let fx = Fixture::new().await;
    let variant = fx.seed_variant(1_000, 10, 0).await;
    let coupon = Coupon {
        id: CouponId::new(),
        company: fx.company,
        code: "SPRING20".to_string(),
        sale: 20,
        expires_at: Utc::now() + Duration::days(7),
        orders: Vec::new(),
    };
    fx.store.put_record(&coupon, Expected::New).await.unwrap();

    let carts = fx.carts();
    carts
        .add_item(CartOwner::User(fx.user), variant.id, 2)
        .await
        .unwrap();
    let coupons = CouponService::new(fx.store.clone(), TTL_DAYS);
    let cart = coupons
        .apply(CartOwner::User(fx.user), "SPRING20")
        .await
        .unwrap();
    assert_eq!(cart.total_after_coupons, Some(Money::from_cents(1_600)));

    let order = fx
        .pipeline()
        .commit_cash_on_delivery(fx.user, fx.address)
        .await
        .unwrap();
    assert_eq!(order.subtotal, Money::from_cents(1_600));
    assert_eq!(order.coupons, vec![coupon.id]);

    let stored = fx
        .store
        .get_record::<Coupon>(DocumentId::from(coupon.id.as_uuid()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.record.orders, vec![order.id]);
}

#[tokio::test]
async fn unknown_coupon_code_is_not_found() {
    let fx = Fixture::new().await;
    let variant = fx.seed_variant(1_000, 10, 0).await;
    fx.carts()
        .add_item(CartOwner::User(fx.user), variant.id, 1)
        .await
        .unwrap();

    let coupons = CouponService::new(fx.store.clone(), TTL_DAYS);
    let err = coupons
        .apply(CartOwner::User(fx.user), "NOPE")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CheckoutError::Domain(DomainError::NotFound { kind: "coupon", .. })
    ));
}

#[tokio::test]
async fn cancellation_authorization_is_uniform_for_non_admins() {
    let fx = Fixture::new().await;
    let variant = fx.seed_variant(1_000, 5, 0).await;
    fx.carts()
        .add_item(CartOwner::User(fx.user), variant.id, 1)
        .await
        .unwrap();
    let order = fx
        .pipeline()
        .commit_cash_on_delivery(fx.user, fx.address)
        .await
        .unwrap();

    let stranger = seed_user(&fx.store, Role::Customer).await;
    let pipeline = CancellationPipeline::new(fx.store.clone());

    // Someone else's order and a nonexistent order look identical.
    let foreign = pipeline.cancel(order.id, stranger).await.unwrap_err();
    let missing = pipeline
        .cancel(common::OrderId::new(), stranger)
        .await
        .unwrap_err();
    assert!(matches!(
        foreign,
        CheckoutError::Domain(DomainError::Unauthorized)
    ));
    assert!(matches!(
        missing,
        CheckoutError::Domain(DomainError::Unauthorized)
    ));

    // An admin gets the real answer for a missing order.
    let admin = seed_user(&fx.store, Role::Admin).await;
    let err = pipeline
        .cancel(common::OrderId::new(), admin)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CheckoutError::Domain(DomainError::NotFound { kind: "order", .. })
    ));

    // And an admin may cancel on the buyer's behalf.
    pipeline.cancel(order.id, admin).await.unwrap();
}

#[tokio::test]
async fn cancelling_twice_is_an_invalid_transition() {
    let fx = Fixture::new().await;
    let variant = fx.seed_variant(1_000, 5, 0).await;
    fx.carts()
        .add_item(CartOwner::User(fx.user), variant.id, 1)
        .await
        .unwrap();
    let order = fx
        .pipeline()
        .commit_cash_on_delivery(fx.user, fx.address)
        .await
        .unwrap();

    let pipeline = CancellationPipeline::new(fx.store.clone());
    pipeline.cancel(order.id, fx.user).await.unwrap();
    let err = pipeline.cancel(order.id, fx.user).await.unwrap_err();
    assert!(matches!(
        err,
        CheckoutError::Domain(DomainError::InvalidTransition { .. })
    ));

    // The second attempt released nothing.
    assert_eq!(fx.variant(variant.id).await.quantity, 5);
}

#[tokio::test]
async fn expired_cart_is_gone_at_resolution() {
    let fx = Fixture::new().await;
    let variant = fx.seed_variant(1_000, 5, 0).await;

    let carts = CartService::new(fx.store.clone(), 0);
    carts
        .add_item(CartOwner::User(fx.user), variant.id, 1)
        .await
        .unwrap();

    // TTL of zero days expires the cart immediately.
    assert!(carts.get_cart(CartOwner::User(fx.user)).await.unwrap().is_none());
    let err = fx
        .pipeline()
        .commit_cash_on_delivery(fx.user, fx.address)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CheckoutError::Domain(DomainError::NotFound { kind: "cart", .. })
    ));
}

#[tokio::test]
async fn synchronizer_recomputes_product_counters() {
    let fx = Fixture::new().await;
    let category = Category {
        id: CategoryId::new(),
        name: "Painkillers".to_string(),
        products_count: 99,
    };
    fx.store.put_record(&category, Expected::New).await.unwrap();

    for _ in 0..3 {
        let product = Product {
            id: ProductId::new(),
            name: "Ibuprofen".to_string(),
            company: fx.company,
            categories: vec![category.id],
            dosage_form: None,
            variants: Vec::new(),
        };
        fx.store.put_record(&product, Expected::New).await.unwrap();
    }

    let sync = CounterSynchronizer::new(fx.store.clone());
    sync.sync_product_counts().await.unwrap();

    assert_eq!(fx.company_record().await.products_count, 3);
    let stored = fx
        .store
        .get_record::<Category>(DocumentId::from(category.id.as_uuid()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.record.products_count, 3);

    // Running it again finds nothing to change.
    sync.sync_product_counts().await.unwrap();
    assert_eq!(fx.company_record().await.products_count, 3);
}
