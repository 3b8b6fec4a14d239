//! Shared types for the commerce platform.

pub mod money;
pub mod types;

pub use money::Money;
pub use types::{
    AddressId, CartId, CartItemId, CategoryId, CompanyId, CouponId, DosageFormId, OrderId,
    ProductId, UserId, VariantId,
};
