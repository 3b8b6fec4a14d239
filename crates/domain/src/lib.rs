//! Business records and aggregate logic for the commerce platform.
//!
//! Everything here is pure: records, invariants and state transitions,
//! with no store access. The checkout crate loads records, drives these
//! operations, and persists the results atomically.

pub mod address;
pub mod cart;
pub mod catalog;
pub mod coupon;
pub mod error;
pub mod order;
pub mod user;
pub mod variant;

pub use address::Address;
pub use cart::{Cart, CartItem};
pub use catalog::{Category, Company, DosageForm, Product};
pub use coupon::Coupon;
pub use error::{DomainError, Result};
pub use order::{Order, OrderItem, OrderStatus, PaymentIntent, PaymentMethod, ShippingAddress};
pub use user::{Role, User};
pub use variant::Variant;
