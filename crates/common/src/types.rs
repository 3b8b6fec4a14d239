//! Typed UUID identifiers.
//!
//! Each record kind gets its own newtype to prevent mixing up, say, a
//! variant id with a product id in a pipeline signature. All of them wrap
//! a v4 UUID and share the same conversion surface.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! define_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random id.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an id from an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id!(
    /// Unique identifier for a user account.
    UserId
);
define_id!(
    /// Unique identifier for a product.
    ProductId
);
define_id!(
    /// Unique identifier for a purchasable variant (SKU) of a product.
    VariantId
);
define_id!(
    /// Unique identifier for a company (vendor).
    CompanyId
);
define_id!(
    /// Unique identifier for a product category.
    CategoryId
);
define_id!(
    /// Unique identifier for a dosage form.
    DosageFormId
);
define_id!(
    /// Unique identifier for a shopping cart.
    CartId
);
define_id!(
    /// Unique identifier for a single line item inside a cart.
    CartItemId
);
define_id!(
    /// Unique identifier for an order.
    OrderId
);
define_id!(
    /// Unique identifier for a coupon.
    CouponId
);
define_id!(
    /// Unique identifier for a user address-book entry.
    AddressId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        assert_ne!(CartId::new(), CartId::new());
        assert_ne!(VariantId::new(), VariantId::new());
    }

    #[test]
    fn id_from_uuid_preserves_value() {
        let uuid = Uuid::new_v4();
        let id = OrderId::from_uuid(uuid);
        assert_eq!(id.as_uuid(), uuid);
    }

    #[test]
    fn id_serialization_roundtrip() {
        let id = ProductId::new();
        let json = serde_json::to_string(&id).unwrap();
        let deserialized: ProductId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, deserialized);
    }

    #[test]
    fn id_serializes_as_bare_uuid_string() {
        let uuid = Uuid::new_v4();
        let id = UserId::from_uuid(uuid);
        let json = serde_json::to_value(id).unwrap();
        assert_eq!(json, serde_json::Value::String(uuid.to_string()));
    }
}
