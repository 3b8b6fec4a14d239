//! Per-user address book.

use common::{AddressId, UserId};
use doc_store::{Collection, DocumentId, Record};
use serde::{Deserialize, Serialize};

use crate::order::ShippingAddress;

/// A saved delivery address. Checkout resolves one of these into the
/// order's embedded [`ShippingAddress`] snapshot; the fields themselves are
/// not validated here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub id: AddressId,
    pub user: UserId,
    pub first_name: String,
    pub last_name: String,
    pub street: String,
    pub building: String,
    pub phone: String,
    pub city: String,
}

impl Address {
    /// Copies the delivery fields into an order snapshot.
    pub fn snapshot(&self) -> ShippingAddress {
        ShippingAddress {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            street: self.street.clone(),
            building: self.building.clone(),
            phone: self.phone.clone(),
            city: self.city.clone(),
        }
    }
}

impl Record for Address {
    const COLLECTION: Collection = Collection::Addresses;

    fn document_id(&self) -> DocumentId {
        self.id.as_uuid().into()
    }
}
