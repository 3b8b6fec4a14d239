use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The named collections the platform persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Users,
    Products,
    Variants,
    Companies,
    Categories,
    DosageForms,
    Carts,
    Orders,
    Coupons,
    Addresses,
    /// One marker document per payment-provider order id; the expect-absent
    /// guard on this collection is what makes webhook re-delivery a no-op.
    PaymentIntents,
}

impl Collection {
    /// Returns the collection name as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Products => "products",
            Collection::Variants => "variants",
            Collection::Companies => "companies",
            Collection::Categories => "categories",
            Collection::DosageForms => "dosage_forms",
            Collection::Carts => "carts",
            Collection::Orders => "orders",
            Collection::Coupons => "coupons",
            Collection::Addresses => "addresses",
            Collection::PaymentIntents => "payment_intents",
        }
    }

    /// Parses a stored collection name back into the enum.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "users" => Some(Collection::Users),
            "products" => Some(Collection::Products),
            "variants" => Some(Collection::Variants),
            "companies" => Some(Collection::Companies),
            "categories" => Some(Collection::Categories),
            "dosage_forms" => Some(Collection::DosageForms),
            "carts" => Some(Collection::Carts),
            "orders" => Some(Collection::Orders),
            "coupons" => Some(Collection::Coupons),
            "addresses" => Some(Collection::Addresses),
            "payment_intents" => Some(Collection::PaymentIntents),
            _ => None,
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Key of a document within its collection.
///
/// Most records are keyed by their UUID identity; payment-intent markers
/// are keyed by the provider's order identifier, so the key is a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    /// Creates a document id from any string-like key.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for DocumentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for DocumentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<Uuid> for DocumentId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid.to_string())
    }
}

/// Version number for a document, used for optimistic concurrency control.
///
/// A document is created at version 1; each committed write increments it
/// by 1. Guarding a write on the version the writer read turns the write
/// into a compare-and-swap.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    /// Creates a version from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the version of a freshly created document.
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns the next version.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw version value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Version {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Version> for i64 {
    fn from(version: Version) -> Self {
        version.0
    }
}

/// A stored document: its key, current version, body and last write time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub collection: Collection,
    pub id: DocumentId,
    pub version: Version,
    pub updated_at: DateTime<Utc>,
    pub body: serde_json::Value,
}
