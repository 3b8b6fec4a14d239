//! Versioned document store for the commerce platform.
//!
//! Records are stored as JSON documents grouped into collections. Every
//! document carries a version used for optimistic concurrency: writers
//! describe a whole mutation set as a [`WriteBatch`] whose entries each
//! carry an [`Expected`] guard, and [`DocumentStore::apply`] commits the
//! batch atomically: either every guard holds and every write lands, or
//! nothing is changed and the caller gets a [`DocStoreError::Conflict`].
//!
//! Two implementations share the contract: [`InMemoryDocumentStore`] for
//! tests and single-process runs, and [`PostgresDocumentStore`] backed by
//! a single JSONB table.

pub mod document;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use document::{Collection, Document, DocumentId, Version};
pub use error::{DocStoreError, Result};
pub use memory::InMemoryDocumentStore;
pub use postgres::PostgresDocumentStore;
pub use store::{DocumentStore, DocumentStoreExt, Expected, Record, Stored, WriteBatch};
