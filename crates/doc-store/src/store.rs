use std::collections::HashSet;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::{Collection, DocStoreError, Document, DocumentId, Result, Version};

/// Guard attached to a single write within a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expected {
    /// No guard; the write always applies (creation or overwrite).
    Any,
    /// The document must not exist yet.
    New,
    /// The document must currently be at exactly this version.
    Version(Version),
}

/// One write within a batch.
#[derive(Debug, Clone)]
pub enum WriteOp {
    Put {
        collection: Collection,
        id: DocumentId,
        expected: Expected,
        body: serde_json::Value,
    },
    Delete {
        collection: Collection,
        id: DocumentId,
        expected: Expected,
    },
}

impl WriteOp {
    fn target(&self) -> (Collection, &DocumentId) {
        match self {
            WriteOp::Put { collection, id, .. } | WriteOp::Delete { collection, id, .. } => {
                (*collection, id)
            }
        }
    }
}

/// An atomic mutation set.
///
/// A batch is the unit of work of the platform: one checkout, one
/// cancellation, one cart save. Applying it either lands every write with
/// every guard satisfied, or changes nothing.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    /// Creates an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a raw put to the batch.
    pub fn put_raw(
        &mut self,
        collection: Collection,
        id: DocumentId,
        expected: Expected,
        body: serde_json::Value,
    ) {
        self.ops.push(WriteOp::Put {
            collection,
            id,
            expected,
            body,
        });
    }

    /// Adds a typed record put to the batch.
    pub fn put<R: Record>(&mut self, record: &R, expected: Expected) -> Result<()> {
        let body = serde_json::to_value(record)?;
        self.put_raw(R::COLLECTION, record.document_id(), expected, body);
        Ok(())
    }

    /// Adds a delete to the batch.
    pub fn delete(&mut self, collection: Collection, id: DocumentId, expected: Expected) {
        self.ops.push(WriteOp::Delete {
            collection,
            id,
            expected,
        });
    }

    /// Returns the writes in insertion order.
    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }
}

/// Validates a batch before applying it.
///
/// A batch must be non-empty and must not touch the same document twice:
/// guards are evaluated against pre-batch state, so a double write would
/// have ambiguous semantics.
pub fn validate_batch(batch: &WriteBatch) -> Result<()> {
    if batch.is_empty() {
        return Err(DocStoreError::InvalidBatch(
            "cannot apply an empty write batch".to_string(),
        ));
    }

    let mut seen: HashSet<(Collection, &DocumentId)> = HashSet::new();
    for op in batch.ops() {
        if !seen.insert(op.target()) {
            let (collection, id) = op.target();
            return Err(DocStoreError::InvalidBatch(format!(
                "batch writes {collection}/{id} more than once"
            )));
        }
    }

    Ok(())
}

/// Core trait for document store implementations.
///
/// All implementations must be thread-safe (Send + Sync) and must apply
/// batches atomically with respect to concurrent `apply` calls.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetches a single document, or None if absent.
    async fn get(&self, collection: Collection, id: &DocumentId) -> Result<Option<Document>>;

    /// Finds documents whose body has `field` equal to `value`.
    ///
    /// Matching is on the top-level field only; both stores compare the
    /// JSON values directly, so callers filter on id-like string fields.
    async fn find(
        &self,
        collection: Collection,
        field: &str,
        value: &serde_json::Value,
    ) -> Result<Vec<Document>>;

    /// Lists every document in a collection.
    async fn list(&self, collection: Collection) -> Result<Vec<Document>>;

    /// Applies a write batch atomically.
    ///
    /// Every guard is checked against the state visible at application
    /// time; if any guard fails the whole batch is discarded and a
    /// `Conflict` is returned.
    async fn apply(&self, batch: WriteBatch) -> Result<()>;
}

/// A typed record persisted as a document.
pub trait Record: Serialize + DeserializeOwned {
    /// The collection this record lives in.
    const COLLECTION: Collection;

    /// The document key for this record.
    fn document_id(&self) -> DocumentId;
}

/// A decoded record together with the version it was read at.
///
/// Carrying the version lets a writer turn its later save into a
/// compare-and-swap on exactly the state it based its decision on.
#[derive(Debug, Clone)]
pub struct Stored<R> {
    pub record: R,
    pub version: Version,
}

impl<R> Stored<R> {
    /// The guard matching the version this record was read at.
    pub fn guard(&self) -> Expected {
        Expected::Version(self.version)
    }
}

fn decode<R: Record>(doc: Document) -> Result<Stored<R>> {
    let record: R = serde_json::from_value(doc.body)?;
    Ok(Stored {
        record,
        version: doc.version,
    })
}

/// Extension trait providing typed convenience methods for document stores.
#[async_trait]
pub trait DocumentStoreExt: DocumentStore {
    /// Fetches and decodes a record by key.
    async fn get_record<R: Record + Send>(
        &self,
        id: impl Into<DocumentId> + Send,
    ) -> Result<Option<Stored<R>>> {
        match self.get(R::COLLECTION, &id.into()).await? {
            Some(doc) => Ok(Some(decode(doc)?)),
            None => Ok(None),
        }
    }

    /// Finds and decodes records by top-level field equality.
    async fn find_records<R: Record + Send>(
        &self,
        field: &str,
        value: &serde_json::Value,
    ) -> Result<Vec<Stored<R>>> {
        self.find(R::COLLECTION, field, value)
            .await?
            .into_iter()
            .map(decode)
            .collect()
    }

    /// Lists and decodes a whole collection.
    async fn list_records<R: Record + Send>(&self) -> Result<Vec<Stored<R>>> {
        self.list(R::COLLECTION)
            .await?
            .into_iter()
            .map(decode)
            .collect()
    }

    /// Applies a single-write batch creating or replacing one record.
    async fn put_record<R: Record + Sync>(&self, record: &R, expected: Expected) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.put(record, expected)?;
        self.apply(batch).await
    }
}

// Blanket implementation for all DocumentStore implementations
impl<T: DocumentStore + ?Sized> DocumentStoreExt for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_batch_is_invalid() {
        let batch = WriteBatch::new();
        assert!(matches!(
            validate_batch(&batch),
            Err(DocStoreError::InvalidBatch(_))
        ));
    }

    #[test]
    fn double_write_is_invalid() {
        let mut batch = WriteBatch::new();
        let id = DocumentId::new("a");
        batch.put_raw(
            Collection::Carts,
            id.clone(),
            Expected::Any,
            serde_json::json!({}),
        );
        batch.delete(Collection::Carts, id, Expected::Any);
        assert!(matches!(
            validate_batch(&batch),
            Err(DocStoreError::InvalidBatch(_))
        ));
    }

    #[test]
    fn same_id_in_different_collections_is_fine() {
        let mut batch = WriteBatch::new();
        let id = DocumentId::new("a");
        batch.put_raw(
            Collection::Carts,
            id.clone(),
            Expected::Any,
            serde_json::json!({}),
        );
        batch.put_raw(Collection::Orders, id, Expected::Any, serde_json::json!({}));
        assert!(validate_batch(&batch).is_ok());
    }
}
