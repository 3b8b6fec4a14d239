use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::store::{validate_batch, DocumentStore, Expected, WriteBatch, WriteOp};
use crate::{Collection, DocStoreError, Document, DocumentId, Result, Version};

#[derive(Debug, Clone)]
struct Row {
    version: Version,
    updated_at: chrono::DateTime<Utc>,
    body: serde_json::Value,
}

type Shelf = HashMap<Collection, HashMap<DocumentId, Row>>;

/// In-memory document store for tests and local development.
///
/// Holds every collection behind one RwLock so a batch is checked and
/// applied while no other writer can interleave.
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    inner: Arc<RwLock<Shelf>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn row_to_document(collection: Collection, id: &DocumentId, row: &Row) -> Document {
    Document {
        collection,
        id: id.clone(),
        version: row.version,
        updated_at: row.updated_at,
        body: row.body.clone(),
    }
}

fn check_guard(
    collection: Collection,
    id: &DocumentId,
    expected: Expected,
    current: Option<&Row>,
) -> Result<()> {
    match (expected, current) {
        (Expected::Any, _) => Ok(()),
        (Expected::New, None) => Ok(()),
        (Expected::New, Some(row)) => Err(DocStoreError::Conflict {
            collection,
            id: id.clone(),
            expected: None,
            actual: Some(row.version),
        }),
        (Expected::Version(v), Some(row)) if row.version == v => Ok(()),
        (Expected::Version(v), current) => Err(DocStoreError::Conflict {
            collection,
            id: id.clone(),
            expected: Some(v),
            actual: current.map(|row| row.version),
        }),
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, collection: Collection, id: &DocumentId) -> Result<Option<Document>> {
        let shelf = self.inner.read().await;
        Ok(shelf
            .get(&collection)
            .and_then(|docs| docs.get(id))
            .map(|row| row_to_document(collection, id, row)))
    }

    async fn find(
        &self,
        collection: Collection,
        field: &str,
        value: &serde_json::Value,
    ) -> Result<Vec<Document>> {
        let shelf = self.inner.read().await;
        let mut out = Vec::new();
        if let Some(docs) = shelf.get(&collection) {
            for (id, row) in docs {
                if row.body.get(field) == Some(value) {
                    out.push(row_to_document(collection, id, row));
                }
            }
        }
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }

    async fn list(&self, collection: Collection) -> Result<Vec<Document>> {
        let shelf = self.inner.read().await;
        let mut out: Vec<Document> = shelf
            .get(&collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, row)| row_to_document(collection, id, row))
                    .collect()
            })
            .unwrap_or_default();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }

    #[tracing::instrument(skip(self, batch), fields(ops = batch.len()))]
    async fn apply(&self, batch: WriteBatch) -> Result<()> {
        validate_batch(&batch)?;

        let mut shelf = self.inner.write().await;

        // Check every guard before mutating anything.
        for op in batch.ops() {
            match op {
                WriteOp::Put {
                    collection,
                    id,
                    expected,
                    ..
                }
                | WriteOp::Delete {
                    collection,
                    id,
                    expected,
                } => {
                    let current = shelf.get(collection).and_then(|docs| docs.get(id));
                    check_guard(*collection, id, *expected, current)?;
                }
            }
        }

        let now = Utc::now();
        for op in batch.ops() {
            match op {
                WriteOp::Put {
                    collection,
                    id,
                    body,
                    ..
                } => {
                    let docs = shelf.entry(*collection).or_default();
                    let version = docs
                        .get(id)
                        .map(|row| row.version.next())
                        .unwrap_or_else(Version::first);
                    docs.insert(
                        id.clone(),
                        Row {
                            version,
                            updated_at: now,
                            body: body.clone(),
                        },
                    );
                }
                WriteOp::Delete { collection, id, .. } => {
                    if let Some(docs) = shelf.get_mut(collection) {
                        docs.remove(id);
                    }
                }
            }
        }

        Ok(())
    }
}
