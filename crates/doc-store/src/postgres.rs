use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::store::{validate_batch, DocumentStore, Expected, WriteBatch, WriteOp};
use crate::{Collection, DocStoreError, Document, DocumentId, Result, Version};

/// PostgreSQL-backed document store.
///
/// Every collection lives in one `documents` table keyed by
/// `(collection, id)`. A batch applies inside a single transaction, so
/// guard checks and writes are serialized against concurrent batches.
#[derive(Clone)]
pub struct PostgresDocumentStore {
    pool: PgPool,
}

impl PostgresDocumentStore {
    /// Creates a new PostgreSQL document store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_document(row: PgRow) -> Result<Document> {
        let collection: String = row.try_get("collection")?;
        let collection = Collection::parse(&collection).ok_or_else(|| {
            DocStoreError::InvalidBatch(format!("unknown collection in storage: {collection}"))
        })?;
        Ok(Document {
            collection,
            id: DocumentId::new(row.try_get::<String, _>("id")?),
            version: Version::new(row.try_get("version")?),
            updated_at: row.try_get("updated_at")?,
            body: row.try_get("body")?,
        })
    }
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    async fn get(&self, collection: Collection, id: &DocumentId) -> Result<Option<Document>> {
        let row = sqlx::query(
            "SELECT collection, id, version, updated_at, body FROM documents \
             WHERE collection = $1 AND id = $2",
        )
        .bind(collection.as_str())
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_document).transpose()
    }

    async fn find(
        &self,
        collection: Collection,
        field: &str,
        value: &serde_json::Value,
    ) -> Result<Vec<Document>> {
        let rows = sqlx::query(
            "SELECT collection, id, version, updated_at, body FROM documents \
             WHERE collection = $1 AND body -> $2 = $3 ORDER BY id",
        )
        .bind(collection.as_str())
        .bind(field)
        .bind(value)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_document).collect()
    }

    async fn list(&self, collection: Collection) -> Result<Vec<Document>> {
        let rows = sqlx::query(
            "SELECT collection, id, version, updated_at, body FROM documents \
             WHERE collection = $1 ORDER BY id",
        )
        .bind(collection.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_document).collect()
    }

    #[tracing::instrument(skip(self, batch), fields(ops = batch.len()))]
    async fn apply(&self, batch: WriteBatch) -> Result<()> {
        validate_batch(&batch)?;

        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        for op in batch.ops() {
            match op {
                WriteOp::Put {
                    collection,
                    id,
                    expected,
                    body,
                } => {
                    let affected = match expected {
                        Expected::New => {
                            sqlx::query(
                                "INSERT INTO documents (collection, id, version, updated_at, body) \
                                 VALUES ($1, $2, 1, $3, $4) \
                                 ON CONFLICT (collection, id) DO NOTHING",
                            )
                            .bind(collection.as_str())
                            .bind(id.as_str())
                            .bind(now)
                            .bind(body)
                            .execute(&mut *tx)
                            .await?
                            .rows_affected()
                        }
                        Expected::Version(v) => {
                            sqlx::query(
                                "UPDATE documents \
                                 SET version = version + 1, updated_at = $4, body = $5 \
                                 WHERE collection = $1 AND id = $2 AND version = $3",
                            )
                            .bind(collection.as_str())
                            .bind(id.as_str())
                            .bind(v.as_i64())
                            .bind(now)
                            .bind(body)
                            .execute(&mut *tx)
                            .await?
                            .rows_affected()
                        }
                        Expected::Any => {
                            sqlx::query(
                                "INSERT INTO documents (collection, id, version, updated_at, body) \
                                 VALUES ($1, $2, 1, $3, $4) \
                                 ON CONFLICT (collection, id) DO UPDATE \
                                 SET version = documents.version + 1, updated_at = $3, body = $4",
                            )
                            .bind(collection.as_str())
                            .bind(id.as_str())
                            .bind(now)
                            .bind(body)
                            .execute(&mut *tx)
                            .await?
                            .rows_affected()
                        }
                    };

                    if affected == 0 {
                        tx.rollback().await?;
                        return Err(conflict(&self.pool, *collection, id, *expected).await);
                    }
                }
                WriteOp::Delete {
                    collection,
                    id,
                    expected,
                } => {
                    let affected = match expected {
                        Expected::Version(v) => {
                            sqlx::query(
                                "DELETE FROM documents \
                                 WHERE collection = $1 AND id = $2 AND version = $3",
                            )
                            .bind(collection.as_str())
                            .bind(id.as_str())
                            .bind(v.as_i64())
                            .execute(&mut *tx)
                            .await?
                            .rows_affected()
                        }
                        Expected::Any | Expected::New => {
                            sqlx::query(
                                "DELETE FROM documents WHERE collection = $1 AND id = $2",
                            )
                            .bind(collection.as_str())
                            .bind(id.as_str())
                            .execute(&mut *tx)
                            .await?
                            .rows_affected()
                        }
                    };

                    // Deleting an absent document only fails a version guard.
                    if affected == 0 && matches!(expected, Expected::Version(_)) {
                        tx.rollback().await?;
                        return Err(conflict(&self.pool, *collection, id, *expected).await);
                    }
                }
            }
        }

        tx.commit().await?;
        Ok(())
    }
}

/// Builds a conflict error with the version currently in storage.
async fn conflict(
    pool: &PgPool,
    collection: Collection,
    id: &DocumentId,
    expected: Expected,
) -> DocStoreError {
    let actual: Option<i64> =
        sqlx::query_scalar("SELECT version FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection.as_str())
            .bind(id.as_str())
            .fetch_optional(pool)
            .await
            .ok()
            .flatten();

    DocStoreError::Conflict {
        collection,
        id: id.clone(),
        expected: match expected {
            Expected::Version(v) => Some(v),
            _ => None,
        },
        actual: actual.map(Version::new),
    }
}
