//! SQLite-backed [`VectorStore`] implementation.
//!
//! One row per document. The embedding is stored as a little-endian `f32`
//! BLOB next to its dimension count; similarity queries load every vector
//! and score it with brute-force cosine similarity.
//!
//! Writes go through a per-store lock, so at most one write transaction is
//! open at a time. Reads never take the lock.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tokio::sync::Mutex;

use semdex_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use semdex_core::error::StoreError;
use semdex_core::models::{Document, ScoredDocument};
use semdex_core::store::VectorStore;

/// SQLite implementation of the [`VectorStore`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
    write_lock: Mutex<()>,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            write_lock: Mutex::new(()),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

const SELECT_COLUMNS: &str = "id, filename, locator, content_preview, embedding, dims, \
     category, project, team, tags_json, size, modified_at, created_at";

fn ts_from_millis(id: &str, column: &str, ms: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_millis(ms).ok_or_else(|| StoreError::Corrupt {
        id: id.to_string(),
        reason: format!("{} out of range: {}", column, ms),
    })
}

fn row_to_document(row: &SqliteRow) -> Result<Document, StoreError> {
    let id: String = row.try_get("id").map_err(StoreError::backend)?;
    let blob: Vec<u8> = row.try_get("embedding").map_err(StoreError::backend)?;
    let dims: i64 = row.try_get("dims").map_err(StoreError::backend)?;
    let tags_json: String = row.try_get("tags_json").map_err(StoreError::backend)?;
    let size: i64 = row.try_get("size").map_err(StoreError::backend)?;
    let modified_at: i64 = row.try_get("modified_at").map_err(StoreError::backend)?;
    let created_at: i64 = row.try_get("created_at").map_err(StoreError::backend)?;

    let embedding = blob_to_vec(&blob);
    if embedding.len() as i64 != dims {
        return Err(StoreError::Corrupt {
            id,
            reason: format!("embedding has {} values, dims column says {}", embedding.len(), dims),
        });
    }

    let tags: BTreeSet<String> =
        serde_json::from_str(&tags_json).map_err(|e| StoreError::Corrupt {
            id: id.clone(),
            reason: format!("tags_json: {}", e),
        })?;

    Ok(Document {
        filename: row.try_get("filename").map_err(StoreError::backend)?,
        source_locator: row.try_get("locator").map_err(StoreError::backend)?,
        content_preview: row.try_get("content_preview").map_err(StoreError::backend)?,
        embedding,
        category: row.try_get("category").map_err(StoreError::backend)?,
        project: row.try_get("project").map_err(StoreError::backend)?,
        team: row.try_get("team").map_err(StoreError::backend)?,
        tags,
        size: size.max(0) as u64,
        modified_at: ts_from_millis(&id, "modified_at", modified_at)?,
        created_at: ts_from_millis(&id, "created_at", created_at)?,
        id,
    })
}

#[async_trait]
impl VectorStore for SqliteStore {
    async fn upsert(&self, doc: &Document) -> Result<(), StoreError> {
        // A deferred transaction that reads before writing fails with
        // SQLITE_BUSY_SNAPSHOT if another connection commits in between.
        let _writer = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await.map_err(StoreError::backend)?;

        let existing_dims: Option<i64> =
            sqlx::query_scalar("SELECT dims FROM documents WHERE id != ? LIMIT 1")
                .bind(&doc.id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(StoreError::backend)?;

        if let Some(expected) = existing_dims {
            if expected as usize != doc.dims() {
                return Err(StoreError::DimensionMismatch {
                    expected: expected as usize,
                    actual: doc.dims(),
                });
            }
        }

        let tags_json = serde_json::to_string(&doc.tags).map_err(StoreError::backend)?;

        sqlx::query(
            r#"
            INSERT INTO documents (id, filename, locator, content_preview, embedding, dims,
                                   category, project, team, tags_json, size,
                                   modified_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                filename = excluded.filename,
                locator = excluded.locator,
                content_preview = excluded.content_preview,
                embedding = excluded.embedding,
                dims = excluded.dims,
                category = excluded.category,
                project = excluded.project,
                team = excluded.team,
                tags_json = excluded.tags_json,
                size = excluded.size,
                modified_at = excluded.modified_at
            "#,
        )
        .bind(&doc.id)
        .bind(&doc.filename)
        .bind(&doc.source_locator)
        .bind(&doc.content_preview)
        .bind(vec_to_blob(&doc.embedding))
        .bind(doc.dims() as i64)
        .bind(&doc.category)
        .bind(&doc.project)
        .bind(&doc.team)
        .bind(&tags_json)
        .bind(doc.size as i64)
        .bind(doc.modified_at.timestamp_millis())
        .bind(doc.created_at.timestamp_millis())
        .execute(&mut *tx)
        .await
        .map_err(StoreError::backend)?;

        tx.commit().await.map_err(StoreError::backend)?;
        Ok(())
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<ScoredDocument>, StoreError> {
        let rows = sqlx::query(&format!("SELECT {} FROM documents", SELECT_COLUMNS))
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::backend)?;

        let mut scored = Vec::with_capacity(rows.len());
        for row in &rows {
            let document = row_to_document(row)?;
            scored.push(ScoredDocument {
                similarity: cosine_similarity(vector, &document.embedding),
                document,
            });
        }

        scored.sort_by(|a, b| {
            b.similarity
                .total_cmp(&a.similarity)
                .then_with(|| a.document.id.cmp(&b.document.id))
        });
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn get(&self, id: &str) -> Result<Option<Document>, StoreError> {
        let row = sqlx::query(&format!("SELECT {} FROM documents WHERE id = ?", SELECT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::backend)?;

        row.as_ref().map(row_to_document).transpose()
    }

    async fn delete_one(&self, id: &str) -> Result<bool, StoreError> {
        let _writer = self.write_lock.lock().await;
        let result = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::backend)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_all(&self) -> Result<u64, StoreError> {
        let _writer = self.write_lock.lock().await;
        let result = sqlx::query("DELETE FROM documents")
            .execute(&self.pool)
            .await
            .map_err(StoreError::backend)?;
        Ok(result.rows_affected())
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::backend)?;
        Ok(n.max(0) as u64)
    }

    async fn list_all(&self) -> Result<Vec<Document>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM documents ORDER BY created_at DESC, id ASC",
            SELECT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        rows.iter().map(row_to_document).collect()
    }
}
