//! SQLite-backed vector index.
//!
//! Documents and chunks live in two tables; vectors are stored as
//! little-endian `f32` BLOBs. Similarity is computed in-process over the
//! candidate rows, which is appropriate for the corpus sizes this engine
//! targets. Rows are fetched in rowid order so equal scores resolve to
//! insertion order.

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::error::Result;
use crate::models::{Chunk, DocumentInfo, DocumentRecord, EmbeddedChunk, ScoredChunk};

use super::{chunk_id, VectorIndex};

pub struct SqliteIndex {
    pool: SqlitePool,
}

impl SqliteIndex {
    /// Open (creating if missing) the index at `path` and ensure the schema.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| crate::error::Error::Index(e.to_string()))?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .map_err(|e| crate::error::Error::Index(e.to_string()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let index = Self { pool };
        index.migrate().await?;
        Ok(index)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                filename TEXT PRIMARY KEY,
                file_type TEXT NOT NULL,
                byte_size INTEGER NOT NULL,
                uploaded_at INTEGER NOT NULL,
                upload_id TEXT NOT NULL,
                content_hash TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chunks (
                id TEXT PRIMARY KEY,
                filename TEXT NOT NULL,
                page INTEGER,
                chunk_index INTEGER NOT NULL,
                text TEXT NOT NULL,
                embedding BLOB NOT NULL,
                FOREIGN KEY (filename) REFERENCES documents(filename)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_filename ON chunks(filename)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Close the connection pool. Dropping the index also releases it; this
    /// exists for callers that want a deterministic shutdown.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    async fn replace_document(&self, doc: &DocumentRecord, chunks: &[EmbeddedChunk]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM chunks WHERE filename = ?")
            .bind(&doc.filename)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM documents WHERE filename = ?")
            .bind(&doc.filename)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO documents (filename, file_type, byte_size, uploaded_at, upload_id, content_hash)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&doc.filename)
        .bind(&doc.file_type)
        .bind(doc.byte_size)
        .bind(doc.uploaded_at)
        .bind(&doc.upload_id)
        .bind(&doc.content_hash)
        .execute(&mut *tx)
        .await?;

        for entry in chunks {
            sqlx::query(
                r#"
                INSERT INTO chunks (id, filename, page, chunk_index, text, embedding)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(chunk_id(&entry.chunk.filename, entry.chunk.chunk_index))
            .bind(&entry.chunk.filename)
            .bind(entry.chunk.page)
            .bind(entry.chunk.chunk_index)
            .bind(&entry.chunk.text)
            .bind(vec_to_blob(&entry.vector))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn search(
        &self,
        query_vec: &[f32],
        k: usize,
        filter: Option<&[String]>,
    ) -> Result<Vec<ScoredChunk>> {
        let rows = match filter {
            Some(filenames) => {
                if filenames.is_empty() {
                    return Ok(Vec::new());
                }
                let placeholders = vec!["?"; filenames.len()].join(", ");
                let sql = format!(
                    "SELECT filename, page, chunk_index, text, embedding FROM chunks \
                     WHERE filename IN ({}) ORDER BY rowid",
                    placeholders
                );
                let mut query = sqlx::query(&sql);
                for name in filenames {
                    query = query.bind(name);
                }
                query.fetch_all(&self.pool).await?
            }
            None => {
                sqlx::query(
                    "SELECT filename, page, chunk_index, text, embedding FROM chunks ORDER BY rowid",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };

        let mut scored: Vec<ScoredChunk> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                ScoredChunk {
                    chunk: Chunk {
                        filename: row.get("filename"),
                        page: row.get("page"),
                        chunk_index: row.get("chunk_index"),
                        text: row.get("text"),
                    },
                    score: cosine_similarity(query_vec, &blob_to_vec(&blob)),
                }
            })
            .collect();

        // stable sort keeps rowid order for equal scores
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);
        Ok(scored)
    }

    async fn delete_document(&self, filename: &str) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let removed = sqlx::query("DELETE FROM chunks WHERE filename = ?")
            .bind(filename)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        sqlx::query("DELETE FROM documents WHERE filename = ?")
            .bind(filename)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(removed)
    }

    async fn delete_all(&self) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let removed = sqlx::query("DELETE FROM chunks")
            .execute(&mut *tx)
            .await?
            .rows_affected();
        sqlx::query("DELETE FROM documents").execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(removed)
    }

    async fn list_documents(&self) -> Result<Vec<DocumentInfo>> {
        let rows = sqlx::query(
            r#"
            SELECT d.filename, d.file_type, d.byte_size, d.uploaded_at, d.upload_id,
                   COUNT(c.id) AS chunk_count
            FROM documents d
            LEFT JOIN chunks c ON c.filename = d.filename
            GROUP BY d.filename
            ORDER BY d.filename
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| DocumentInfo {
                filename: row.get("filename"),
                file_type: row.get("file_type"),
                byte_size: row.get("byte_size"),
                uploaded_at: row.get("uploaded_at"),
                upload_id: row.get("upload_id"),
                chunk_count: row.get("chunk_count"),
            })
            .collect())
    }
}
