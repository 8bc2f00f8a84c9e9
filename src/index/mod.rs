//! Vector index abstraction and backends.
//!
//! The [`VectorIndex`] trait owns chunk persistence: vectors plus the
//! metadata needed to cite and delete them. Two backends ship:
//!
//! - [`sqlite::SqliteIndex`] — the durable store (survives restart)
//! - [`memory::MemoryIndex`] — in-process store for tests
//!
//! Entry ids are synthesized by [`chunk_id`] from `(filename, chunk_index)`,
//! never from vector content. This makes deletion-by-filename and
//! re-ingestion-replaces-prior-chunks provable: the id set of a document is a
//! pure function of its filename and chunk count.
//!
//! Ranking uses cosine similarity (see
//! [`cosine_similarity`](crate::embedding::cosine_similarity)); ties are
//! broken by insertion order so results are deterministic.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{DocumentInfo, DocumentRecord, EmbeddedChunk, ScoredChunk};

/// Synthesize the index entry id for a chunk.
pub fn chunk_id(filename: &str, chunk_index: i64) -> String {
    format!("{}#{}", filename, chunk_index)
}

/// Persistent store of embedded chunks, keyed by synthesized chunk id.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Atomically replace a document: any prior entries for its filename are
    /// removed and the new chunks inserted in one step. A concurrent
    /// [`search`](VectorIndex::search) sees either the old document or the
    /// new one, never a mix.
    async fn replace_document(&self, doc: &DocumentRecord, chunks: &[EmbeddedChunk]) -> Result<()>;

    /// Return the `k` entries most similar to `query_vec`, best-first.
    ///
    /// With a filter, only chunks whose filename is in the set are
    /// considered. Equal scores keep insertion order.
    async fn search(
        &self,
        query_vec: &[f32],
        k: usize,
        filter: Option<&[String]>,
    ) -> Result<Vec<ScoredChunk>>;

    /// Remove a document and all its chunks. Returns the number of chunks
    /// removed (0 when the filename was not indexed).
    async fn delete_document(&self, filename: &str) -> Result<u64>;

    /// Remove everything. Returns the number of chunks removed.
    async fn delete_all(&self) -> Result<u64>;

    /// Per-filename aggregates, ordered by filename. Consistent with deletes
    /// immediately after they return.
    async fn list_documents(&self) -> Result<Vec<DocumentInfo>>;
}
