//! In-memory [`VectorIndex`] for tests and as the swappable-backend proof.
//!
//! A `RwLock` around plain collections; chunk insertion order is the `Vec`
//! order, which gives the same tie-breaking behavior as the SQLite backend.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::error::Result;
use crate::models::{DocumentInfo, DocumentRecord, EmbeddedChunk, ScoredChunk};

use super::VectorIndex;

#[derive(Default)]
struct Inner {
    docs: HashMap<String, DocumentRecord>,
    chunks: Vec<EmbeddedChunk>,
}

#[derive(Default)]
pub struct MemoryIndex {
    inner: RwLock<Inner>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn replace_document(&self, doc: &DocumentRecord, chunks: &[EmbeddedChunk]) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner.chunks.retain(|c| c.chunk.filename != doc.filename);
        inner.chunks.extend(chunks.iter().cloned());
        inner.docs.insert(doc.filename.clone(), doc.clone());
        Ok(())
    }

    async fn search(
        &self,
        query_vec: &[f32],
        k: usize,
        filter: Option<&[String]>,
    ) -> Result<Vec<ScoredChunk>> {
        let inner = self.inner.read().unwrap();
        let mut scored: Vec<ScoredChunk> = inner
            .chunks
            .iter()
            .filter(|c| match filter {
                Some(names) => names.iter().any(|n| n == &c.chunk.filename),
                None => true,
            })
            .map(|c| ScoredChunk {
                chunk: c.chunk.clone(),
                score: cosine_similarity(query_vec, &c.vector),
            })
            .collect();

        // stable sort keeps insertion order for equal scores
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);
        Ok(scored)
    }

    async fn delete_document(&self, filename: &str) -> Result<u64> {
        let mut inner = self.inner.write().unwrap();
        let before = inner.chunks.len();
        inner.chunks.retain(|c| c.chunk.filename != filename);
        inner.docs.remove(filename);
        Ok((before - inner.chunks.len()) as u64)
    }

    async fn delete_all(&self) -> Result<u64> {
        let mut inner = self.inner.write().unwrap();
        let removed = inner.chunks.len() as u64;
        inner.chunks.clear();
        inner.docs.clear();
        Ok(removed)
    }

    async fn list_documents(&self) -> Result<Vec<DocumentInfo>> {
        let inner = self.inner.read().unwrap();
        let mut infos: Vec<DocumentInfo> = inner
            .docs
            .values()
            .map(|doc| DocumentInfo {
                filename: doc.filename.clone(),
                file_type: doc.file_type.clone(),
                byte_size: doc.byte_size,
                uploaded_at: doc.uploaded_at,
                upload_id: doc.upload_id.clone(),
                chunk_count: inner
                    .chunks
                    .iter()
                    .filter(|c| c.chunk.filename == doc.filename)
                    .count() as i64,
            })
            .collect();
        infos.sort_by(|a, b| a.filename.cmp(&b.filename));
        Ok(infos)
    }
}
