//! RAG orchestration.
//!
//! [`Engine`] is the top-level coordinator behind the four operations the
//! request layer consumes: ingest a file, answer a question, delete a
//! document, list documents. It owns no storage itself: the index, the
//! embedding and generation providers, and the session store are all
//! injected behind traits.
//!
//! Concurrency rules enforced here:
//! - ingestion is serialized per filename, so concurrent re-uploads of the
//!   same file cannot interleave their delete-then-insert sequences;
//! - a document's chunks reach the index through one atomic
//!   [`replace_document`](crate::index::VectorIndex::replace_document) call,
//!   so a concurrent search sees all of them or none.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use sha2::{Digest, Sha256};

use crate::chunk::chunk_units;
use crate::citations::extract_citations;
use crate::config::Config;
use crate::embedding::Embedder;
use crate::error::{Error, Result};
use crate::generation::{Generator, Prompt, SYSTEM_PROMPT};
use crate::index::VectorIndex;
use crate::loader::{self, FileFormat};
use crate::models::{
    Answer, DocumentInfo, DocumentRecord, EmbeddedChunk, IngestReceipt, ScoredChunk, Turn,
};
use crate::session::SessionStore;

pub struct Engine {
    config: Config,
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    sessions: Arc<dyn SessionStore>,
    ingest_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl Engine {
    pub fn new(
        config: Config,
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            config,
            index,
            embedder,
            generator,
            sessions,
            ingest_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Ingest one uploaded file: load, chunk, embed, index.
    ///
    /// Re-uploading a filename replaces its prior chunks. The operation is
    /// atomic from the caller's perspective: on any failure the index still
    /// holds the prior version (or nothing) for this filename.
    pub async fn ingest(
        &self,
        filename: &str,
        bytes: &[u8],
        format: Option<FileFormat>,
    ) -> Result<IngestReceipt> {
        let format = format
            .or_else(|| FileFormat::from_filename(filename))
            .ok_or_else(|| Error::load(filename, "unsupported file format"))?;

        let lock = self.ingest_lock(filename);
        let _guard = lock.lock().await;

        let units = loader::load(filename, bytes, format)?;
        let chunks = chunk_units(
            filename,
            &units,
            self.config.chunking.chunk_size,
            self.config.chunking.chunk_overlap,
        )?;

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;
        if vectors.len() != chunks.len() {
            return Err(Error::Embedding(format!(
                "expected {} vectors, got {}",
                chunks.len(),
                vectors.len()
            )));
        }

        let embedded: Vec<EmbeddedChunk> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| EmbeddedChunk { chunk, vector })
            .collect();

        let uploaded_at = chrono::Utc::now().timestamp();
        let doc = DocumentRecord {
            filename: filename.to_string(),
            file_type: format.as_str().to_string(),
            byte_size: bytes.len() as i64,
            uploaded_at,
            upload_id: upload_id(uploaded_at),
            content_hash: content_hash(bytes),
        };

        let chunk_count = embedded.len();
        self.index.replace_document(&doc, &embedded).await?;

        tracing::info!(filename, chunk_count, "document ingested");
        Ok(IngestReceipt {
            filename: filename.to_string(),
            upload_id: doc.upload_id,
            chunk_count,
        })
    }

    /// Answer a question against the indexed corpus.
    ///
    /// Retrieval scope: the explicit `filter` wins, then the session's
    /// configured scope, then the whole corpus. When retrieval comes back
    /// empty the question is still answered from conversation alone, with no
    /// citations.
    pub async fn answer(
        &self,
        question: &str,
        session_id: &str,
        k: Option<usize>,
        filter: Option<Vec<String>>,
    ) -> Result<Answer> {
        let k = k.unwrap_or(self.config.retrieval.default_k);

        let query_vec = self
            .embedder
            .embed(&[question.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("empty query embedding".into()))?;

        let filter = match filter {
            Some(names) => Some(names),
            None => self.sessions.scope(session_id).await?,
        };
        let retrieved = self
            .index
            .search(&query_vec, k, filter.as_deref())
            .await?;
        tracing::debug!(
            session_id,
            retrieved = retrieved.len(),
            "retrieval complete"
        );

        let history = self.sessions.history(session_id).await?;
        let prompt = Prompt {
            system: SYSTEM_PROMPT.to_string(),
            context: render_context(&retrieved),
            history: render_history(&history),
            question: question.to_string(),
        };

        let text = self.generator.generate(&prompt).await?;
        let citations = extract_citations(&retrieved, self.config.retrieval.snippet_length);

        self.sessions.append(session_id, question, &text).await?;
        tracing::info!(session_id, citations = citations.len(), "question answered");

        Ok(Answer { text, citations })
    }

    /// Delete one document and its chunks. A filename with no indexed chunks
    /// is a benign [`Error::NotFound`].
    pub async fn delete_document(&self, filename: &str) -> Result<u64> {
        let removed = self.index.delete_document(filename).await?;
        if removed == 0 {
            return Err(Error::NotFound {
                filename: filename.to_string(),
            });
        }
        tracing::info!(filename, removed, "document deleted");
        Ok(removed)
    }

    /// Delete every indexed document. Returns the number of chunks removed.
    pub async fn delete_all(&self) -> Result<u64> {
        let removed = self.index.delete_all().await?;
        tracing::info!(removed, "index cleared");
        Ok(removed)
    }

    pub async fn list_documents(&self) -> Result<Vec<DocumentInfo>> {
        self.index.list_documents().await
    }

    /// Restrict (or unrestrict) a session's retrieval to a set of filenames.
    pub async fn set_session_scope(
        &self,
        session_id: &str,
        filenames: Option<Vec<String>>,
    ) -> Result<()> {
        self.sessions.set_scope(session_id, filenames).await
    }

    pub async fn clear_session(&self, session_id: &str) -> Result<()> {
        self.sessions.clear(session_id).await
    }

    fn ingest_lock(&self, filename: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.ingest_locks.lock().unwrap();
        locks
            .entry(filename.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

/// Label each retrieved passage with its source so the model can cite it.
fn render_context(retrieved: &[ScoredChunk]) -> String {
    retrieved
        .iter()
        .map(|r| {
            let page = r
                .chunk
                .page
                .map(|p| p.to_string())
                .unwrap_or_else(|| "?".to_string());
            format!(
                "[Source: {}, Page: {}]\n{}",
                r.chunk.filename, page, r.chunk.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

fn render_history(turns: &[Turn]) -> String {
    turns
        .iter()
        .flat_map(|t| {
            [
                format!("USER: {}", t.question),
                format!("ASSISTANT: {}", t.answer),
            ]
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn upload_id(timestamp: i64) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_{}", timestamp, &suffix[..8])
}

fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Chunk;

    fn scored(filename: &str, page: Option<i64>, text: &str) -> ScoredChunk {
        ScoredChunk {
            chunk: Chunk {
                filename: filename.to_string(),
                page,
                chunk_index: 0,
                text: text.to_string(),
            },
            score: 1.0,
        }
    }

    #[test]
    fn context_blocks_are_labeled() {
        let rendered = render_context(&[
            scored("a.pdf", Some(2), "first passage"),
            scored("b.txt", None, "second passage"),
        ]);
        assert!(rendered.contains("[Source: a.pdf, Page: 2]\nfirst passage"));
        assert!(rendered.contains("[Source: b.txt, Page: ?]\nsecond passage"));
        assert!(rendered.contains("\n\n---\n\n"));
    }

    #[test]
    fn history_renders_role_lines_in_order() {
        let rendered = render_history(&[
            Turn {
                question: "q1".into(),
                answer: "a1".into(),
            },
            Turn {
                question: "q2".into(),
                answer: "a2".into(),
            },
        ]);
        assert_eq!(rendered, "USER: q1\nASSISTANT: a1\nUSER: q2\nASSISTANT: a2");
    }

    #[test]
    fn upload_id_carries_timestamp_prefix() {
        let id = upload_id(1700000000);
        assert!(id.starts_with("1700000000_"));
        assert_eq!(id.len(), "1700000000_".len() + 8);
    }
}
