//! Core data types that flow through the ingestion and answer pipelines.

use serde::Serialize;

/// A contiguous span of extracted text produced by the document loader.
///
/// Units concatenate, in order, to the full extracted text of the document.
/// `page` is zero-based and `None` for formats without page structure.
#[derive(Debug, Clone)]
pub struct TextUnit {
    pub text: String,
    pub page: Option<i64>,
}

/// A chunk of a document's extracted text, produced by the chunker.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Filename of the parent document.
    pub filename: String,
    /// Zero-based page the chunk's first character came from, if any.
    pub page: Option<i64>,
    /// Sequential index within the document, starting at 0.
    pub chunk_index: i64,
    pub text: String,
}

/// A chunk paired with its embedding vector, ready for indexing.
#[derive(Debug, Clone)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// A chunk returned from similarity search, best-first.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    /// Cosine similarity to the query vector.
    pub score: f32,
}

/// Metadata recorded for an uploaded document.
#[derive(Debug, Clone)]
pub struct DocumentRecord {
    /// Unique key within the corpus.
    pub filename: String,
    /// Lowercase format label (`pdf`, `docx`, `txt`, ...).
    pub file_type: String,
    pub byte_size: i64,
    /// Unix seconds.
    pub uploaded_at: i64,
    /// Opaque id assigned at upload time.
    pub upload_id: String,
    /// SHA-256 of the uploaded bytes.
    pub content_hash: String,
}

/// Per-filename aggregate returned by `list_documents`.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentInfo {
    pub filename: String,
    pub file_type: String,
    pub byte_size: i64,
    pub uploaded_at: i64,
    pub upload_id: String,
    pub chunk_count: i64,
}

/// One question/answer exchange in a conversation.
#[derive(Debug, Clone)]
pub struct Turn {
    pub question: String,
    pub answer: String,
}

/// A deduplicated source reference attached to an answer.
#[derive(Debug, Clone, Serialize)]
pub struct Citation {
    /// Source document filename.
    pub source: String,
    /// Distinct zero-based pages referenced, ascending. Empty for unpaged formats.
    pub pages: Vec<i64>,
    /// Preview taken from the best-scoring chunk of this source.
    pub snippet: String,
}

/// The result of answering a question.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub text: String,
    pub citations: Vec<Citation>,
}

/// The result of ingesting one file.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReceipt {
    pub filename: String,
    pub upload_id: String,
    pub chunk_count: usize,
}
