//! Error taxonomy for the engine.
//!
//! Every failure the engine reports falls into one of these categories.
//! Transient external-service failures are retried inside the embedding and
//! generation providers; what surfaces here is terminal for the enclosing
//! operation. Errors carry enough context (filename, session, cause) to log
//! and to build a user-facing message.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The uploaded file could not be parsed into text.
    #[error("failed to load {filename}: {reason}")]
    Load { filename: String, reason: String },

    /// The embedding service failed after retries were exhausted.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// The generation service failed after retries were exhausted.
    #[error("generation failed: {0}")]
    Generation(String),

    /// The vector index backend failed.
    #[error("index failure: {0}")]
    Index(String),

    /// A delete referenced a filename with no indexed chunks. Benign.
    #[error("no indexed document named {filename}")]
    NotFound { filename: String },

    /// Invalid configuration, rejected before any processing begins.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub fn load(filename: impl Into<String>, reason: impl ToString) -> Self {
        Error::Load {
            filename: filename.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<sqlx::Error> for Error {
    fn from(e: sqlx::Error) -> Self {
        Error::Index(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
