//! # docchat CLI
//!
//! Development driver for the docchat engine. The production surface is a
//! request layer consuming [`docchat::engine::Engine`] directly; this binary
//! exposes the same four operations from a terminal.
//!
//! ```bash
//! docchat init                          # create the index
//! docchat ingest report.pdf notes.md    # upload and index files
//! docchat ask "what changed in Q3?"     # answer with citations
//! docchat documents                     # list indexed documents
//! docchat delete report.pdf             # remove one document
//! docchat clear                         # remove everything
//! ```
//!
//! Ask and ingest call the configured embedding/generation services and need
//! the API key environment variable set (`OPENAI_API_KEY` by default).

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use docchat::config::{load_config_or_default, Config};
use docchat::embedding::HttpEmbedder;
use docchat::engine::Engine;
use docchat::error::Error;
use docchat::generation::HttpGenerator;
use docchat::index::sqlite::SqliteIndex;
use docchat::index::VectorIndex;
use docchat::session::InMemorySessions;

/// docchat — ask questions about your documents.
#[derive(Parser)]
#[command(
    name = "docchat",
    about = "A retrieval-augmented question-answering engine for uploaded documents",
    version
)]
struct Cli {
    /// Path to configuration file (TOML). Defaults are used if absent.
    #[arg(long, global = true, default_value = "./docchat.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the index database and schema. Idempotent.
    Init,

    /// Ingest one or more files into the index.
    ///
    /// Re-ingesting a filename replaces its previous chunks.
    Ingest {
        /// Files to ingest; format is detected from the extension.
        files: Vec<PathBuf>,
    },

    /// Ask a question about the indexed documents.
    Ask {
        question: String,

        /// Conversation id; history is kept per session for the process.
        #[arg(long, default_value = "default")]
        session: String,

        /// Number of chunks to retrieve (defaults to retrieval.default_k).
        #[arg(long)]
        k: Option<usize>,

        /// Comma-separated filenames to restrict retrieval to.
        #[arg(long)]
        documents: Option<String>,
    },

    /// List indexed documents with chunk counts.
    Documents,

    /// Delete one document and all its chunks.
    Delete { filename: String },

    /// Delete every indexed document.
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config_or_default(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let index = SqliteIndex::open(&config.index.path).await?;
            index.close().await;
            println!("initialized {}", config.index.path.display());
        }

        Commands::Ingest { files } => {
            if files.is_empty() {
                anyhow::bail!("no files given");
            }
            let engine = build_engine(&config).await?;
            for path in files {
                let filename = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.to_string())
                    .ok_or_else(|| anyhow::anyhow!("invalid path: {}", path.display()))?;
                let bytes = std::fs::read(&path)?;
                let receipt = engine.ingest(&filename, &bytes, None).await?;
                println!("{}: {} chunks", receipt.filename, receipt.chunk_count);
            }
        }

        Commands::Ask {
            question,
            session,
            k,
            documents,
        } => {
            let filter = documents.map(|list| {
                list.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
            });
            let engine = build_engine(&config).await?;
            let answer = engine.answer(&question, &session, k, filter).await?;

            println!("{}", answer.text);
            if !answer.citations.is_empty() {
                println!();
                println!("Sources:");
                for citation in &answer.citations {
                    if citation.pages.is_empty() {
                        println!("  {}", citation.source);
                    } else {
                        let pages = citation
                            .pages
                            .iter()
                            .map(|p| p.to_string())
                            .collect::<Vec<_>>()
                            .join(", ");
                        println!("  {} (pages {})", citation.source, pages);
                    }
                }
            }
        }

        Commands::Documents => {
            let index = SqliteIndex::open(&config.index.path).await?;
            let documents = index.list_documents().await?;
            if documents.is_empty() {
                println!("No documents indexed.");
            } else {
                for doc in &documents {
                    println!(
                        "{}  type={} size={}B chunks={} uploaded={}",
                        doc.filename, doc.file_type, doc.byte_size, doc.chunk_count, doc.uploaded_at
                    );
                }
            }
            index.close().await;
        }

        Commands::Delete { filename } => {
            let index = SqliteIndex::open(&config.index.path).await?;
            let removed = index.delete_document(&filename).await?;
            index.close().await;
            if removed == 0 {
                println!("{}: not indexed (0 chunks deleted)", filename);
            } else {
                println!("{}: {} chunks deleted", filename, removed);
            }
        }

        Commands::Clear => {
            let index = SqliteIndex::open(&config.index.path).await?;
            let removed = index.delete_all().await?;
            index.close().await;
            println!("{} chunks deleted", removed);
        }
    }

    Ok(())
}

async fn build_engine(config: &Config) -> Result<Engine, Error> {
    let index: Arc<dyn VectorIndex> = Arc::new(SqliteIndex::open(&config.index.path).await?);
    let embedder = Arc::new(HttpEmbedder::new(&config.embedding)?);
    let generator = Arc::new(HttpGenerator::new(&config.generation)?);
    let sessions = Arc::new(InMemorySessions::new(config.history.window_turns));
    Ok(Engine::new(
        config.clone(),
        index,
        embedder,
        generator,
        sessions,
    ))
}
