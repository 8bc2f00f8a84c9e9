//! Shared fixtures for integration tests: deterministic provider fakes and a
//! minimal multi-page PDF builder.

#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;

use docchat::embedding::Embedder;
use docchat::error::Result;
use docchat::generation::{Generator, Prompt};

/// Marker words the test embedder projects onto vector dimensions.
pub const KEYWORDS: [&str; 4] = ["alpha", "bravo", "charlie", "delta"];

/// Deterministic embedder: dimension `i` counts occurrences of `KEYWORDS[i]`.
///
/// Texts sharing a marker word score cosine 1.0 against each other and 0.0
/// against texts with a different marker, which makes retrieval outcomes
/// exact in tests.
pub struct KeywordEmbedder;

#[async_trait]
impl Embedder for KeywordEmbedder {
    fn model_name(&self) -> &str {
        "keyword-test"
    }

    fn dims(&self) -> usize {
        KEYWORDS.len()
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                KEYWORDS
                    .iter()
                    .map(|k| text.matches(k).count() as f32)
                    .collect()
            })
            .collect())
    }
}

/// Generator fake that records every prompt and returns a canned answer.
#[derive(Default)]
pub struct RecordingGenerator {
    pub prompts: Mutex<Vec<Prompt>>,
}

#[async_trait]
impl Generator for RecordingGenerator {
    fn model_name(&self) -> &str {
        "recording-test"
    }

    async fn generate(&self, prompt: &Prompt) -> Result<String> {
        let answer = format!("answer to: {}", prompt.question);
        self.prompts.lock().unwrap().push(prompt.clone());
        Ok(answer)
    }
}

impl RecordingGenerator {
    pub fn last_prompt(&self) -> Prompt {
        self.prompts.lock().unwrap().last().cloned().expect("no prompt recorded")
    }
}

/// Build a minimal valid PDF with one text object per page.
///
/// Body objects first, then an xref table with correct byte offsets so
/// pdf-extract can parse it. Page texts must not contain parentheses.
pub fn minimal_pdf(pages: &[&str]) -> Vec<u8> {
    let n = pages.len();
    let font_id = 3 + 2 * n;
    let mut out = Vec::new();
    let mut offsets: Vec<usize> = Vec::new();

    out.extend_from_slice(b"%PDF-1.4\n");

    offsets.push(out.len());
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");

    offsets.push(out.len());
    let kids = (0..n)
        .map(|i| format!("{} 0 R", 3 + 2 * i))
        .collect::<Vec<_>>()
        .join(" ");
    out.extend_from_slice(
        format!(
            "2 0 obj << /Type /Pages /Kids [{}] /Count {} >> endobj\n",
            kids, n
        )
        .as_bytes(),
    );

    for (i, text) in pages.iter().enumerate() {
        let page_id = 3 + 2 * i;
        let content_id = 4 + 2 * i;

        offsets.push(out.len());
        out.extend_from_slice(
            format!(
                "{} 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
                 /Contents {} 0 R /Resources << /Font << /F1 {} 0 R >> >> >> endobj\n",
                page_id, content_id, font_id
            )
            .as_bytes(),
        );

        let stream = format!("BT /F1 12 Tf 72 720 Td ({}) Tj ET\n", text);
        offsets.push(out.len());
        out.extend_from_slice(
            format!(
                "{} 0 obj << /Length {} >> stream\n{}endstream endobj\n",
                content_id,
                stream.len(),
                stream
            )
            .as_bytes(),
        );
    }

    offsets.push(out.len());
    out.extend_from_slice(
        format!(
            "{} 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
            font_id
        )
        .as_bytes(),
    );

    let xref_start = out.len();
    let total = font_id + 1;
    out.extend_from_slice(format!("xref\n0 {}\n", total).as_bytes());
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in &offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer << /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            total, xref_start
        )
        .as_bytes(),
    );

    out
}
