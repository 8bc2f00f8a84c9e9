//! Multi-format document loading.
//!
//! Converts an uploaded file's bytes into ordered [`TextUnit`]s that
//! concatenate to the full extracted text. Formats form a closed set behind
//! one dispatch point; adding a format means adding a [`FileFormat`] variant
//! and its extractor, not touching callers.
//!
//! Only PDF carries page structure; its units are one per page with
//! zero-based page numbers. All other formats yield a single unpaged unit.

use std::io::Read;

use crate::error::{Error, Result};
use crate::models::TextUnit;

/// Maximum decompressed bytes read from a single ZIP entry (zip-bomb guard).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Supported upload formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Pdf,
    Docx,
    Text,
    Markdown,
    Html,
    Csv,
}

impl FileFormat {
    /// Detect a format from a filename extension. `None` for unsupported.
    pub fn from_filename(filename: &str) -> Option<Self> {
        let ext = filename.rsplit_once('.').map(|(_, e)| e.to_lowercase())?;
        match ext.as_str() {
            "pdf" => Some(FileFormat::Pdf),
            "docx" | "doc" => Some(FileFormat::Docx),
            "txt" => Some(FileFormat::Text),
            "md" | "markdown" => Some(FileFormat::Markdown),
            "html" | "htm" => Some(FileFormat::Html),
            "csv" => Some(FileFormat::Csv),
            _ => None,
        }
    }

    /// Lowercase label stored as the document's file type.
    pub fn as_str(&self) -> &'static str {
        match self {
            FileFormat::Pdf => "pdf",
            FileFormat::Docx => "docx",
            FileFormat::Text => "txt",
            FileFormat::Markdown => "md",
            FileFormat::Html => "html",
            FileFormat::Csv => "csv",
        }
    }
}

/// Extract ordered text units from a file's bytes.
///
/// Corrupt or undecodable input is a [`Error::Load`] carrying the filename;
/// nothing about the document is indexed when this fails.
pub fn load(filename: &str, bytes: &[u8], format: FileFormat) -> Result<Vec<TextUnit>> {
    match format {
        FileFormat::Pdf => load_pdf(filename, bytes),
        FileFormat::Docx => load_docx(filename, bytes),
        FileFormat::Html => load_html(filename, bytes),
        FileFormat::Text | FileFormat::Markdown | FileFormat::Csv => load_plain(filename, bytes),
    }
}

fn load_pdf(filename: &str, bytes: &[u8]) -> Result<Vec<TextUnit>> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| Error::load(filename, format!("pdf: {}", e)))?;
    Ok(pages
        .into_iter()
        .enumerate()
        .map(|(i, mut text)| {
            if !text.ends_with('\n') {
                text.push('\n');
            }
            TextUnit {
                text,
                page: Some(i as i64),
            }
        })
        .collect())
}

fn load_plain(filename: &str, bytes: &[u8]) -> Result<Vec<TextUnit>> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| Error::load(filename, format!("invalid UTF-8: {}", e)))?;
    Ok(vec![TextUnit {
        text: text.to_string(),
        page: None,
    }])
}

fn load_docx(filename: &str, bytes: &[u8]) -> Result<Vec<TextUnit>> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| Error::load(filename, format!("docx: {}", e)))?;
    let mut doc_xml = Vec::new();
    {
        let entry = archive
            .by_name("word/document.xml")
            .map_err(|e| Error::load(filename, format!("docx: {}", e)))?;
        entry
            .take(MAX_XML_ENTRY_BYTES)
            .read_to_end(&mut doc_xml)
            .map_err(|e| Error::load(filename, format!("docx: {}", e)))?;
        if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
            return Err(Error::load(filename, "docx: word/document.xml too large"));
        }
    }

    let text = docx_body_text(filename, &doc_xml)?;
    Ok(vec![TextUnit { text, page: None }])
}

/// Pull the text of every `w:t` run, with a newline at each paragraph end.
fn docx_body_text(filename: &str, xml: &[u8]) -> Result<String> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_text_run = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text_run = true;
                }
            }
            Ok(quick_xml::events::Event::Text(t)) if in_text_run => {
                out.push_str(t.unescape().unwrap_or_default().as_ref());
            }
            Ok(quick_xml::events::Event::End(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text_run = false;
                } else if e.local_name().as_ref() == b"p" && !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(Error::load(filename, format!("docx: {}", e))),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

fn load_html(filename: &str, bytes: &[u8]) -> Result<Vec<TextUnit>> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);
    reader.config_mut().check_end_names = false;
    let mut buf = Vec::new();
    let mut skip_depth = 0usize;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                let name = e.local_name();
                if name.as_ref() == b"script" || name.as_ref() == b"style" {
                    skip_depth += 1;
                }
            }
            Ok(quick_xml::events::Event::End(e)) => {
                let name = e.local_name();
                if (name.as_ref() == b"script" || name.as_ref() == b"style") && skip_depth > 0 {
                    skip_depth -= 1;
                }
            }
            Ok(quick_xml::events::Event::Text(t)) if skip_depth == 0 => {
                match t.unescape() {
                    Ok(text) => out.push_str(&text),
                    Err(_) => out.push_str(&String::from_utf8_lossy(t.as_ref())),
                }
                out.push('\n');
            }
            Ok(quick_xml::events::Event::CData(c)) if skip_depth == 0 => {
                out.push_str(&String::from_utf8_lossy(c.as_ref()));
                out.push('\n');
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(Error::load(filename, format!("html: {}", e))),
            _ => {}
        }
        buf.clear();
    }
    Ok(vec![TextUnit { text: out, page: None }])
}
