//! Citation extraction.
//!
//! Turns the retrieved chunks that actually backed an answer into
//! deduplicated, user-facing source references: one citation per filename,
//! in first-appearance order (input arrives best-first, so the best-scoring
//! source leads), with the distinct pages referenced and a snippet from that
//! source's top chunk.

use std::collections::BTreeSet;

use crate::models::{Citation, ScoredChunk};

/// Build citations from retrieved chunks, best-first.
pub fn extract_citations(results: &[ScoredChunk], snippet_length: usize) -> Vec<Citation> {
    let mut citations: Vec<Citation> = Vec::new();
    let mut pages: Vec<BTreeSet<i64>> = Vec::new();

    for result in results {
        let position = citations
            .iter()
            .position(|c| c.source == result.chunk.filename);
        match position {
            Some(i) => {
                if let Some(page) = result.chunk.page {
                    pages[i].insert(page);
                }
            }
            None => {
                let mut page_set = BTreeSet::new();
                if let Some(page) = result.chunk.page {
                    page_set.insert(page);
                }
                citations.push(Citation {
                    source: result.chunk.filename.clone(),
                    pages: Vec::new(),
                    snippet: truncate_snippet(&result.chunk.text, snippet_length),
                });
                pages.push(page_set);
            }
        }
    }

    for (citation, page_set) in citations.iter_mut().zip(pages) {
        citation.pages = page_set.into_iter().collect();
    }
    citations
}

fn truncate_snippet(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut snippet: String = text.chars().take(max_chars).collect();
    snippet.push('…');
    snippet
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Chunk;

    fn scored(filename: &str, page: Option<i64>, text: &str, score: f32) -> ScoredChunk {
        ScoredChunk {
            chunk: Chunk {
                filename: filename.to_string(),
                page,
                chunk_index: 0,
                text: text.to_string(),
            },
            score,
        }
    }

    #[test]
    fn groups_by_filename_with_sorted_pages() {
        let results = vec![
            scored("a.pdf", Some(3), "first", 0.9),
            scored("a.pdf", Some(3), "dup page", 0.8),
            scored("a.pdf", Some(5), "later page", 0.7),
            scored("b.txt", None, "plain", 0.6),
        ];

        let citations = extract_citations(&results, 240);
        assert_eq!(citations.len(), 2);
        assert_eq!(citations[0].source, "a.pdf");
        assert_eq!(citations[0].pages, vec![3, 5]);
        assert_eq!(citations[1].source, "b.txt");
        assert!(citations[1].pages.is_empty());
    }

    #[test]
    fn snippet_comes_from_best_scoring_chunk() {
        let results = vec![
            scored("a.pdf", Some(0), "best chunk text", 0.9),
            scored("a.pdf", Some(1), "weaker chunk text", 0.4),
        ];
        let citations = extract_citations(&results, 240);
        assert_eq!(citations[0].snippet, "best chunk text");
    }

    #[test]
    fn order_follows_first_appearance() {
        let results = vec![
            scored("b.txt", None, "b", 0.9),
            scored("a.pdf", Some(0), "a", 0.8),
            scored("b.txt", None, "b again", 0.7),
        ];
        let citations = extract_citations(&results, 240);
        let sources: Vec<&str> = citations.iter().map(|c| c.source.as_str()).collect();
        assert_eq!(sources, vec!["b.txt", "a.pdf"]);
    }

    #[test]
    fn long_snippet_truncated_with_ellipsis() {
        let text = "x".repeat(300);
        let results = vec![scored("a.txt", None, &text, 1.0)];
        let citations = extract_citations(&results, 240);
        assert_eq!(citations[0].snippet.chars().count(), 241);
        assert!(citations[0].snippet.ends_with('…'));
    }

    #[test]
    fn no_results_no_citations() {
        assert!(extract_citations(&[], 240).is_empty());
    }
}
