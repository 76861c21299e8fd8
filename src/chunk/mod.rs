//! Document chunking
//!
//! Splits source-document text into bounded, overlapping chunks - the unit of
//! indexing and retrieval. Chunk identifiers are content-derived so that
//! reprocessing the same input is idempotent at the identity level.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A bounded span of text derived from one source document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextChunk {
    /// Stable, content-derived chunk identifier
    pub chunk_id: String,

    /// Chunk text
    pub text: String,

    /// Source file the chunk was derived from
    pub source_file: String,

    /// Position of this chunk within its source document
    pub chunk_index: usize,

    /// Arbitrary key/value metadata inherited from the source document
    pub metadata: HashMap<String, serde_json::Value>,

    /// Character offset where the chunk starts in the preprocessed text
    pub start_char: usize,

    /// Character offset where the chunk ends in the preprocessed text
    pub end_char: usize,
}

impl TextChunk {
    /// Derive the stable chunk identifier from source file, position, and a
    /// text prefix. Content changes produce a new id; identical input does not.
    pub fn derive_id(source_file: &str, chunk_index: usize, text: &str) -> String {
        let prefix: String = text.chars().take(100).collect();
        let content = format!("{}_{}_{}", source_file, chunk_index, prefix);
        blake3::hash(content.as_bytes()).to_hex().to_string()
    }
}

/// Splits document text into overlapping chunks, preferring natural breaks
/// (paragraphs, lines, sentences) over hard cuts.
pub struct DocumentChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    blank_lines: Regex,
    spaces: Regex,
    list_marker: Regex,
}

impl DocumentChunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
            blank_lines: Regex::new(r"\n\s*\n").expect("static regex"),
            spaces: Regex::new(r"[ \t]+").expect("static regex"),
            list_marker: Regex::new(r"(?m)^\s*[-*\d]\s").expect("static regex"),
        }
    }

    /// Normalize whitespace and drop very short line fragments before chunking
    pub fn preprocess_text(&self, text: &str) -> String {
        let text = self.blank_lines.replace_all(text, "\n\n");
        let text = self.spaces.replace_all(&text, " ");
        let text = text.trim();

        // Lines of three characters or fewer are usually extraction artifacts;
        // empty lines stay as paragraph separators.
        text.lines()
            .map(str::trim)
            .filter(|line| line.is_empty() || line.chars().count() > 3)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Split `text` into chunks, carrying `metadata` into every chunk along
    /// with per-chunk derived fields.
    pub fn create_chunks(
        &self,
        text: &str,
        source_file: &str,
        metadata: &HashMap<String, serde_json::Value>,
    ) -> Vec<TextChunk> {
        let preprocessed = self.preprocess_text(text);
        if preprocessed.trim().is_empty() {
            return Vec::new();
        }

        let chars: Vec<char> = preprocessed.chars().collect();
        let total = chars.len();

        let mut chunks = Vec::new();
        let mut start = 0usize;
        let mut chunk_index = 0usize;

        while start < total {
            let hard_end = (start + self.chunk_size).min(total);
            let end = if hard_end < total {
                self.find_break(&chars, start, hard_end)
            } else {
                hard_end
            };

            let chunk_text: String = chars[start..end].iter().collect();
            let trimmed = chunk_text.trim();

            if !trimmed.is_empty() {
                let chunk_id = TextChunk::derive_id(source_file, chunk_index, trimmed);

                let mut chunk_metadata = metadata.clone();
                chunk_metadata.insert(
                    "chunk_size".to_string(),
                    serde_json::json!(trimmed.chars().count()),
                );
                chunk_metadata.insert("chunk_index".to_string(), serde_json::json!(chunk_index));
                chunk_metadata.insert("chunk_id".to_string(), serde_json::json!(chunk_id));
                chunk_metadata.insert("start_char".to_string(), serde_json::json!(start));
                chunk_metadata.insert("end_char".to_string(), serde_json::json!(end));
                chunk_metadata.insert(
                    "has_tables".to_string(),
                    serde_json::json!(trimmed.to_lowercase().contains("table") || trimmed.contains('|')),
                );
                chunk_metadata.insert(
                    "has_lists".to_string(),
                    serde_json::json!(self.list_marker.is_match(trimmed)),
                );

                chunks.push(TextChunk {
                    chunk_id,
                    text: trimmed.to_string(),
                    source_file: source_file.to_string(),
                    chunk_index,
                    metadata: chunk_metadata,
                    start_char: start,
                    end_char: end,
                });

                chunk_index += 1;
            }

            if end >= total {
                break;
            }

            let next = end.saturating_sub(self.chunk_overlap);
            start = if next > start { next } else { end };
        }

        chunks
    }

    /// Find the best split position in `(start, hard_end]`, preferring
    /// paragraph breaks, then line breaks, then sentence ends, then spaces.
    /// Only the second half of the window is considered so chunks do not
    /// degenerate.
    fn find_break(&self, chars: &[char], start: usize, hard_end: usize) -> usize {
        let floor = start + (hard_end - start) / 2;

        let mut newline = None;
        let mut paragraph = None;
        let mut sentence = None;
        let mut space = None;

        let mut i = hard_end - 1;
        while i > floor {
            match chars[i] {
                '\n' if chars[i - 1] == '\n' && paragraph.is_none() => paragraph = Some(i + 1),
                '\n' if newline.is_none() => newline = Some(i + 1),
                ' ' if chars[i - 1] == '.' && sentence.is_none() => sentence = Some(i + 1),
                ' ' if space.is_none() => space = Some(i),
                _ => {}
            }
            i -= 1;
        }

        paragraph
            .or(newline)
            .or(sentence)
            .or(space)
            .unwrap_or(hard_end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker() -> DocumentChunker {
        DocumentChunker::new(100, 20)
    }

    #[test]
    fn test_chunk_id_deterministic() {
        let a = TextChunk::derive_id("doc.pdf", 0, "some chunk text");
        let b = TextChunk::derive_id("doc.pdf", 0, "some chunk text");
        let c = TextChunk::derive_id("doc.pdf", 1, "some chunk text");
        let d = TextChunk::derive_id("doc.pdf", 0, "other chunk text");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn test_empty_text_yields_no_chunks() {
        let chunks = chunker().create_chunks("   \n  \n ", "doc.txt", &HashMap::new());
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunks = chunker().create_chunks("A short paragraph.", "doc.txt", &HashMap::new());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].text, "A short paragraph.");
    }

    #[test]
    fn test_long_text_splits_with_overlap() {
        let sentence = "The quick brown fox jumps over the lazy dog. ";
        let text = sentence.repeat(10);
        let chunks = chunker().create_chunks(&text, "doc.txt", &HashMap::new());

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.text.chars().count() <= 100);
        }
        // Chunk indices are consecutive
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, i);
        }
    }

    #[test]
    fn test_metadata_inherited_and_enriched() {
        let mut metadata = HashMap::new();
        metadata.insert("category".to_string(), serde_json::json!("tech"));

        let chunks = chunker().create_chunks("Some document body.", "doc.txt", &metadata);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].metadata["category"], serde_json::json!("tech"));
        assert!(chunks[0].metadata.contains_key("chunk_id"));
        assert!(chunks[0].metadata.contains_key("chunk_index"));
    }

    #[test]
    fn test_preprocess_drops_short_lines() {
        let text = "A real line of content here\nab\nAnother real line of content";
        let cleaned = chunker().preprocess_text(text);
        assert!(!cleaned.contains("ab"));
    }

    #[test]
    fn test_cyrillic_text_is_chunked_safely() {
        let text = "Спецификация дверей и окон. ".repeat(20);
        let chunks = chunker().create_chunks(&text, "спец.docx", &HashMap::new());
        assert!(!chunks.is_empty());
        for chunk in &chunks {
            assert!(chunk.text.contains("Спецификация") || chunk.text.contains("дверей"));
        }
    }
}
