//! Chunk metadata store
//!
//! In-memory mapping from stable chunk identifiers to chunk records.
//! Records are replaced wholly, never partially updated; every record holds
//! at least a text offset (a visual-only chunk cannot exist).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::chunk::TextChunk;

/// Everything the store knows about one indexed chunk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub chunk_id: String,
    pub text: String,
    pub source_file: String,
    pub chunk_index: usize,
    pub metadata: HashMap<String, serde_json::Value>,
    pub added_date: DateTime<Utc>,
    pub start_char: usize,
    pub end_char: usize,
    /// Offset of this chunk's vector in the text index
    pub text_offset: usize,
    /// Offset in the visual index, when the chunk carries an image vector
    pub visual_offset: Option<usize>,
    pub has_visual_vector: bool,
}

impl ChunkRecord {
    /// Build a record from a chunk and its freshly assigned offsets
    pub fn from_chunk(chunk: &TextChunk, text_offset: usize, visual_offset: Option<usize>) -> Self {
        Self {
            chunk_id: chunk.chunk_id.clone(),
            text: chunk.text.clone(),
            source_file: chunk.source_file.clone(),
            chunk_index: chunk.chunk_index,
            metadata: chunk.metadata.clone(),
            added_date: Utc::now(),
            start_char: chunk.start_char,
            end_char: chunk.end_char,
            text_offset,
            has_visual_vector: visual_offset.is_some(),
            visual_offset,
        }
    }
}

/// Chunk-id-keyed metadata store
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct MetadataStore {
    records: HashMap<String, ChunkRecord>,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or wholly replace a record
    pub fn insert(&mut self, record: ChunkRecord) {
        self.records.insert(record.chunk_id.clone(), record);
    }

    pub fn remove(&mut self, chunk_id: &str) -> Option<ChunkRecord> {
        self.records.remove(chunk_id)
    }

    pub fn get(&self, chunk_id: &str) -> Option<&ChunkRecord> {
        self.records.get(chunk_id)
    }

    pub fn contains(&self, chunk_id: &str) -> bool {
        self.records.contains_key(chunk_id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// All records, unordered
    pub fn all(&self) -> impl Iterator<Item = &ChunkRecord> {
        self.records.values()
    }

    /// All records from one source file
    pub fn by_source(&self, source_file: &str) -> Vec<&ChunkRecord> {
        self.records
            .values()
            .filter(|record| record.source_file == source_file)
            .collect()
    }

    /// Renumber a record's offsets after an index rebuild
    pub fn set_offsets(
        &mut self,
        chunk_id: &str,
        text_offset: usize,
        visual_offset: Option<usize>,
    ) {
        if let Some(record) = self.records.get_mut(chunk_id) {
            record.text_offset = text_offset;
            record.visual_offset = visual_offset;
            record.has_visual_vector = visual_offset.is_some();
        }
    }

    /// Records sorted by their text-index offset, i.e. original insertion
    /// order. This is the iteration order rebuilds must use so surviving
    /// chunks keep their relative positions.
    pub fn in_insertion_order(&self) -> Vec<&ChunkRecord> {
        let mut records: Vec<&ChunkRecord> = self.records.values().collect();
        records.sort_by_key(|record| record.text_offset);
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str, source: &str, index: usize) -> TextChunk {
        TextChunk {
            chunk_id: id.to_string(),
            text: format!("chunk text {}", id),
            source_file: source.to_string(),
            chunk_index: index,
            metadata: HashMap::new(),
            start_char: 0,
            end_char: 10,
        }
    }

    #[test]
    fn test_insert_and_get() {
        let mut store = MetadataStore::new();
        store.insert(ChunkRecord::from_chunk(&chunk("a", "doc.pdf", 0), 0, None));

        let record = store.get("a").unwrap();
        assert_eq!(record.text_offset, 0);
        assert!(!record.has_visual_vector);
        assert_eq!(record.visual_offset, None);
    }

    #[test]
    fn test_multimodal_record_flags() {
        let mut store = MetadataStore::new();
        store.insert(ChunkRecord::from_chunk(&chunk("a", "img.jpg", 0), 3, Some(1)));

        let record = store.get("a").unwrap();
        assert!(record.has_visual_vector);
        assert_eq!(record.visual_offset, Some(1));
    }

    #[test]
    fn test_by_source() {
        let mut store = MetadataStore::new();
        store.insert(ChunkRecord::from_chunk(&chunk("a", "one.pdf", 0), 0, None));
        store.insert(ChunkRecord::from_chunk(&chunk("b", "one.pdf", 1), 1, None));
        store.insert(ChunkRecord::from_chunk(&chunk("c", "two.pdf", 0), 2, None));

        assert_eq!(store.by_source("one.pdf").len(), 2);
        assert_eq!(store.by_source("two.pdf").len(), 1);
        assert!(store.by_source("missing.pdf").is_empty());
    }

    #[test]
    fn test_insertion_order_follows_text_offsets() {
        let mut store = MetadataStore::new();
        store.insert(ChunkRecord::from_chunk(&chunk("c", "doc", 2), 2, None));
        store.insert(ChunkRecord::from_chunk(&chunk("a", "doc", 0), 0, None));
        store.insert(ChunkRecord::from_chunk(&chunk("b", "doc", 1), 1, None));

        let ordered: Vec<&str> = store
            .in_insertion_order()
            .iter()
            .map(|r| r.chunk_id.as_str())
            .collect();
        assert_eq!(ordered, vec!["a", "b", "c"]);
    }
}
