//! Offset to chunk-id mappings
//!
//! Bidirectional, per-modality mapping between ANN index offsets and chunk
//! identifiers. Offsets are unstable across rebuilds, so the whole structure
//! is regenerated whenever an index is rebuilt.

use crate::error::{MmIndexError, Result};
use ahash::RandomState;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The offsets assigned to one chunk, one per modality it participates in
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChunkOffsets {
    #[serde(rename = "text_id")]
    pub text: usize,
    #[serde(rename = "visual_id")]
    pub visual: Option<usize>,
}

/// Per-modality offset mappings for one tenant index.
///
/// Field names match the persisted `mappings.json` schema.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OffsetMappings {
    #[serde(rename = "text_id_to_chunk_id")]
    text_to_chunk: HashMap<usize, String, RandomState>,
    #[serde(rename = "visual_id_to_chunk_id")]
    visual_to_chunk: HashMap<usize, String, RandomState>,
    #[serde(rename = "chunk_id_to_ids")]
    chunk_to_offsets: HashMap<String, ChunkOffsets, RandomState>,
}

impl OffsetMappings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a text-only chunk
    pub fn insert_text(&mut self, chunk_id: &str, text_offset: usize) {
        self.text_to_chunk.insert(text_offset, chunk_id.to_string());
        self.chunk_to_offsets.insert(
            chunk_id.to_string(),
            ChunkOffsets {
                text: text_offset,
                visual: None,
            },
        );
    }

    /// Record a multimodal chunk; both offsets travel together so they can
    /// be dropped and renumbered atomically on rebuild
    pub fn insert_multimodal(&mut self, chunk_id: &str, text_offset: usize, visual_offset: usize) {
        self.text_to_chunk.insert(text_offset, chunk_id.to_string());
        self.visual_to_chunk
            .insert(visual_offset, chunk_id.to_string());
        self.chunk_to_offsets.insert(
            chunk_id.to_string(),
            ChunkOffsets {
                text: text_offset,
                visual: Some(visual_offset),
            },
        );
    }

    /// Drop all entries for a chunk, both directions
    pub fn remove(&mut self, chunk_id: &str) -> Option<ChunkOffsets> {
        let offsets = self.chunk_to_offsets.remove(chunk_id)?;
        self.text_to_chunk.remove(&offsets.text);
        if let Some(visual) = offsets.visual {
            self.visual_to_chunk.remove(&visual);
        }
        Some(offsets)
    }

    pub fn clear(&mut self) {
        self.text_to_chunk.clear();
        self.visual_to_chunk.clear();
        self.chunk_to_offsets.clear();
    }

    pub fn chunk_for_text_offset(&self, offset: usize) -> Option<&str> {
        self.text_to_chunk.get(&offset).map(String::as_str)
    }

    pub fn chunk_for_visual_offset(&self, offset: usize) -> Option<&str> {
        self.visual_to_chunk.get(&offset).map(String::as_str)
    }

    pub fn offsets_for(&self, chunk_id: &str) -> Option<ChunkOffsets> {
        self.chunk_to_offsets.get(chunk_id).copied()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunk_to_offsets.len()
    }

    pub fn text_count(&self) -> usize {
        self.text_to_chunk.len()
    }

    pub fn visual_count(&self) -> usize {
        self.visual_to_chunk.len()
    }

    /// Verify every mapped offset references a live vector: for all offsets,
    /// `0 <= offset < total` in the owning index
    pub fn verify(&self, text_total: usize, visual_total: usize) -> Result<()> {
        for offset in self.text_to_chunk.keys() {
            if *offset >= text_total {
                return Err(MmIndexError::OffsetIntegrity {
                    modality: "text",
                    offset: *offset,
                    total: text_total,
                });
            }
        }

        for offset in self.visual_to_chunk.keys() {
            if *offset >= visual_total {
                return Err(MmIndexError::OffsetIntegrity {
                    modality: "visual",
                    offset: *offset,
                    total: visual_total,
                });
            }
        }

        Ok(())
    }
}
