//! Multimodal index manager
//!
//! Owns the per-tenant ANN indices, metadata store, and offset mappings, and
//! keeps them mutually consistent under add/search/remove. The modality mode
//! (text-only vs multimodal) is fixed at construction time; changing it
//! requires a fresh index.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::chunk::TextChunk;
use crate::error::{MmIndexError, Result};
use crate::index::ann::{build_index, AnnIndex, HnswParams, IndexKind};
use crate::index::mappings::OffsetMappings;
use crate::index::store::{ChunkRecord, MetadataStore};

/// Construction-time settings for a tenant index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSettings {
    /// Text embedding model name, recorded for the persisted descriptor
    pub model_name: String,
    pub kind: IndexKind,
    pub enable_visual_search: bool,
    pub text_dimension: usize,
    pub visual_dimension: usize,
    pub hnsw_params: HnswParams,
}

/// Which retrieval path produced a hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchType {
    Text,
    Visual,
    /// Combined search, both modalities matched
    Multimodal,
    /// Combined search, only the text modality matched
    TextOnly,
    /// Combined search, only the visual modality matched
    VisualOnly,
}

/// One search result hydrated with chunk metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub chunk_id: String,
    pub score: f32,
    pub search_type: SearchType,
    pub text: String,
    pub source_file: String,
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Fuse per-modality scores for one chunk.
///
/// A chunk both modalities agree on gets the full weighted sum; a chunk only
/// one modality retrieved keeps only that modality's weighted share, so
/// partial evidence gets partial credit without being discarded.
pub fn combined_score(text_score: Option<f32>, visual_score: Option<f32>, text_weight: f32) -> f32 {
    match (text_score, visual_score) {
        (Some(t), Some(v)) => text_weight * t + (1.0 - text_weight) * v,
        (Some(t), None) => t * text_weight,
        (None, Some(v)) => v * (1.0 - text_weight),
        (None, None) => 0.0,
    }
}

/// Aggregate statistics over one tenant index
#[derive(Debug, Clone, Serialize)]
pub struct IndexStatistics {
    pub status: &'static str,
    pub client_id: String,
    pub enable_visual_search: bool,
    pub text_dimension: usize,
    pub visual_dimension: usize,
    pub text_vectors: usize,
    pub visual_vectors: usize,
    pub total_chunks: usize,
    pub multimodal_chunks: usize,
    pub sources_distribution: HashMap<String, usize>,
    pub categories_distribution: HashMap<String, usize>,
    pub file_types_distribution: HashMap<String, usize>,
    pub visual_content_ratio: f32,
}

/// Per-tenant multimodal index manager
pub struct MultimodalIndexManager {
    client_id: String,
    settings: IndexSettings,
    text_index: Option<Box<dyn AnnIndex>>,
    visual_index: Option<Box<dyn AnnIndex>>,
    store: MetadataStore,
    mappings: OffsetMappings,
}

impl MultimodalIndexManager {
    /// Create an empty manager; indices are created lazily on first add
    pub fn new(client_id: impl Into<String>, settings: IndexSettings) -> Self {
        Self {
            client_id: client_id.into(),
            settings,
            text_index: None,
            visual_index: None,
            store: MetadataStore::new(),
            mappings: OffsetMappings::new(),
        }
    }

    /// Reassemble a manager from loaded parts (persistence layer only)
    pub(crate) fn from_parts(
        client_id: String,
        settings: IndexSettings,
        text_index: Option<Box<dyn AnnIndex>>,
        visual_index: Option<Box<dyn AnnIndex>>,
        store: MetadataStore,
        mappings: OffsetMappings,
    ) -> Self {
        Self {
            client_id,
            settings,
            text_index,
            visual_index,
            store,
            mappings,
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn settings(&self) -> &IndexSettings {
        &self.settings
    }

    pub fn is_multimodal(&self) -> bool {
        self.settings.enable_visual_search
    }

    pub fn is_initialized(&self) -> bool {
        self.text_index.is_some() || self.visual_index.is_some()
    }

    pub fn text_total(&self) -> usize {
        self.text_index.as_ref().map_or(0, |index| index.total())
    }

    pub fn visual_total(&self) -> usize {
        self.visual_index.as_ref().map_or(0, |index| index.total())
    }

    pub(crate) fn store(&self) -> &MetadataStore {
        &self.store
    }

    pub(crate) fn mappings(&self) -> &OffsetMappings {
        &self.mappings
    }

    pub(crate) fn text_index(&self) -> Option<&dyn AnnIndex> {
        self.text_index.as_deref()
    }

    pub(crate) fn visual_index(&self) -> Option<&dyn AnnIndex> {
        self.visual_index.as_deref()
    }

    fn ensure_text_index(&mut self) -> Result<&mut Box<dyn AnnIndex>> {
        let settings = &self.settings;
        match &mut self.text_index {
            Some(index) => Ok(index),
            slot => {
                info!(
                    model = %settings.model_name,
                    "Creating {:?} text index ({}D)",
                    settings.kind,
                    settings.text_dimension
                );
                let index =
                    build_index(settings.kind, settings.text_dimension, &settings.hnsw_params)
                        .map_err(ann_to_crate_error("text"))?;
                Ok(slot.insert(index))
            }
        }
    }

    fn ensure_visual_index(&mut self) -> Result<&mut Box<dyn AnnIndex>> {
        let settings = &self.settings;
        match &mut self.visual_index {
            Some(index) => Ok(index),
            slot => {
                info!(
                    "Creating {:?} visual index ({}D)",
                    settings.kind, settings.visual_dimension
                );
                let index = build_index(
                    settings.kind,
                    settings.visual_dimension,
                    &settings.hnsw_params,
                )
                .map_err(ann_to_crate_error("visual"))?;
                Ok(slot.insert(index))
            }
        }
    }

    fn check_dimension(
        &self,
        modality: &'static str,
        expected: usize,
        vector: &[f32],
    ) -> Result<()> {
        if vector.len() != expected {
            return Err(MmIndexError::DimensionMismatch {
                modality,
                expected,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    /// Add a text-only chunk. Returns the text offset assigned to it.
    pub fn add_text_chunk(&mut self, chunk: &TextChunk, text_vector: Vec<f32>) -> Result<usize> {
        self.check_dimension("text", self.settings.text_dimension, &text_vector)?;

        let text_offset = self
            .ensure_text_index()?
            .add_batch(&[text_vector])
            .map_err(ann_to_crate_error("text"))?;

        self.store
            .insert(ChunkRecord::from_chunk(chunk, text_offset, None));
        self.mappings.insert_text(&chunk.chunk_id, text_offset);

        debug!(chunk_id = %chunk.chunk_id, text_offset, "Added text chunk");
        Ok(text_offset)
    }

    /// Add a multimodal chunk (text vector + visual vector). Both offsets are
    /// recorded together so they renumber atomically on rebuild.
    pub fn add_multimodal_chunk(
        &mut self,
        chunk: &TextChunk,
        text_vector: Vec<f32>,
        visual_vector: Vec<f32>,
    ) -> Result<(usize, usize)> {
        if !self.settings.enable_visual_search {
            return Err(MmIndexError::Config(
                "Multimodal chunks require an index created with visual search enabled".to_string(),
            ));
        }

        // Both vectors are validated before either index is touched, so a bad
        // visual vector cannot leave an orphaned text vector behind.
        self.check_dimension("text", self.settings.text_dimension, &text_vector)?;
        self.check_dimension("visual", self.settings.visual_dimension, &visual_vector)?;

        let text_offset = self
            .ensure_text_index()?
            .add_batch(&[text_vector])
            .map_err(ann_to_crate_error("text"))?;
        let visual_offset = self
            .ensure_visual_index()?
            .add_batch(&[visual_vector])
            .map_err(ann_to_crate_error("visual"))?;

        self.store
            .insert(ChunkRecord::from_chunk(chunk, text_offset, Some(visual_offset)));
        self.mappings
            .insert_multimodal(&chunk.chunk_id, text_offset, visual_offset);

        debug!(
            chunk_id = %chunk.chunk_id,
            text_offset,
            visual_offset,
            "Added multimodal chunk"
        );
        Ok((text_offset, visual_offset))
    }

    /// Similarity search against the text index
    pub fn search_text(
        &self,
        query_vector: &[f32],
        k: usize,
        score_threshold: f32,
    ) -> Result<Vec<SearchHit>> {
        let Some(index) = self.text_index.as_deref() else {
            return Ok(Vec::new());
        };
        if index.total() == 0 {
            return Ok(Vec::new());
        }

        self.check_dimension("text", self.settings.text_dimension, query_vector)?;

        let hits = index
            .search(query_vector, k)
            .map_err(ann_to_crate_error("text"))?;

        Ok(self.hydrate_hits(hits, SearchType::Text, score_threshold))
    }

    /// Similarity search against the visual index.
    ///
    /// Returns an empty list (not an error) for text-only tenants: visual
    /// search is an optional capability, not a hard failure.
    pub fn search_visual(
        &self,
        query_vector: &[f32],
        k: usize,
        score_threshold: f32,
    ) -> Result<Vec<SearchHit>> {
        if !self.settings.enable_visual_search {
            return Ok(Vec::new());
        }
        let Some(index) = self.visual_index.as_deref() else {
            return Ok(Vec::new());
        };
        if index.total() == 0 {
            return Ok(Vec::new());
        }

        self.check_dimension("visual", self.settings.visual_dimension, query_vector)?;

        let hits = index
            .search(query_vector, k)
            .map_err(ann_to_crate_error("visual"))?;

        Ok(self.hydrate_hits(hits, SearchType::Visual, score_threshold))
    }

    /// Combined multimodal search: both modalities are queried at `k * 2`
    /// candidates, unioned by chunk id, and fused with `combined_score`.
    pub fn search_combined(
        &self,
        text_query: Option<&[f32]>,
        visual_query: Option<&[f32]>,
        k: usize,
        text_weight: f32,
    ) -> Result<Vec<SearchHit>> {
        if !self.settings.enable_visual_search {
            // Fall back to plain text search for text-only tenants
            return match text_query {
                Some(query) => self.search_text(query, k, 0.0),
                None => Ok(Vec::new()),
            };
        }

        struct Candidate {
            hit: SearchHit,
            text_score: Option<f32>,
            visual_score: Option<f32>,
        }

        let mut candidates: Vec<Candidate> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        if let Some(query) = text_query {
            for hit in self.search_text(query, k * 2, 0.0)? {
                let position = candidates.len();
                positions.insert(hit.chunk_id.clone(), position);
                candidates.push(Candidate {
                    text_score: Some(hit.score),
                    visual_score: None,
                    hit,
                });
            }
        }

        if let Some(query) = visual_query {
            for hit in self.search_visual(query, k * 2, 0.0)? {
                match positions.get(&hit.chunk_id) {
                    Some(&position) => {
                        candidates[position].visual_score = Some(hit.score);
                    }
                    None => {
                        positions.insert(hit.chunk_id.clone(), candidates.len());
                        candidates.push(Candidate {
                            text_score: None,
                            visual_score: Some(hit.score),
                            hit,
                        });
                    }
                }
            }
        }

        let mut results: Vec<SearchHit> = candidates
            .into_iter()
            .map(|candidate| {
                let mut hit = candidate.hit;
                hit.score =
                    combined_score(candidate.text_score, candidate.visual_score, text_weight);
                hit.search_type = match (candidate.text_score, candidate.visual_score) {
                    (Some(_), Some(_)) => SearchType::Multimodal,
                    (Some(_), None) => SearchType::TextOnly,
                    _ => SearchType::VisualOnly,
                };
                hit
            })
            .collect();

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(k);
        Ok(results)
    }

    fn hydrate_hits(
        &self,
        hits: Vec<crate::index::ann::AnnHit>,
        search_type: SearchType,
        score_threshold: f32,
    ) -> Vec<SearchHit> {
        let mut results = Vec::with_capacity(hits.len());

        for hit in hits {
            if hit.score < score_threshold {
                continue;
            }

            let chunk_id = match search_type {
                SearchType::Visual => self.mappings.chunk_for_visual_offset(hit.offset),
                _ => self.mappings.chunk_for_text_offset(hit.offset),
            };

            // A missing mapping or record is a stale offset; skip the hit
            // rather than failing the whole query.
            let Some(chunk_id) = chunk_id else {
                warn!(
                    client_id = %self.client_id,
                    offset = hit.offset,
                    ?search_type,
                    "Search hit has no live mapping, skipping"
                );
                continue;
            };
            let Some(record) = self.store.get(chunk_id) else {
                warn!(
                    client_id = %self.client_id,
                    chunk_id,
                    "Mapped chunk has no metadata record, skipping"
                );
                continue;
            };

            results.push(SearchHit {
                chunk_id: record.chunk_id.clone(),
                score: hit.score,
                search_type,
                text: record.text.clone(),
                source_file: record.source_file.clone(),
                metadata: record.metadata.clone(),
            });
        }

        results
    }

    /// Remove chunks by id and rebuild the indices from the survivors.
    ///
    /// ANN indices have no random delete, so removal rebuilds fresh indices
    /// from the surviving chunks in their original insertion order and
    /// regenerates every offset and mapping. O(surviving vectors) - callers
    /// should batch removals rather than loop over single ids.
    pub fn remove_chunks(&mut self, chunk_ids: &[String]) -> Result<usize> {
        let mut removed = 0usize;
        for chunk_id in chunk_ids {
            if self.store.remove(chunk_id).is_some() {
                self.mappings.remove(chunk_id);
                removed += 1;
            }
        }

        if removed == 0 {
            return Ok(0);
        }

        info!(
            client_id = %self.client_id,
            removed,
            survivors = self.store.len(),
            "Rebuilding indices after removal"
        );
        self.rebuild()?;
        Ok(removed)
    }

    /// Rebuild all indices from the surviving metadata records, renumbering
    /// offsets and regenerating mappings from scratch
    fn rebuild(&mut self) -> Result<()> {
        let old_text = self.text_index.take();
        let old_visual = self.visual_index.take();

        // (chunk_id, old text offset, old visual offset) in insertion order
        let survivors: Vec<(String, usize, Option<usize>)> = self
            .store
            .in_insertion_order()
            .iter()
            .map(|record| (record.chunk_id.clone(), record.text_offset, record.visual_offset))
            .collect();

        self.mappings.clear();

        let mut new_text = build_index(
            self.settings.kind,
            self.settings.text_dimension,
            &self.settings.hnsw_params,
        )
        .map_err(ann_to_crate_error("text"))?;
        let mut new_visual = match old_visual.as_ref() {
            Some(_) => Some(
                build_index(
                    self.settings.kind,
                    self.settings.visual_dimension,
                    &self.settings.hnsw_params,
                )
                .map_err(ann_to_crate_error("visual"))?,
            ),
            None => None,
        };

        for (chunk_id, old_text_offset, old_visual_offset) in survivors {
            let text_vector = old_text
                .as_deref()
                .and_then(|index| index.reconstruct(old_text_offset))
                .ok_or(MmIndexError::OffsetIntegrity {
                    modality: "text",
                    offset: old_text_offset,
                    total: old_text.as_deref().map_or(0, |index| index.total()),
                })?;

            let text_offset = new_text
                .add_batch(&[text_vector])
                .map_err(ann_to_crate_error("text"))?;

            let visual_offset = match old_visual_offset {
                Some(old_offset) => {
                    let visual_vector = old_visual
                        .as_deref()
                        .and_then(|index| index.reconstruct(old_offset))
                        .ok_or(MmIndexError::OffsetIntegrity {
                            modality: "visual",
                            offset: old_offset,
                            total: old_visual.as_deref().map_or(0, |index| index.total()),
                        })?;
                    let visual_index =
                        new_visual
                            .as_mut()
                            .ok_or(MmIndexError::OffsetIntegrity {
                                modality: "visual",
                                offset: old_offset,
                                total: 0,
                            })?;
                    let offset = visual_index
                        .add_batch(&[visual_vector])
                        .map_err(ann_to_crate_error("visual"))?;
                    Some(offset)
                }
                None => None,
            };

            self.store.set_offsets(&chunk_id, text_offset, visual_offset);
            match visual_offset {
                Some(visual) => self.mappings.insert_multimodal(&chunk_id, text_offset, visual),
                None => self.mappings.insert_text(&chunk_id, text_offset),
            }
        }

        self.text_index = Some(new_text);
        self.visual_index = new_visual;
        Ok(())
    }

    /// Metadata-only query: all chunks from one source file
    pub fn get_chunks_by_source(&self, source_file: &str) -> Vec<ChunkRecord> {
        self.store
            .by_source(source_file)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Metadata-only query: every indexed chunk
    pub fn get_all_chunks(&self) -> Vec<ChunkRecord> {
        self.store.all().cloned().collect()
    }

    /// Reconstruct the stored visual vector for a chunk
    pub fn get_visual_vector(&self, chunk_id: &str) -> Option<Vec<f32>> {
        let record = self.store.get(chunk_id)?;
        let visual_offset = record.visual_offset?;
        self.visual_index
            .as_deref()
            .and_then(|index| index.reconstruct(visual_offset))
    }

    /// Find chunks visually similar to an already-indexed chunk, excluding
    /// the chunk itself
    pub fn similar_to(&self, chunk_id: &str, k: usize) -> Result<Vec<SearchHit>> {
        let Some(visual_vector) = self.get_visual_vector(chunk_id) else {
            return Ok(Vec::new());
        };

        let mut results = self.search_visual(&visual_vector, k + 1, 0.0)?;
        results.retain(|hit| hit.chunk_id != chunk_id);
        results.truncate(k);
        Ok(results)
    }

    /// Check that every mapped offset references a live vector
    pub fn verify_integrity(&self) -> Result<()> {
        self.mappings.verify(self.text_total(), self.visual_total())
    }

    /// Aggregate statistics for this tenant
    pub fn statistics(&self) -> IndexStatistics {
        let mut sources: HashMap<String, usize> = HashMap::new();
        let mut categories: HashMap<String, usize> = HashMap::new();
        let mut file_types: HashMap<String, usize> = HashMap::new();
        let mut multimodal_chunks = 0usize;

        for record in self.store.all() {
            *sources.entry(record.source_file.clone()).or_insert(0) += 1;

            let category = record
                .metadata
                .get("category")
                .and_then(|value| value.as_str())
                .unwrap_or("uncategorized");
            *categories.entry(category.to_string()).or_insert(0) += 1;

            let file_type = record
                .metadata
                .get("file_type")
                .and_then(|value| value.as_str())
                .unwrap_or("unknown");
            *file_types.entry(file_type.to_string()).or_insert(0) += 1;

            if record.has_visual_vector {
                multimodal_chunks += 1;
            }
        }

        let total_chunks = self.store.len();

        IndexStatistics {
            status: if self.is_initialized() {
                "ready"
            } else {
                "not_initialized"
            },
            client_id: self.client_id.clone(),
            enable_visual_search: self.settings.enable_visual_search,
            text_dimension: self.settings.text_dimension,
            visual_dimension: self.settings.visual_dimension,
            text_vectors: self.text_total(),
            visual_vectors: self.visual_total(),
            total_chunks,
            multimodal_chunks,
            sources_distribution: sources,
            categories_distribution: categories,
            file_types_distribution: file_types,
            visual_content_ratio: if total_chunks > 0 {
                multimodal_chunks as f32 / total_chunks as f32
            } else {
                0.0
            },
        }
    }

    /// Drop all in-memory state for this tenant
    pub fn clear(&mut self) {
        warn!(client_id = %self.client_id, "Clearing all tenant index data");
        self.text_index = None;
        self.visual_index = None;
        self.store.clear();
        self.mappings.clear();
    }
}

fn ann_to_crate_error(
    modality: &'static str,
) -> impl Fn(crate::index::ann::AnnIndexError) -> MmIndexError {
    move |error| match error {
        crate::index::ann::AnnIndexError::InvalidDimension { expected, actual } => {
            MmIndexError::DimensionMismatch {
                modality,
                expected,
                actual,
            }
        }
        other => MmIndexError::Config(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(visual: bool) -> IndexSettings {
        IndexSettings {
            model_name: "all-MiniLM-L6-v2".to_string(),
            kind: IndexKind::Flat,
            enable_visual_search: visual,
            text_dimension: 4,
            visual_dimension: 3,
            hnsw_params: HnswParams::default(),
        }
    }

    fn chunk(id: &str, source: &str, index: usize) -> TextChunk {
        TextChunk {
            chunk_id: id.to_string(),
            text: format!("text of {}", id),
            source_file: source.to_string(),
            chunk_index: index,
            metadata: HashMap::new(),
            start_char: 0,
            end_char: 10,
        }
    }

    fn unit(dimension: usize, axis: usize) -> Vec<f32> {
        let mut v = vec![0.0; dimension];
        v[axis] = 1.0;
        v
    }

    #[test]
    fn test_add_and_search_text() {
        let mut manager = MultimodalIndexManager::new("tenant", settings(false));
        manager.add_text_chunk(&chunk("a", "doc.pdf", 0), unit(4, 0)).unwrap();
        manager.add_text_chunk(&chunk("b", "doc.pdf", 1), unit(4, 1)).unwrap();

        let hits = manager.search_text(&unit(4, 0), 2, 0.0).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk_id, "a");
        assert_eq!(hits[0].search_type, SearchType::Text);
        assert!((hits[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_dimension_settings_rejected_on_first_add() {
        let mut zero = settings(false);
        zero.text_dimension = 0;
        let mut manager = MultimodalIndexManager::new("tenant", zero);

        assert!(manager
            .add_text_chunk(&chunk("a", "doc.pdf", 0), Vec::new())
            .is_err());
        assert_eq!(manager.text_total(), 0);
    }

    #[test]
    fn test_search_uninitialized_returns_empty() {
        let manager = MultimodalIndexManager::new("tenant", settings(false));
        assert!(manager.search_text(&unit(4, 0), 5, 0.0).unwrap().is_empty());
    }

    #[test]
    fn test_visual_search_in_text_only_mode_is_empty() {
        let mut manager = MultimodalIndexManager::new("tenant", settings(false));
        manager.add_text_chunk(&chunk("a", "doc.pdf", 0), unit(4, 0)).unwrap();

        let hits = manager.search_visual(&unit(3, 0), 5, 0.0).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let mut manager = MultimodalIndexManager::new("tenant", settings(false));
        let result = manager.add_text_chunk(&chunk("a", "doc.pdf", 0), unit(3, 0));
        assert!(matches!(
            result,
            Err(MmIndexError::DimensionMismatch { modality: "text", expected: 4, actual: 3 })
        ));
        assert_eq!(manager.text_total(), 0);
    }

    #[test]
    fn test_multimodal_requires_visual_mode() {
        let mut manager = MultimodalIndexManager::new("tenant", settings(false));
        let result =
            manager.add_multimodal_chunk(&chunk("a", "img.jpg", 0), unit(4, 0), unit(3, 0));
        assert!(result.is_err());
    }

    #[test]
    fn test_bad_visual_vector_leaves_no_orphan() {
        let mut manager = MultimodalIndexManager::new("tenant", settings(true));
        let result =
            manager.add_multimodal_chunk(&chunk("a", "img.jpg", 0), unit(4, 0), unit(5, 0));
        assert!(result.is_err());
        assert_eq!(manager.text_total(), 0);
        assert_eq!(manager.visual_total(), 0);
    }

    #[test]
    fn test_combined_score_weighting() {
        assert!((combined_score(Some(0.8), Some(0.4), 0.5) - 0.6).abs() < 1e-6);
        // w=1 reduces to the text score, w=0 to the visual score
        assert!((combined_score(Some(0.8), Some(0.4), 1.0) - 0.8).abs() < 1e-6);
        assert!((combined_score(Some(0.8), Some(0.4), 0.0) - 0.4).abs() < 1e-6);
        // Single-modality evidence gets only its weighted share
        assert!((combined_score(Some(0.8), None, 0.5) - 0.4).abs() < 1e-6);
        assert!((combined_score(None, Some(0.8), 0.5) - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_search_combined_prefers_agreement() {
        let mut manager = MultimodalIndexManager::new("tenant", settings(true));
        manager
            .add_multimodal_chunk(&chunk("both", "img.jpg", 0), unit(4, 0), unit(3, 0))
            .unwrap();
        manager.add_text_chunk(&chunk("text", "doc.pdf", 0), unit(4, 0)).unwrap();

        let hits = manager
            .search_combined(Some(&unit(4, 0)), Some(&unit(3, 0)), 2, 0.5)
            .unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk_id, "both");
        assert_eq!(hits[0].search_type, SearchType::Multimodal);
        assert_eq!(hits[1].chunk_id, "text");
        assert_eq!(hits[1].search_type, SearchType::TextOnly);
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn test_remove_rebuilds_and_renumbers() {
        let mut manager = MultimodalIndexManager::new("tenant", settings(false));
        manager.add_text_chunk(&chunk("a", "doc.pdf", 0), unit(4, 0)).unwrap();
        manager.add_text_chunk(&chunk("b", "doc.pdf", 1), unit(4, 1)).unwrap();
        manager.add_text_chunk(&chunk("c", "doc.pdf", 2), unit(4, 2)).unwrap();

        let removed = manager.remove_chunks(&["b".to_string()]).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(manager.text_total(), 2);
        manager.verify_integrity().unwrap();

        // Survivors keep their relative order and stay searchable
        let hits = manager.search_text(&unit(4, 2), 1, 0.0).unwrap();
        assert_eq!(hits[0].chunk_id, "c");

        let record = manager.get_all_chunks();
        let c = record.iter().find(|r| r.chunk_id == "c").unwrap();
        assert_eq!(c.text_offset, 1);
    }

    #[test]
    fn test_remove_empty_set_is_noop() {
        let mut manager = MultimodalIndexManager::new("tenant", settings(false));
        manager.add_text_chunk(&chunk("a", "doc.pdf", 0), unit(4, 0)).unwrap();

        let before = manager.search_text(&unit(4, 0), 1, 0.0).unwrap();
        let removed = manager.remove_chunks(&[]).unwrap();
        let after = manager.search_text(&unit(4, 0), 1, 0.0).unwrap();

        assert_eq!(removed, 0);
        assert_eq!(before[0].chunk_id, after[0].chunk_id);
        assert_eq!(before[0].score, after[0].score);
    }

    #[test]
    fn test_remove_all_empties_indices() {
        let mut manager = MultimodalIndexManager::new("tenant", settings(true));
        manager
            .add_multimodal_chunk(&chunk("a", "img.jpg", 0), unit(4, 0), unit(3, 0))
            .unwrap();
        manager.add_text_chunk(&chunk("b", "doc.pdf", 0), unit(4, 1)).unwrap();

        manager
            .remove_chunks(&["a".to_string(), "b".to_string()])
            .unwrap();

        assert_eq!(manager.text_total(), 0);
        assert_eq!(manager.visual_total(), 0);
        assert!(manager.get_all_chunks().is_empty());
        manager.verify_integrity().unwrap();
    }

    #[test]
    fn test_remove_multimodal_renumbers_both_modalities() {
        let mut manager = MultimodalIndexManager::new("tenant", settings(true));
        manager
            .add_multimodal_chunk(&chunk("a", "one.jpg", 0), unit(4, 0), unit(3, 0))
            .unwrap();
        manager
            .add_multimodal_chunk(&chunk("b", "two.jpg", 0), unit(4, 1), unit(3, 1))
            .unwrap();
        manager
            .add_multimodal_chunk(&chunk("c", "three.jpg", 0), unit(4, 2), unit(3, 2))
            .unwrap();

        manager.remove_chunks(&["a".to_string()]).unwrap();

        assert_eq!(manager.text_total(), 2);
        assert_eq!(manager.visual_total(), 2);
        manager.verify_integrity().unwrap();

        let hits = manager.search_visual(&unit(3, 2), 1, 0.0).unwrap();
        assert_eq!(hits[0].chunk_id, "c");
    }

    #[test]
    fn test_similar_to_excludes_self() {
        let mut manager = MultimodalIndexManager::new("tenant", settings(true));
        manager
            .add_multimodal_chunk(&chunk("a", "one.jpg", 0), unit(4, 0), vec![1.0, 0.0, 0.0])
            .unwrap();
        manager
            .add_multimodal_chunk(&chunk("b", "two.jpg", 0), unit(4, 1), vec![0.9, 0.1, 0.0])
            .unwrap();

        let similar = manager.similar_to("a", 5).unwrap();
        assert_eq!(similar.len(), 1);
        assert_eq!(similar[0].chunk_id, "b");
    }

    #[test]
    fn test_statistics() {
        let mut manager = MultimodalIndexManager::new("tenant", settings(true));

        let mut with_category = chunk("a", "doc.pdf", 0);
        with_category
            .metadata
            .insert("category".to_string(), serde_json::json!("geology"));
        manager.add_text_chunk(&with_category, unit(4, 0)).unwrap();
        manager
            .add_multimodal_chunk(&chunk("b", "img.jpg", 0), unit(4, 1), unit(3, 0))
            .unwrap();

        let stats = manager.statistics();
        assert_eq!(stats.status, "ready");
        assert_eq!(stats.total_chunks, 2);
        assert_eq!(stats.multimodal_chunks, 1);
        assert_eq!(stats.text_vectors, 2);
        assert_eq!(stats.visual_vectors, 1);
        assert_eq!(stats.categories_distribution["geology"], 1);
        assert!((stats.visual_content_ratio - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_score_threshold_filters_hits() {
        let mut manager = MultimodalIndexManager::new("tenant", settings(false));
        manager.add_text_chunk(&chunk("a", "doc.pdf", 0), unit(4, 0)).unwrap();
        manager.add_text_chunk(&chunk("b", "doc.pdf", 1), unit(4, 1)).unwrap();

        let hits = manager.search_text(&unit(4, 0), 5, 0.5).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk_id, "a");
    }
}
