//! Smart search engine
//!
//! Orchestrates a full retrieval pass over one tenant index: synonym query
//! expansion, per-variant ANN search with first-occurrence deduplication,
//! heuristic reranking, metadata filtering, and truncation. Visual and
//! combined modes route the query through the CLIP text encoder so text
//! descriptions can retrieve images.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

use super::reranker::{RankedHit, RelevanceReranker};
use crate::embedding::{EmbeddingProvider, VisualProvider};
use crate::error::{MmIndexError, Result};
use crate::index::{MultimodalIndexManager, SearchHit};

/// Which modality a search query targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// Semantic search over the text index with expansion and reranking
    Text,
    /// The query is a description of visual content; search the visual index
    VisualDescription,
    /// Fused text + visual search
    Combined,
}

/// One search request against a tenant index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    pub limit: usize,
    pub mode: SearchMode,
    /// Minimum raw similarity a candidate must reach before reranking
    #[serde(default)]
    pub min_score: f32,
    /// Metadata filters; a hit must carry every key with a matching value
    #[serde(default)]
    pub filters: HashMap<String, serde_json::Value>,
}

impl SearchQuery {
    pub fn text(query: impl Into<String>, limit: usize) -> Self {
        Self {
            query: query.into(),
            limit,
            mode: SearchMode::Text,
            min_score: 0.0,
            filters: HashMap::new(),
        }
    }

    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    pub fn with_filter(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.filters.insert(key.into(), value);
        self
    }
}

/// Searcher wiring embedding providers to the reranking pipeline
pub struct SmartSearcher {
    text_provider: Arc<dyn EmbeddingProvider>,
    visual_provider: Option<Arc<dyn VisualProvider>>,
    reranker: RelevanceReranker,
    /// Text share of the combined-mode score fusion
    text_weight: f32,
}

impl SmartSearcher {
    pub fn new(
        text_provider: Arc<dyn EmbeddingProvider>,
        visual_provider: Option<Arc<dyn VisualProvider>>,
        reranker: RelevanceReranker,
        text_weight: f32,
    ) -> Self {
        Self {
            text_provider,
            visual_provider,
            reranker,
            text_weight,
        }
    }

    /// Run a search against a tenant index
    pub fn search(
        &self,
        manager: &MultimodalIndexManager,
        query: &SearchQuery,
    ) -> Result<Vec<RankedHit>> {
        if query.query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let candidates = match query.mode {
            SearchMode::Text => self.text_candidates(manager, query)?,
            SearchMode::VisualDescription => self.visual_candidates(manager, query)?,
            SearchMode::Combined => self.combined_candidates(manager, query)?,
        };

        let mut ranked = self.reranker.rerank(&query.query, candidates);
        if !query.filters.is_empty() {
            ranked.retain(|r| matches_filters(&r.hit, &query.filters));
        }
        ranked.truncate(query.limit);

        debug!(
            client_id = %manager.client_id(),
            mode = ?query.mode,
            results = ranked.len(),
            "Search completed"
        );
        Ok(ranked)
    }

    /// Expand the query into synonym variants, search each at double depth,
    /// and keep the first occurrence of every chunk
    fn text_candidates(
        &self,
        manager: &MultimodalIndexManager,
        query: &SearchQuery,
    ) -> Result<Vec<SearchHit>> {
        let variants = self.reranker.expand_query(&query.query);
        debug!(variants = variants.len(), "Expanded query");

        let mut seen: HashSet<String> = HashSet::new();
        let mut candidates = Vec::new();

        for variant in &variants {
            let vector = self
                .text_provider
                .embed(variant)
                .map_err(|e| MmIndexError::Embedding(e.to_string()))?;
            for hit in manager.search_text(&vector, query.limit * 2, query.min_score)? {
                if seen.insert(hit.chunk_id.clone()) {
                    candidates.push(hit);
                }
            }
        }

        Ok(candidates)
    }

    fn visual_candidates(
        &self,
        manager: &MultimodalIndexManager,
        query: &SearchQuery,
    ) -> Result<Vec<SearchHit>> {
        let Some(provider) = &self.visual_provider else {
            return Err(MmIndexError::Config(
                "Visual search requires a visual embedding provider".to_string(),
            ));
        };

        let vector = provider
            .embed_text_query(&query.query)
            .map_err(|e| MmIndexError::Embedding(e.to_string()))?;
        manager.search_visual(&vector, query.limit * 2, query.min_score)
    }

    fn combined_candidates(
        &self,
        manager: &MultimodalIndexManager,
        query: &SearchQuery,
    ) -> Result<Vec<SearchHit>> {
        let text_vector = self
            .text_provider
            .embed(&query.query)
            .map_err(|e| MmIndexError::Embedding(e.to_string()))?;

        let visual_vector = match &self.visual_provider {
            Some(provider) if manager.is_multimodal() => Some(
                provider
                    .embed_text_query(&query.query)
                    .map_err(|e| MmIndexError::Embedding(e.to_string()))?,
            ),
            _ => None,
        };

        let mut hits = manager.search_combined(
            Some(&text_vector),
            visual_vector.as_deref(),
            query.limit * 2,
            self.text_weight,
        )?;
        hits.retain(|hit| hit.score >= query.min_score);
        Ok(hits)
    }
}

/// Metadata filter match: every filter key must exist in the hit metadata
/// and match. A list filter value means membership; a missing key excludes
/// the hit.
pub fn matches_filters(hit: &SearchHit, filters: &HashMap<String, serde_json::Value>) -> bool {
    filters.iter().all(|(key, expected)| {
        let Some(actual) = hit.metadata.get(key) else {
            return false;
        };
        match expected {
            serde_json::Value::Array(allowed) => allowed.contains(actual),
            other => actual == other,
        }
    })
}
