//! Heuristic relevance reranker
//!
//! Takes ANN hits and re-scores them with a fusion of the semantic score,
//! field-weighted keyword overlap, and query-intent match, then filters by a
//! minimum threshold and re-sorts. Purely lexical and deterministic: no
//! model inference happens here.

use thiserror::Error;
use tracing::debug;

use super::intent::{detect_query_intent, filter_by_intent};
use super::lexicon::Lexicon;
use super::relevance::{keyword_relevance, FieldBoosts};
use crate::index::SearchHit;

#[derive(Error, Debug)]
pub enum RerankError {
    #[error("Invalid rerank config: {0}")]
    InvalidConfig(String),
}

/// Fusion weights and threshold for the reranker
#[derive(Debug, Clone)]
pub struct RerankConfig {
    pub semantic_weight: f32,
    pub keyword_weight: f32,
    pub intent_weight: f32,
    pub min_score_threshold: f32,
    pub boosts: FieldBoosts,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            semantic_weight: 0.7,
            keyword_weight: 0.3,
            intent_weight: 0.3,
            min_score_threshold: 0.3,
            boosts: FieldBoosts::default(),
        }
    }
}

impl RerankConfig {
    pub fn validate(&self) -> Result<(), RerankError> {
        for (name, value) in [
            ("semantic_weight", self.semantic_weight),
            ("keyword_weight", self.keyword_weight),
            ("intent_weight", self.intent_weight),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(RerankError::InvalidConfig(format!(
                    "{} must be in [0, 1], got {}",
                    name, value
                )));
            }
        }
        if self.min_score_threshold < 0.0 {
            return Err(RerankError::InvalidConfig(format!(
                "min_score_threshold must be non-negative, got {}",
                self.min_score_threshold
            )));
        }
        Ok(())
    }
}

/// A hit with its fused score and the components that produced it
#[derive(Debug, Clone)]
pub struct RankedHit {
    pub hit: SearchHit,
    pub semantic_score: f32,
    pub keyword_score: f32,
    pub intent_score: f32,
    pub combined_score: f32,
}

/// Deterministic reranker over a domain lexicon
pub struct RelevanceReranker {
    config: RerankConfig,
    lexicon: Lexicon,
}

impl RelevanceReranker {
    pub fn new(config: RerankConfig, lexicon: Lexicon) -> Result<Self, RerankError> {
        config.validate()?;
        Ok(Self { config, lexicon })
    }

    pub fn with_defaults() -> Self {
        Self {
            config: RerankConfig::default(),
            lexicon: Lexicon::default(),
        }
    }

    pub fn lexicon(&self) -> &Lexicon {
        &self.lexicon
    }

    /// Expand a query into synonym variants (original query first)
    pub fn expand_query(&self, query: &str) -> Vec<String> {
        self.lexicon.expand_query(query)
    }

    /// Rerank hits for a query: intent filter, score fusion, threshold, sort
    pub fn rerank(&self, query: &str, hits: Vec<SearchHit>) -> Vec<RankedHit> {
        let candidate_count = hits.len();
        let intent = detect_query_intent(&self.lexicon, query);
        let survivors = filter_by_intent(&self.lexicon, &intent, hits);

        let mut ranked: Vec<RankedHit> = survivors
            .into_iter()
            .map(|(mut hit, intent_score)| {
                let semantic_score = hit.score;
                let keyword_score = keyword_relevance(query, &hit, &self.config.boosts);
                let combined_score = semantic_score * self.config.semantic_weight
                    + keyword_score * self.config.keyword_weight
                    + intent_score * self.config.intent_weight;
                hit.score = combined_score;
                RankedHit {
                    hit,
                    semantic_score,
                    keyword_score,
                    intent_score,
                    combined_score,
                }
            })
            .filter(|ranked| ranked.combined_score >= self.config.min_score_threshold)
            .collect();

        ranked.sort_by(|a, b| {
            b.combined_score
                .partial_cmp(&a.combined_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        debug!(
            candidates = candidate_count,
            survivors = ranked.len(),
            "Reranked search hits"
        );
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::SearchType;
    use std::collections::HashMap;

    fn hit(id: &str, score: f32, text: &str, source_file: &str) -> SearchHit {
        SearchHit {
            chunk_id: id.to_string(),
            score,
            search_type: SearchType::Text,
            text: text.to_string(),
            source_file: source_file.to_string(),
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn test_invalid_weight_rejected() {
        let config = RerankConfig {
            semantic_weight: 1.5,
            ..Default::default()
        };
        assert!(RelevanceReranker::new(config, Lexicon::default()).is_err());
    }

    #[test]
    fn test_negative_threshold_rejected() {
        let config = RerankConfig {
            min_score_threshold: -0.1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_keyword_overlap_lifts_ranking() {
        let reranker = RelevanceReranker::with_defaults();
        // Lower semantic score but strong lexical overlap with the query
        let hits = vec![
            hit("semantic", 0.9, "посторонний текст", "other.pdf"),
            hit("lexical", 0.8, "спецификация окон по этажам", "spec.pdf"),
        ];

        let ranked = reranker.rerank("спецификация окон", hits);
        assert_eq!(ranked[0].hit.chunk_id, "lexical");
        assert!(ranked[0].keyword_score > 0.0);
    }

    #[test]
    fn test_threshold_drops_weak_hits() {
        let reranker = RelevanceReranker::with_defaults();
        // 0.25 * 0.7 + 0.5 * 0.3 = 0.325: above the default threshold,
        // below a strict one
        let hits = vec![hit("weak", 0.25, "ничего общего", "misc.pdf")];

        let config = RerankConfig {
            min_score_threshold: 0.5,
            ..Default::default()
        };
        let strict = RelevanceReranker::new(config, Lexicon::default()).unwrap();
        assert!(strict.rerank("общее", hits.clone()).is_empty());
        assert_eq!(reranker.rerank("общее", hits).len(), 1);
    }

    #[test]
    fn test_combined_score_replaces_hit_score() {
        let reranker = RelevanceReranker::with_defaults();
        let ranked = reranker.rerank("окна", vec![hit("a", 0.8, "окна здания", "doc.pdf")]);

        assert_eq!(ranked.len(), 1);
        let r = &ranked[0];
        assert!((r.semantic_score - 0.8).abs() < 1e-6);
        assert_eq!(r.hit.score, r.combined_score);
        let expected = 0.8 * 0.7 + r.keyword_score * 0.3 + r.intent_score * 0.3;
        assert!((r.combined_score - expected).abs() < 1e-6);
    }

    #[test]
    fn test_specific_intent_filters_hits() {
        let reranker = RelevanceReranker::with_defaults();
        let hits = vec![
            hit("geo", 0.6, "результаты изысканий", "геология_отчет.pdf"),
            hit("photo", 0.9, "фото фасада", "facade.jpg"),
        ];

        let ranked = reranker.rerank("геология грунт", hits);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].hit.chunk_id, "geo");
    }
}
