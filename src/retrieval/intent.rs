//! Query intent detection and intent-based filtering
//!
//! A query's intent distribution is a score per lexicon category plus a
//! `general` floor, max-normalized to [0, 1]. Each hit is classified into a
//! document type from its category metadata and filename, and hits whose
//! type contradicts a highly specific intent are dropped.

use std::collections::BTreeMap;

use super::lexicon::{Lexicon, GENERAL_INTENT};
use crate::index::SearchHit;

/// Max-normalized per-category intent scores for one query
#[derive(Debug, Clone)]
pub struct IntentScores {
    scores: BTreeMap<String, f32>,
}

impl IntentScores {
    /// Score for a category, 0.0 for unknown categories
    pub fn get(&self, category: &str) -> f32 {
        self.scores.get(category).copied().unwrap_or(0.0)
    }

    /// The highest score across all categories
    pub fn max(&self) -> f32 {
        self.scores.values().copied().fold(0.0, f32::max)
    }

    /// The query names category keywords explicitly, so off-category hits
    /// should be dropped rather than merely down-ranked
    pub fn is_specific(&self) -> bool {
        // With the general floor at 0.5, anything above 0.8 means at least
        // one category keyword matched and dominated.
        self.max() > 0.8
    }
}

/// Detect the intent distribution of a query.
///
/// Each category scores one point per trigger keyword found in the query,
/// then all scores are divided by the maximum so the dominant category lands
/// at exactly 1.0. A query matching no category keyword keeps only the flat
/// `general` floor of 0.5, which stays below the specificity threshold.
pub fn detect_query_intent(lexicon: &Lexicon, query: &str) -> IntentScores {
    let query_lower = query.to_lowercase();

    let mut scores: BTreeMap<String, f32> = lexicon
        .categories
        .iter()
        .map(|rule| (rule.name.clone(), 0.0))
        .collect();

    for rule in &lexicon.categories {
        let matched = rule
            .keywords
            .iter()
            .filter(|keyword| query_lower.contains(keyword.as_str()))
            .count();
        if matched > 0 {
            scores.insert(rule.name.clone(), matched as f32);
        }
    }

    scores.insert(GENERAL_INTENT.to_string(), 0.5);

    let max = scores.values().copied().fold(0.0, f32::max);
    if max > 0.5 {
        for score in scores.values_mut() {
            *score /= max;
        }
    }

    IntentScores { scores }
}

/// Classify a hit into a document type from its category metadata and
/// filename. Categories are checked in lexicon precedence order, and the
/// image-extension check runs at the `photos` position, so a drawing keyword
/// in the filename of a photo does not reclassify it.
pub fn infer_doc_type<'a>(lexicon: &'a Lexicon, hit: &SearchHit) -> &'a str {
    let category = hit
        .metadata
        .get("category")
        .and_then(|value| value.as_str())
        .unwrap_or("")
        .to_lowercase();
    let filename = hit.source_file.to_lowercase();

    let matches = |keywords: &[String]| {
        keywords
            .iter()
            .any(|keyword| category.contains(keyword.as_str()) || filename.contains(keyword.as_str()))
    };

    for rule in &lexicon.categories {
        if rule.name == "photos" {
            if lexicon.is_image_file(&hit.source_file) || matches(&rule.keywords) {
                return &rule.name;
            }
        } else if matches(&rule.keywords) {
            return &rule.name;
        }
    }

    GENERAL_INTENT
}

/// Filter hits against the query intent, returning each surviving hit with
/// its intent match score.
///
/// Hits are only dropped for specific queries; a general query keeps
/// everything and the intent score merely feeds the fused ranking.
pub fn filter_by_intent<'a>(
    lexicon: &Lexicon,
    intent: &IntentScores,
    hits: Vec<SearchHit>,
) -> Vec<(SearchHit, f32)> {
    let specific = intent.is_specific();

    hits.into_iter()
        .filter_map(|hit| {
            let doc_type = infer_doc_type(lexicon, &hit);
            let intent_match = intent.get(doc_type);
            if specific && intent_match < 0.5 {
                return None;
            }
            Some((hit, intent_match))
        })
        .collect()
}
