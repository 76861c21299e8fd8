//! Field-weighted keyword relevance
//!
//! Lexical overlap between the query and the hit's text, metadata fields,
//! and filename. Each field contributes the fraction of query words it
//! contains, scaled by its weight, and the sum is capped at 2.0.

use std::collections::HashSet;

use crate::index::SearchHit;

/// Per-field weights for keyword scoring
#[derive(Debug, Clone, Copy)]
pub struct FieldBoosts {
    pub title: f32,
    pub description: f32,
    pub category: f32,
}

impl Default for FieldBoosts {
    fn default() -> Self {
        Self {
            title: 1.3,
            description: 1.1,
            category: 1.2,
        }
    }
}

const TEXT_WEIGHT: f32 = 1.0;
const SOURCE_FILE_WEIGHT: f32 = 0.8;
const MAX_KEYWORD_SCORE: f32 = 2.0;

/// Compute the keyword relevance of a hit for a query, in [0, 2]
pub fn keyword_relevance(query: &str, hit: &SearchHit, boosts: &FieldBoosts) -> f32 {
    let query_words: HashSet<String> = query
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect();
    if query_words.is_empty() {
        return 0.0;
    }

    let metadata_str = |key: &str| -> Option<String> {
        hit.metadata
            .get(key)
            .and_then(|value| value.as_str())
            .map(str::to_string)
    };

    let fields: [(Option<String>, f32); 5] = [
        (Some(hit.text.clone()), TEXT_WEIGHT),
        (metadata_str("description"), boosts.description),
        (metadata_str("title"), boosts.title),
        (metadata_str("category"), boosts.category),
        (Some(hit.source_file.clone()), SOURCE_FILE_WEIGHT),
    ];

    let mut score = 0.0;
    for (field, weight) in fields {
        let Some(field) = field else { continue };
        let field_words: HashSet<String> = field
            .to_lowercase()
            .split_whitespace()
            .map(str::to_string)
            .collect();
        let matches = query_words.intersection(&field_words).count();
        if matches > 0 {
            score += (matches as f32 / query_words.len() as f32) * weight;
        }
    }

    score.min(MAX_KEYWORD_SCORE)
}
