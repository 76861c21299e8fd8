//! Heuristic retrieval layer
//!
//! Query expansion, intent detection, keyword relevance, score fusion, and
//! the search engine tying them to the vector index. Everything here is
//! deterministic and lexicon-driven; the only model inference in a search
//! pass is the query embedding itself.

mod engine;
mod intent;
mod lexicon;
mod relevance;
mod reranker;

pub use engine::{matches_filters, SearchMode, SearchQuery, SmartSearcher};
pub use intent::{detect_query_intent, filter_by_intent, infer_doc_type, IntentScores};
pub use lexicon::{CategoryRule, Lexicon, GENERAL_INTENT};
pub use relevance::{keyword_relevance, FieldBoosts};
pub use reranker::{RankedHit, RelevanceReranker, RerankConfig, RerankError};
