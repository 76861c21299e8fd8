//! mmindex - Multi-tenant multimodal vector index with relevance reranking
//!
//! A retrieval-augmented-generation backend core: per-tenant chunks are
//! embedded into one or two modalities (text, visual), indexed for similarity
//! search, persisted to tenant-scoped directories, and reranked with lexical
//! and intent-aware signals on top of raw similarity scores.

pub mod chunk;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod index;
pub mod ingest;
pub mod retrieval;
pub mod tenants;

pub use error::{MmIndexError, Result};
