//! Configuration management for mmindex
//!
//! Handles loading, validation, and management of the TOML configuration
//! that drives tenant index creation, embedding providers, and reranking.

use crate::error::{MmIndexError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod validator;

pub use validator::ConfigValidator;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub index: IndexConfig,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub cache: CacheConfig,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
    #[serde(default = "current_timestamp")]
    pub last_modified: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Storage configuration - where tenant index directories live
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory holding one subdirectory per client_id
    pub clients_dir: PathBuf,
}

/// Embedding configuration for both modalities
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Text embedding model name (e.g., "all-MiniLM-L6-v2")
    pub text_model: String,
    /// Text embedding dimension (384 for MiniLM)
    pub text_dimension: usize,
    /// Visual embedding model name (CLIP family)
    pub visual_model: String,
    /// Visual embedding dimension (512 for CLIP ViT-B/32)
    pub visual_dimension: usize,
    /// Batch size for embedding generation
    pub batch_size: usize,
}

/// Index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Index kind: "flat" (exact inner product) or "hnsw"
    pub kind: String,
    /// HNSW construction parameter (higher = better recall, slower build)
    pub hnsw_ef_construction: usize,
    /// HNSW M parameter (number of connections per layer)
    pub hnsw_m: usize,
    /// HNSW search parameter
    pub hnsw_ef_search: usize,
}

/// Chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Target chunk size in characters
    pub chunk_size: usize,
    /// Overlap between consecutive chunks in characters
    pub chunk_overlap: usize,
}

/// Retrieval and reranking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Weight of the raw similarity score in the fused score [0,1]
    pub semantic_weight: f32,
    /// Weight of the lexical keyword score in the fused score [0,1]
    pub keyword_weight: f32,
    /// Hits with a fused score below this are dropped
    pub min_score_threshold: f32,
    /// Field boost for metadata title matches
    pub title_boost: f32,
    /// Field boost for metadata description matches
    pub description_boost: f32,
    /// Field boost for metadata category matches
    pub category_boost: f32,
    /// Weight of the text modality in combined multimodal search [0,1]
    pub text_weight: f32,
    /// Optional lexicon file overriding the built-in synonym/intent tables
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lexicon_file: Option<PathBuf>,
}

/// Tenant registry cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of resident tenant managers
    pub capacity: usize,
    /// Minutes of inactivity before a cached manager is evicted
    pub ttl_minutes: i64,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(MmIndexError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| MmIndexError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        // Apply environment variable overrides
        config.apply_env_overrides();

        // Validate configuration
        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| MmIndexError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: MMINDEX_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix("MMINDEX_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        // Simple implementation for common overrides
        match path {
            "STORAGE__CLIENTS_DIR" => {
                self.storage.clients_dir = PathBuf::from(value);
            }
            "EMBEDDING__TEXT_MODEL" => {
                self.embedding.text_model = value.to_string();
            }
            "INDEX__KIND" => {
                self.index.kind = value.to_string();
            }
            "RETRIEVAL__SEMANTIC_WEIGHT" => {
                self.retrieval.semantic_weight =
                    value.parse().map_err(|_| MmIndexError::InvalidConfigValue {
                        path: path.to_string(),
                        message: format!("Cannot parse '{}' as float", value),
                    })?;
            }
            "RETRIEVAL__KEYWORD_WEIGHT" => {
                self.retrieval.keyword_weight =
                    value.parse().map_err(|_| MmIndexError::InvalidConfigValue {
                        path: path.to_string(),
                        message: format!("Cannot parse '{}' as float", value),
                    })?;
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| MmIndexError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("mmindex").join("config.toml"))
    }

    /// Get the default data directory
    pub fn default_data_dir() -> Result<PathBuf> {
        let home_dir = dirs::home_dir()
            .ok_or_else(|| MmIndexError::Config("Cannot determine home directory".to_string()))?;

        Ok(home_dir.join(".mmindex"))
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = PathBuf::from("~/.mmindex");

        Self {
            meta: MetaConfig {
                schema_version: "1.0.0".to_string(),
                created_at: current_timestamp(),
                last_modified: current_timestamp(),
            },
            storage: StorageConfig {
                clients_dir: data_dir.join("clients"),
            },
            embedding: EmbeddingConfig {
                text_model: "all-MiniLM-L6-v2".to_string(),
                text_dimension: 384,
                visual_model: "clip-ViT-B-32".to_string(),
                visual_dimension: 512,
                batch_size: 32,
            },
            index: IndexConfig {
                kind: "flat".to_string(),
                hnsw_ef_construction: 200,
                hnsw_m: 16,
                hnsw_ef_search: 128,
            },
            chunking: ChunkingConfig {
                chunk_size: 1000,
                chunk_overlap: 200,
            },
            retrieval: RetrievalConfig {
                semantic_weight: 0.7,
                keyword_weight: 0.3,
                min_score_threshold: 0.3,
                title_boost: 1.3,
                description_boost: 1.1,
                category_boost: 1.2,
                text_weight: 0.5,
                lexicon_file: None,
            },
            cache: CacheConfig {
                capacity: 100,
                ttl_minutes: 60,
            },
        }
    }
}
