use crate::config::Config;
use crate::error::{MmIndexError, Result, ValidationError};

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_storage(config, &mut errors);
        Self::validate_embedding(config, &mut errors);
        Self::validate_index(config, &mut errors);
        Self::validate_chunking(config, &mut errors);
        Self::validate_retrieval(config, &mut errors);
        Self::validate_cache(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(MmIndexError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != "1.0.0" {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_storage(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.storage.clients_dir.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "storage.clients_dir",
                "Clients directory path cannot be empty",
            ));
        }
    }

    fn validate_embedding(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.embedding.text_model.is_empty() {
            errors.push(ValidationError::new(
                "embedding.text_model",
                "Text model name cannot be empty",
            ));
        }

        if config.embedding.text_dimension == 0 {
            errors.push(ValidationError::new(
                "embedding.text_dimension",
                "Text dimension must be greater than 0",
            ));
        }

        if config.embedding.visual_dimension == 0 {
            errors.push(ValidationError::new(
                "embedding.visual_dimension",
                "Visual dimension must be greater than 0",
            ));
        }

        if config.embedding.batch_size == 0 {
            errors.push(ValidationError::new(
                "embedding.batch_size",
                "Batch size must be greater than 0",
            ));
        }
    }

    fn validate_index(config: &Config, errors: &mut Vec<ValidationError>) {
        let kind = &config.index.kind;
        if kind != "flat" && kind != "hnsw" {
            errors.push(ValidationError::new(
                "index.kind",
                format!("Index kind must be 'flat' or 'hnsw', got '{}'", kind),
            ));
        }

        if config.index.hnsw_ef_construction == 0 {
            errors.push(ValidationError::new(
                "index.hnsw_ef_construction",
                "HNSW ef_construction must be greater than 0",
            ));
        }

        if config.index.hnsw_m == 0 {
            errors.push(ValidationError::new(
                "index.hnsw_m",
                "HNSW M must be greater than 0",
            ));
        }

        if config.index.hnsw_ef_search == 0 {
            errors.push(ValidationError::new(
                "index.hnsw_ef_search",
                "HNSW ef_search must be greater than 0",
            ));
        }
    }

    fn validate_chunking(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.chunking.chunk_size == 0 {
            errors.push(ValidationError::new(
                "chunking.chunk_size",
                "Chunk size must be greater than 0",
            ));
        }

        if config.chunking.chunk_overlap >= config.chunking.chunk_size {
            errors.push(ValidationError::new(
                "chunking.chunk_overlap",
                "Chunk overlap must be smaller than chunk size",
            ));
        }
    }

    fn validate_retrieval(config: &Config, errors: &mut Vec<ValidationError>) {
        let r = &config.retrieval;

        for (path, weight) in [
            ("retrieval.semantic_weight", r.semantic_weight),
            ("retrieval.keyword_weight", r.keyword_weight),
            ("retrieval.text_weight", r.text_weight),
        ] {
            if !(0.0..=1.0).contains(&weight) {
                errors.push(ValidationError::new(
                    path,
                    format!("Weight must be between 0.0 and 1.0, got {}", weight),
                ));
            }
        }

        if r.min_score_threshold < 0.0 {
            errors.push(ValidationError::new(
                "retrieval.min_score_threshold",
                format!("Threshold must not be negative, got {}", r.min_score_threshold),
            ));
        }

        for (path, boost) in [
            ("retrieval.title_boost", r.title_boost),
            ("retrieval.description_boost", r.description_boost),
            ("retrieval.category_boost", r.category_boost),
        ] {
            if boost < 0.0 {
                errors.push(ValidationError::new(
                    path,
                    format!("Boost must not be negative, got {}", boost),
                ));
            }
        }
    }

    fn validate_cache(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.cache.capacity == 0 {
            errors.push(ValidationError::new(
                "cache.capacity",
                "Cache capacity must be greater than 0",
            ));
        }

        if config.cache.ttl_minutes <= 0 {
            errors.push(ValidationError::new(
                "cache.ttl_minutes",
                "Cache TTL must be greater than 0",
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_valid_config() {
        let config = Config::default();
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_empty_clients_dir() {
        let mut config = Config::default();
        config.storage.clients_dir = PathBuf::new();
        assert!(ConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_invalid_index_kind() {
        let mut config = Config::default();
        config.index.kind = "ivf".to_string();
        assert!(ConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_weight_out_of_range() {
        let mut config = Config::default();
        config.retrieval.semantic_weight = 1.5;
        assert!(ConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_negative_threshold() {
        let mut config = Config::default();
        config.retrieval.min_score_threshold = -0.1;
        assert!(ConfigValidator::validate(&config).is_err());
    }
}
