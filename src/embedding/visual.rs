/// Visual embedding provider trait and CLIP implementation
use super::provider::EmbeddingError;
use fastembed::{
    EmbeddingModel, ImageEmbedding, ImageEmbeddingModel, ImageInitOptions, InitOptions,
    TextEmbedding,
};
use std::path::Path;
use std::sync::Arc;

/// Trait for visual embedding providers
///
/// Covers both directions of the visual modality: embedding an image file,
/// and mapping a text description into the visual embedding space so a text
/// query can retrieve images (cross-modal search).
pub trait VisualProvider: Send + Sync {
    /// Embed an image file into the visual vector space
    fn embed_image(&self, path: &Path) -> Result<Vec<f32>, EmbeddingError>;

    /// Embed a text description into the visual vector space
    fn embed_text_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Get the visual embedding dimension
    fn dimension(&self) -> usize;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// CLIP ViT-B/32 provider over FastEmbed
///
/// Pairs the CLIP vision encoder with its text counterpart so image vectors
/// and text-query vectors land in the same 512-dimensional space.
pub struct ClipProvider {
    image_model: Arc<ImageEmbedding>,
    text_model: Arc<TextEmbedding>,
    model_name: String,
    dimension: usize,
}

impl ClipProvider {
    pub fn new() -> Result<Self, EmbeddingError> {
        tracing::info!("Initializing CLIP ViT-B/32 visual embedding models");

        let image_model = ImageEmbedding::try_new(
            ImageInitOptions::new(ImageEmbeddingModel::ClipVitB32).with_show_download_progress(true),
        )
        .map_err(|e| EmbeddingError::InitializationError(e.to_string()))?;

        let text_model = TextEmbedding::try_new(
            InitOptions::new(EmbeddingModel::ClipVitB32).with_show_download_progress(true),
        )
        .map_err(|e| EmbeddingError::InitializationError(e.to_string()))?;

        Ok(Self {
            image_model: Arc::new(image_model),
            text_model: Arc::new(text_model),
            model_name: "clip-ViT-B-32".to_string(),
            dimension: 512,
        })
    }
}

impl VisualProvider for ClipProvider {
    fn embed_image(&self, path: &Path) -> Result<Vec<f32>, EmbeddingError> {
        if !path.exists() {
            return Err(EmbeddingError::InvalidInput(format!(
                "Image file not found: {}",
                path.display()
            )));
        }

        let embeddings = self
            .image_model
            .embed(vec![path.to_path_buf()], None)
            .map_err(|e| EmbeddingError::GenerationError(e.to_string()))?;

        let embedding = embeddings.into_iter().next().ok_or_else(|| {
            EmbeddingError::GenerationError("No image embedding generated".to_string())
        })?;

        if embedding.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }

        Ok(embedding)
    }

    fn embed_text_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.is_empty() {
            return Err(EmbeddingError::InvalidInput("Empty text".to_string()));
        }

        let embeddings = self
            .text_model
            .embed(vec![text.to_string()], None)
            .map_err(|e| EmbeddingError::GenerationError(e.to_string()))?;

        let embedding = embeddings.into_iter().next().ok_or_else(|| {
            EmbeddingError::GenerationError("No text embedding generated".to_string())
        })?;

        if embedding.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }

        Ok(embedding)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
