//! Document ingestion pipeline
//!
//! Turns raw documents into indexed chunks: metadata enrichment, chunking,
//! batched text embedding, optional image embedding, and insertion into a
//! tenant index. Per-document failures are collected in the report rather
//! than aborting the batch.

use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::chunk::{DocumentChunker, TextChunk};
use crate::embedding::{l2_normalize, EmbeddingProvider, VisualProvider};
use crate::error::{MmIndexError, Result};
use crate::index::MultimodalIndexManager;

/// One document handed to the ingestor
#[derive(Debug, Clone)]
pub struct DocumentInput {
    /// Filename the chunks are attributed to
    pub source_file: String,
    /// Extracted text content (for images, the description text)
    pub text: String,
    /// Caller-supplied metadata carried onto every chunk
    pub metadata: HashMap<String, serde_json::Value>,
    /// Path to the image file, for documents with visual content
    pub image_path: Option<PathBuf>,
}

/// Outcome of one ingestion batch
#[derive(Debug, Default, Serialize)]
pub struct IngestReport {
    pub total_documents: usize,
    pub skipped: usize,
    pub chunked: usize,
    pub indexed: usize,
    pub processed_files: Vec<ProcessedFile>,
    /// (source_file, error message) for each failed document
    pub errors: Vec<(String, String)>,
}

#[derive(Debug, Serialize)]
pub struct ProcessedFile {
    pub filename: String,
    pub chunk_count: usize,
    pub characters: usize,
    pub has_visual_vector: bool,
}

/// Document ingestor for one tenant at a time
pub struct DocumentIngestor {
    chunker: DocumentChunker,
    text_provider: Arc<dyn EmbeddingProvider>,
    visual_provider: Option<Arc<dyn VisualProvider>>,
}

impl DocumentIngestor {
    pub fn new(
        chunker: DocumentChunker,
        text_provider: Arc<dyn EmbeddingProvider>,
        visual_provider: Option<Arc<dyn VisualProvider>>,
    ) -> Self {
        Self {
            chunker,
            text_provider,
            visual_provider,
        }
    }

    /// Ingest a batch of documents into a tenant index.
    ///
    /// With `update_existing` false, documents whose source file already has
    /// chunks in the index are skipped; with it true, the old chunks are
    /// removed before the new ones are added.
    pub fn ingest(
        &self,
        manager: &mut MultimodalIndexManager,
        documents: &[DocumentInput],
        update_existing: bool,
    ) -> IngestReport {
        let mut report = IngestReport {
            total_documents: documents.len(),
            ..Default::default()
        };

        for document in documents {
            if !update_existing && !manager.get_chunks_by_source(&document.source_file).is_empty()
            {
                info!(source_file = %document.source_file, "Document already indexed, skipping");
                report.skipped += 1;
                continue;
            }

            match self.ingest_document(manager, document, update_existing) {
                Ok(processed) => {
                    report.chunked += processed.chunk_count;
                    report.indexed += processed.chunk_count;
                    report.processed_files.push(processed);
                }
                Err(error) => {
                    warn!(
                        source_file = %document.source_file,
                        %error,
                        "Failed to ingest document"
                    );
                    report
                        .errors
                        .push((document.source_file.clone(), error.to_string()));
                }
            }
        }

        info!(
            indexed = report.indexed,
            skipped = report.skipped,
            errors = report.errors.len(),
            "Ingestion batch finished"
        );
        report
    }

    fn ingest_document(
        &self,
        manager: &mut MultimodalIndexManager,
        document: &DocumentInput,
        update_existing: bool,
    ) -> Result<ProcessedFile> {
        if document.text.trim().is_empty() {
            return Err(MmIndexError::Config(format!(
                "Empty text in {}",
                document.source_file
            )));
        }

        let metadata = self.enrich_metadata(manager.client_id(), document);
        let chunks = self
            .chunker
            .create_chunks(&document.text, &document.source_file, &metadata);
        if chunks.is_empty() {
            return Err(MmIndexError::Config(format!(
                "No chunks produced from {}",
                document.source_file
            )));
        }

        if update_existing {
            let existing: Vec<String> = manager
                .get_chunks_by_source(&document.source_file)
                .into_iter()
                .map(|record| record.chunk_id)
                .collect();
            if !existing.is_empty() {
                manager.remove_chunks(&existing)?;
            }
        }

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let mut text_vectors = self
            .text_provider
            .embed_batch(&texts)
            .map_err(|e| MmIndexError::Embedding(e.to_string()))?;
        for vector in &mut text_vectors {
            l2_normalize(vector);
        }

        // An image document carries one visual vector, attached to its first
        // chunk; the remaining chunks are plain text.
        let visual_vector = self.embed_image(document)?;

        let mut remaining_visual = visual_vector;
        for (chunk, text_vector) in chunks.iter().zip(text_vectors) {
            match remaining_visual.take() {
                Some(visual) => {
                    manager.add_multimodal_chunk(chunk, text_vector, visual)?;
                }
                None => {
                    manager.add_text_chunk(chunk, text_vector)?;
                }
            }
        }

        Ok(ProcessedFile {
            filename: document.source_file.clone(),
            chunk_count: chunks.len(),
            characters: document.text.chars().count(),
            has_visual_vector: manager
                .get_chunks_by_source(&document.source_file)
                .iter()
                .any(|record| record.has_visual_vector),
        })
    }

    fn embed_image(&self, document: &DocumentInput) -> Result<Option<Vec<f32>>> {
        let Some(image_path) = &document.image_path else {
            return Ok(None);
        };
        let Some(provider) = &self.visual_provider else {
            warn!(
                source_file = %document.source_file,
                "Image document without a visual provider, indexing text only"
            );
            return Ok(None);
        };

        let mut vector = provider
            .embed_image(image_path)
            .map_err(|e| MmIndexError::Embedding(e.to_string()))?;
        l2_normalize(&mut vector);
        Ok(Some(vector))
    }

    fn enrich_metadata(
        &self,
        client_id: &str,
        document: &DocumentInput,
    ) -> HashMap<String, serde_json::Value> {
        let mut metadata = document.metadata.clone();

        let file_type = document
            .source_file
            .rsplit('.')
            .next()
            .filter(|ext| *ext != document.source_file)
            .map(|ext| format!(".{}", ext.to_lowercase()))
            .unwrap_or_default();

        metadata
            .entry("category".to_string())
            .or_insert_with(|| serde_json::json!("uncategorized"));
        metadata.insert("file_type".to_string(), serde_json::json!(file_type));
        metadata.insert(
            "filename".to_string(),
            serde_json::json!(document.source_file),
        );
        metadata.insert(
            "processing_date".to_string(),
            serde_json::json!(Utc::now().to_rfc3339()),
        );
        metadata.insert("client_id".to_string(), serde_json::json!(client_id));

        metadata
    }

    /// Remove every chunk belonging to a source file. Returns the number of
    /// chunks removed.
    pub fn remove_document(
        &self,
        manager: &mut MultimodalIndexManager,
        source_file: &str,
    ) -> Result<usize> {
        let chunk_ids: Vec<String> = manager
            .get_chunks_by_source(source_file)
            .into_iter()
            .map(|record| record.chunk_id)
            .collect();
        if chunk_ids.is_empty() {
            return Ok(0);
        }
        manager.remove_chunks(&chunk_ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::EmbeddingError;
    use crate::index::{HnswParams, IndexKind, IndexSettings};

    /// Deterministic test embedder: hashes words into a fixed-size vector
    struct StubProvider {
        dimension: usize,
    }

    impl EmbeddingProvider for StubProvider {
        fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, EmbeddingError> {
            let mut vector = vec![0.0f32; self.dimension];
            for (i, byte) in text.bytes().enumerate() {
                vector[(i + byte as usize) % self.dimension] += 1.0;
            }
            l2_normalize(&mut vector);
            Ok(vector)
        }

        fn embed_batch(
            &self,
            texts: &[String],
        ) -> std::result::Result<Vec<Vec<f32>>, EmbeddingError> {
            texts.iter().map(|text| self.embed(text)).collect()
        }

        fn dimension(&self) -> usize {
            self.dimension
        }

        fn model_name(&self) -> &str {
            "stub"
        }
    }

    fn settings() -> IndexSettings {
        IndexSettings {
            model_name: "stub".to_string(),
            kind: IndexKind::Flat,
            enable_visual_search: false,
            text_dimension: 8,
            visual_dimension: 4,
            hnsw_params: HnswParams::default(),
        }
    }

    fn ingestor() -> DocumentIngestor {
        DocumentIngestor::new(
            DocumentChunker::new(200, 50),
            Arc::new(StubProvider { dimension: 8 }),
            None,
        )
    }

    fn doc(source_file: &str, text: &str) -> DocumentInput {
        DocumentInput {
            source_file: source_file.to_string(),
            text: text.to_string(),
            metadata: HashMap::new(),
            image_path: None,
        }
    }

    #[test]
    fn test_ingest_and_skip_existing() {
        let mut manager = MultimodalIndexManager::new("tenant", settings());
        let ingestor = ingestor();
        let documents = vec![doc(
            "report.pdf",
            "Длинный текст отчета о проведенных изысканиях на строительной площадке.",
        )];

        let first = ingestor.ingest(&mut manager, &documents, false);
        assert_eq!(first.errors.len(), 0);
        assert!(first.indexed > 0);

        let second = ingestor.ingest(&mut manager, &documents, false);
        assert_eq!(second.skipped, 1);
        assert_eq!(second.indexed, 0);
    }

    #[test]
    fn test_update_existing_replaces_chunks() {
        let mut manager = MultimodalIndexManager::new("tenant", settings());
        let ingestor = ingestor();

        ingestor.ingest(
            &mut manager,
            &[doc("spec.pdf", "Первая версия спецификации окон и дверей здания.")],
            false,
        );
        let before = manager.get_chunks_by_source("spec.pdf").len();

        let report = ingestor.ingest(
            &mut manager,
            &[doc("spec.pdf", "Вторая версия спецификации окон и дверей здания.")],
            true,
        );
        assert_eq!(report.skipped, 0);

        let records = manager.get_chunks_by_source("spec.pdf");
        assert_eq!(records.len(), before);
        assert!(records[0].text.contains("Вторая"));
        manager.verify_integrity().unwrap();
    }

    #[test]
    fn test_empty_document_reports_error() {
        let mut manager = MultimodalIndexManager::new("tenant", settings());
        let report = ingestor().ingest(&mut manager, &[doc("empty.pdf", "   ")], false);

        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].0, "empty.pdf");
        assert_eq!(report.indexed, 0);
    }

    #[test]
    fn test_error_does_not_abort_batch() {
        let mut manager = MultimodalIndexManager::new("tenant", settings());
        let documents = vec![
            doc("empty.pdf", ""),
            doc("good.pdf", "Нормальный документ с достаточно длинным содержимым для чанка."),
        ];

        let report = ingestor().ingest(&mut manager, &documents, false);
        assert_eq!(report.errors.len(), 1);
        assert!(report.indexed > 0);
    }

    #[test]
    fn test_metadata_enrichment() {
        let mut manager = MultimodalIndexManager::new("tenant", settings());
        ingestor().ingest(
            &mut manager,
            &[doc("survey.pdf", "Геологические изыскания площадки строительства объекта.")],
            false,
        );

        let records = manager.get_chunks_by_source("survey.pdf");
        let metadata = &records[0].metadata;
        assert_eq!(metadata["file_type"], serde_json::json!(".pdf"));
        assert_eq!(metadata["filename"], serde_json::json!("survey.pdf"));
        assert_eq!(metadata["category"], serde_json::json!("uncategorized"));
        assert_eq!(metadata["client_id"], serde_json::json!("tenant"));
    }

    #[test]
    fn test_remove_document() {
        let mut manager = MultimodalIndexManager::new("tenant", settings());
        let ingestor = ingestor();
        ingestor.ingest(
            &mut manager,
            &[doc("a.pdf", "Документ который будет удален после индексации.")],
            false,
        );

        let removed = ingestor.remove_document(&mut manager, "a.pdf").unwrap();
        assert!(removed > 0);
        assert!(manager.get_chunks_by_source("a.pdf").is_empty());
        assert_eq!(
            ingestor.remove_document(&mut manager, "a.pdf").unwrap(),
            0
        );
    }
}
