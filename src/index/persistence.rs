//! Tenant index persistence
//!
//! Each tenant owns one directory under the clients root:
//!
//! ```text
//! <clients_dir>/<client_id>/
//!     metadata.json       chunk records (arbitrary metadata values, so JSON)
//!     mappings.json       offset mappings
//!     index.bin           text index snapshot (text-only tenants)
//!     text_index.bin      text index snapshot (multimodal tenants)
//!     visual_index.bin    visual index snapshot (multimodal tenants)
//!     config.json         descriptor, written last as the completion marker
//! ```
//!
//! The descriptor is the source of truth on load: the file set is derived
//! from its recorded mode, and any missing file is reported as an incomplete
//! persistence error rather than silently degraded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{MmIndexError, Result};
use crate::index::ann::{restore_index, AnnIndex, IndexSnapshot};
use crate::index::manager::{IndexSettings, MultimodalIndexManager};
use crate::index::mappings::OffsetMappings;
use crate::index::store::MetadataStore;

const DESCRIPTOR_FILE: &str = "config.json";
const METADATA_FILE: &str = "metadata.json";
const MAPPINGS_FILE: &str = "mappings.json";
const TEXT_ONLY_INDEX_FILE: &str = "index.bin";
const TEXT_INDEX_FILE: &str = "text_index.bin";
const VISUAL_INDEX_FILE: &str = "visual_index.bin";

const FORMAT_VERSION: u32 = 1;

/// Persisted per-tenant descriptor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantDescriptor {
    pub format_version: u32,
    pub client_id: String,
    pub settings: IndexSettings,
    pub text_vectors: usize,
    pub visual_vectors: usize,
    pub total_chunks: usize,
    pub saved_at: DateTime<Utc>,
}

/// Directory holding one tenant's persisted index
pub fn tenant_dir(clients_dir: &Path, client_id: &str) -> PathBuf {
    clients_dir.join(client_id)
}

/// Whether a completed persisted index exists for the tenant
pub fn tenant_exists(clients_dir: &Path, client_id: &str) -> bool {
    tenant_dir(clients_dir, client_id)
        .join(DESCRIPTOR_FILE)
        .exists()
}

fn io_context(context: impl Into<String>) -> impl FnOnce(std::io::Error) -> MmIndexError {
    let context = context.into();
    move |source| MmIndexError::Io { source, context }
}

fn json_context(context: impl Into<String>) -> impl FnOnce(serde_json::Error) -> MmIndexError {
    let context = context.into();
    move |source| MmIndexError::Json { source, context }
}

fn write_snapshot(path: &Path, snapshot: &IndexSnapshot) -> Result<()> {
    let bytes = bincode::serde::encode_to_vec(snapshot, bincode::config::standard())?;
    fs::write(path, bytes).map_err(io_context(format!("writing {}", path.display())))
}

fn read_snapshot(path: &Path) -> Result<IndexSnapshot> {
    let bytes =
        fs::read(path).map_err(io_context(format!("reading {}", path.display())))?;
    let (snapshot, _) = bincode::serde::decode_from_slice(&bytes, bincode::config::standard())?;
    Ok(snapshot)
}

/// Persist a manager to its tenant directory.
///
/// Data files are written first and the descriptor last, so a crash mid-save
/// never leaves a directory that passes `tenant_exists` but fails to load.
pub fn save_manager(clients_dir: &Path, manager: &MultimodalIndexManager) -> Result<()> {
    let dir = tenant_dir(clients_dir, manager.client_id());
    fs::create_dir_all(&dir).map_err(io_context(format!("creating {}", dir.display())))?;

    let metadata_json = serde_json::to_vec(manager.store())
        .map_err(json_context("serializing metadata store"))?;
    fs::write(dir.join(METADATA_FILE), metadata_json)
        .map_err(io_context("writing metadata.json"))?;

    let mappings_json = serde_json::to_vec_pretty(manager.mappings())
        .map_err(json_context("serializing mappings"))?;
    fs::write(dir.join(MAPPINGS_FILE), mappings_json)
        .map_err(io_context("writing mappings.json"))?;

    let multimodal = manager.is_multimodal();
    if let Some(text_index) = manager.text_index() {
        let file = if multimodal {
            TEXT_INDEX_FILE
        } else {
            TEXT_ONLY_INDEX_FILE
        };
        write_snapshot(&dir.join(file), &text_index.snapshot())?;
    }
    if multimodal {
        if let Some(visual_index) = manager.visual_index() {
            write_snapshot(&dir.join(VISUAL_INDEX_FILE), &visual_index.snapshot())?;
        }
    }

    let descriptor = TenantDescriptor {
        format_version: FORMAT_VERSION,
        client_id: manager.client_id().to_string(),
        settings: manager.settings().clone(),
        text_vectors: manager.text_total(),
        visual_vectors: manager.visual_total(),
        total_chunks: manager.store().len(),
        saved_at: Utc::now(),
    };
    let descriptor_json =
        serde_json::to_vec_pretty(&descriptor).map_err(json_context("serializing descriptor"))?;
    fs::write(dir.join(DESCRIPTOR_FILE), descriptor_json)
        .map_err(io_context("writing config.json"))?;

    info!(
        client_id = %manager.client_id(),
        text_vectors = descriptor.text_vectors,
        visual_vectors = descriptor.visual_vectors,
        "Saved tenant index"
    );
    Ok(())
}

/// Load a manager from its tenant directory.
///
/// Returns `Ok(None)` when no descriptor exists (never persisted), and
/// `PersistenceIncomplete` when the descriptor exists but a file its mode
/// requires is missing.
pub fn load_manager(
    clients_dir: &Path,
    client_id: &str,
) -> Result<Option<MultimodalIndexManager>> {
    let dir = tenant_dir(clients_dir, client_id);
    let descriptor_path = dir.join(DESCRIPTOR_FILE);
    if !descriptor_path.exists() {
        return Ok(None);
    }

    let descriptor_json = fs::read(&descriptor_path)
        .map_err(io_context(format!("reading {}", descriptor_path.display())))?;
    let descriptor: TenantDescriptor = serde_json::from_slice(&descriptor_json)
        .map_err(json_context("parsing descriptor"))?;

    let multimodal = descriptor.settings.enable_visual_search;
    let text_index_file = if multimodal {
        TEXT_INDEX_FILE
    } else {
        TEXT_ONLY_INDEX_FILE
    };

    let mut required = vec![METADATA_FILE, MAPPINGS_FILE];
    if descriptor.text_vectors > 0 {
        required.push(text_index_file);
    }
    if multimodal && descriptor.visual_vectors > 0 {
        required.push(VISUAL_INDEX_FILE);
    }

    let missing: Vec<String> = required
        .iter()
        .filter(|file| !dir.join(file).exists())
        .map(|file| file.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(MmIndexError::PersistenceIncomplete {
            client_id: client_id.to_string(),
            missing,
        });
    }

    let metadata_bytes = fs::read(dir.join(METADATA_FILE))
        .map_err(io_context("reading metadata.json"))?;
    let store: MetadataStore =
        serde_json::from_slice(&metadata_bytes).map_err(json_context("parsing metadata store"))?;

    let mappings_json = fs::read(dir.join(MAPPINGS_FILE))
        .map_err(io_context("reading mappings.json"))?;
    let mappings: OffsetMappings =
        serde_json::from_slice(&mappings_json).map_err(json_context("parsing mappings"))?;

    let restore = |path: PathBuf| -> Result<Box<dyn AnnIndex>> {
        let snapshot = read_snapshot(&path)?;
        restore_index(&snapshot, &descriptor.settings.hnsw_params)
            .map_err(|e| MmIndexError::Config(format!("{}: {}", path.display(), e)))
    };

    let text_index = if descriptor.text_vectors > 0 {
        Some(restore(dir.join(text_index_file))?)
    } else {
        None
    };
    let visual_index = if multimodal && descriptor.visual_vectors > 0 {
        Some(restore(dir.join(VISUAL_INDEX_FILE))?)
    } else {
        None
    };

    let loaded_text = text_index.as_ref().map_or(0, |index| index.total());
    let loaded_visual = visual_index.as_ref().map_or(0, |index| index.total());
    if loaded_text != descriptor.text_vectors || loaded_visual != descriptor.visual_vectors {
        return Err(MmIndexError::Config(format!(
            "Snapshot vector counts for {} disagree with descriptor: {}/{} text, {}/{} visual",
            client_id, loaded_text, descriptor.text_vectors, loaded_visual,
            descriptor.visual_vectors
        )));
    }

    let manager = MultimodalIndexManager::from_parts(
        descriptor.client_id,
        descriptor.settings,
        text_index,
        visual_index,
        store,
        mappings,
    );
    manager.verify_integrity()?;

    debug!(client_id, "Loaded tenant index from disk");
    Ok(Some(manager))
}

/// Delete every persisted file for a tenant. Safe to call when nothing exists.
pub fn clear_tenant_dir(clients_dir: &Path, client_id: &str) -> Result<()> {
    let dir = tenant_dir(clients_dir, client_id);
    if dir.exists() {
        fs::remove_dir_all(&dir)
            .map_err(io_context(format!("removing {}", dir.display())))?;
        info!(client_id, "Removed persisted tenant index");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::TextChunk;
    use crate::index::ann::{HnswParams, IndexKind};
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn settings(visual: bool) -> IndexSettings {
        IndexSettings {
            model_name: "all-MiniLM-L6-v2".to_string(),
            kind: IndexKind::Flat,
            enable_visual_search: visual,
            text_dimension: 4,
            visual_dimension: 3,
            hnsw_params: HnswParams::default(),
        }
    }

    fn chunk(id: &str) -> TextChunk {
        TextChunk {
            chunk_id: id.to_string(),
            text: format!("text {}", id),
            source_file: "doc.pdf".to_string(),
            chunk_index: 0,
            metadata: HashMap::new(),
            start_char: 0,
            end_char: 6,
        }
    }

    fn unit(dimension: usize, axis: usize) -> Vec<f32> {
        let mut v = vec![0.0; dimension];
        v[axis] = 1.0;
        v
    }

    #[test]
    fn test_round_trip_text_only() {
        let dir = TempDir::new().unwrap();
        let mut manager = MultimodalIndexManager::new("acme", settings(false));
        manager.add_text_chunk(&chunk("a"), unit(4, 0)).unwrap();
        manager.add_text_chunk(&chunk("b"), unit(4, 1)).unwrap();

        let before = manager.search_text(&unit(4, 1), 2, 0.0).unwrap();
        save_manager(dir.path(), &manager).unwrap();

        // Text-only tenants persist a single index.bin
        assert!(dir.path().join("acme/index.bin").exists());
        assert!(!dir.path().join("acme/text_index.bin").exists());

        let loaded = load_manager(dir.path(), "acme").unwrap().unwrap();
        let after = loaded.search_text(&unit(4, 1), 2, 0.0).unwrap();

        assert_eq!(before.len(), after.len());
        for (b, a) in before.iter().zip(after.iter()) {
            assert_eq!(b.chunk_id, a.chunk_id);
            assert_eq!(b.score, a.score);
        }
    }

    #[test]
    fn test_round_trip_multimodal() {
        let dir = TempDir::new().unwrap();
        let mut manager = MultimodalIndexManager::new("acme", settings(true));
        manager
            .add_multimodal_chunk(&chunk("a"), unit(4, 0), unit(3, 0))
            .unwrap();
        manager.add_text_chunk(&chunk("b"), unit(4, 1)).unwrap();

        save_manager(dir.path(), &manager).unwrap();
        assert!(dir.path().join("acme/text_index.bin").exists());
        assert!(dir.path().join("acme/visual_index.bin").exists());

        let loaded = load_manager(dir.path(), "acme").unwrap().unwrap();
        assert_eq!(loaded.text_total(), 2);
        assert_eq!(loaded.visual_total(), 1);
        loaded.verify_integrity().unwrap();

        let hits = loaded.search_visual(&unit(3, 0), 1, 0.0).unwrap();
        assert_eq!(hits[0].chunk_id, "a");
    }

    #[test]
    fn test_load_missing_tenant_is_none() {
        let dir = TempDir::new().unwrap();
        assert!(load_manager(dir.path(), "nobody").unwrap().is_none());
        assert!(!tenant_exists(dir.path(), "nobody"));
    }

    #[test]
    fn test_missing_file_reports_incomplete() {
        let dir = TempDir::new().unwrap();
        let mut manager = MultimodalIndexManager::new("acme", settings(false));
        manager.add_text_chunk(&chunk("a"), unit(4, 0)).unwrap();
        save_manager(dir.path(), &manager).unwrap();

        std::fs::remove_file(dir.path().join("acme/index.bin")).unwrap();

        let result = load_manager(dir.path(), "acme");
        match result {
            Err(MmIndexError::PersistenceIncomplete { client_id, missing }) => {
                assert_eq!(client_id, "acme");
                assert_eq!(missing, vec!["index.bin".to_string()]);
            }
            other => panic!("expected PersistenceIncomplete, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_empty_manager_round_trip() {
        let dir = TempDir::new().unwrap();
        let manager = MultimodalIndexManager::new("acme", settings(true));
        save_manager(dir.path(), &manager).unwrap();

        let loaded = load_manager(dir.path(), "acme").unwrap().unwrap();
        assert_eq!(loaded.text_total(), 0);
        assert!(loaded.search_text(&unit(4, 0), 5, 0.0).unwrap().is_empty());
    }

    #[test]
    fn test_clear_tenant_dir() {
        let dir = TempDir::new().unwrap();
        let mut manager = MultimodalIndexManager::new("acme", settings(false));
        manager.add_text_chunk(&chunk("a"), unit(4, 0)).unwrap();
        save_manager(dir.path(), &manager).unwrap();

        clear_tenant_dir(dir.path(), "acme").unwrap();
        assert!(!tenant_exists(dir.path(), "acme"));
        // Clearing twice is a no-op
        clear_tenant_dir(dir.path(), "acme").unwrap();
    }
}
