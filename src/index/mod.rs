//! Multimodal vector index
//!
//! One manager per tenant, composed of up to two ANN indices (text and
//! visual), a chunk metadata store, and the offset mappings tying vector
//! offsets to chunk identifiers. The persistence submodule round-trips the
//! whole assembly to a per-tenant directory.

pub mod ann;
pub mod manager;
pub mod mappings;
pub mod persistence;
pub mod store;

pub use ann::{AnnHit, AnnIndex, HnswParams, IndexKind, IndexSnapshot};
pub use manager::{
    combined_score, IndexSettings, IndexStatistics, MultimodalIndexManager, SearchHit, SearchType,
};
pub use mappings::{ChunkOffsets, OffsetMappings};
pub use persistence::{clear_tenant_dir, load_manager, save_manager, tenant_dir, tenant_exists};
pub use store::{ChunkRecord, MetadataStore};
