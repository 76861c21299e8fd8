//! ANN index primitive
//!
//! A vector container with append-only offsets: `add_batch` assigns
//! consecutive offsets starting at the current total, `search` returns
//! `(offset, score)` pairs sorted by descending similarity, and
//! `reconstruct` returns the stored vector for an offset. There is no
//! in-place delete; removal is handled above this layer by rebuilding a
//! fresh index from surviving vectors.

use hnsw_rs::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnnIndexError {
    #[error("Invalid dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    #[error("Unsupported index kind: {0}")]
    UnsupportedKind(String),

    #[error("Corrupt index snapshot: {0}")]
    CorruptSnapshot(String),

    #[error("Index dimension must be greater than zero")]
    ZeroDimension,
}

/// Index kind selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    /// Exact inner-product search over all stored vectors
    Flat,
    /// Approximate search over an HNSW graph
    Hnsw,
}

impl FromStr for IndexKind {
    type Err = AnnIndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "flat" => Ok(IndexKind::Flat),
            "hnsw" => Ok(IndexKind::Hnsw),
            other => Err(AnnIndexError::UnsupportedKind(other.to_string())),
        }
    }
}

/// HNSW tuning parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HnswParams {
    pub ef_construction: usize,
    pub m: usize,
    pub ef_search: usize,
}

impl Default for HnswParams {
    fn default() -> Self {
        Self {
            ef_construction: 200,
            m: 16,
            ef_search: 128,
        }
    }
}

/// A raw search hit: offset into the index plus similarity score
#[derive(Debug, Clone, Copy)]
pub struct AnnHit {
    pub offset: usize,
    pub score: f32,
}

/// Serializable snapshot of an index: the stored vectors in offset order.
/// Graph structure (for HNSW) is rebuilt on restore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSnapshot {
    pub kind: IndexKind,
    pub dimension: usize,
    /// Row-major vector data, `total * dimension` floats
    pub data: Vec<f32>,
}

/// The ANN index primitive capability
pub trait AnnIndex: Send + Sync {
    /// Index kind of this instance
    fn kind(&self) -> IndexKind;

    /// Fixed vector dimension
    fn dimension(&self) -> usize;

    /// Number of stored vectors
    fn total(&self) -> usize;

    /// Append vectors, returning the base offset assigned to the first one.
    /// Offsets are consecutive: the i-th vector gets `base + i`.
    fn add_batch(&mut self, vectors: &[Vec<f32>]) -> Result<usize, AnnIndexError>;

    /// Search for the k nearest vectors, sorted by descending score.
    /// An empty index yields an empty result, never an error.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<AnnHit>, AnnIndexError>;

    /// Return the stored vector at `offset`, or None if out of range
    fn reconstruct(&self, offset: usize) -> Option<Vec<f32>>;

    /// Snapshot the stored vectors for persistence
    fn snapshot(&self) -> IndexSnapshot;
}

/// Build an empty index of the given kind. A zero dimension is rejected
/// here, so `total()` can divide by the dimension unconditionally.
pub fn build_index(
    kind: IndexKind,
    dimension: usize,
    params: &HnswParams,
) -> Result<Box<dyn AnnIndex>, AnnIndexError> {
    if dimension == 0 {
        return Err(AnnIndexError::ZeroDimension);
    }
    Ok(match kind {
        IndexKind::Flat => Box::new(FlatIpIndex::new(dimension)),
        IndexKind::Hnsw => Box::new(HnswIndex::new(dimension, params.clone())),
    })
}

/// Restore an index from a snapshot, rebuilding graph structure if needed
pub fn restore_index(
    snapshot: &IndexSnapshot,
    params: &HnswParams,
) -> Result<Box<dyn AnnIndex>, AnnIndexError> {
    if snapshot.dimension == 0 {
        return Err(AnnIndexError::ZeroDimension);
    }
    if snapshot.data.len() % snapshot.dimension != 0 {
        return Err(AnnIndexError::CorruptSnapshot(format!(
            "Data length {} is not a multiple of dimension {}",
            snapshot.data.len(),
            snapshot.dimension
        )));
    }

    let mut index = build_index(snapshot.kind, snapshot.dimension, params)?;
    let vectors: Vec<Vec<f32>> = snapshot
        .data
        .chunks(snapshot.dimension)
        .map(|row| row.to_vec())
        .collect();
    index.add_batch(&vectors)?;
    Ok(index)
}

/// Exact inner-product index: vectors stored contiguously, search is a full
/// scan scored by dot product. Deterministic, and exact at any size.
pub struct FlatIpIndex {
    dimension: usize,
    data: Vec<f32>,
}

impl FlatIpIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            data: Vec::new(),
        }
    }

    fn row(&self, offset: usize) -> &[f32] {
        let start = offset * self.dimension;
        &self.data[start..start + self.dimension]
    }
}

impl AnnIndex for FlatIpIndex {
    fn kind(&self) -> IndexKind {
        IndexKind::Flat
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn total(&self) -> usize {
        self.data.len() / self.dimension
    }

    fn add_batch(&mut self, vectors: &[Vec<f32>]) -> Result<usize, AnnIndexError> {
        for vector in vectors {
            if vector.len() != self.dimension {
                return Err(AnnIndexError::InvalidDimension {
                    expected: self.dimension,
                    actual: vector.len(),
                });
            }
        }

        let base = self.total();
        for vector in vectors {
            self.data.extend_from_slice(vector);
        }
        Ok(base)
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<AnnHit>, AnnIndexError> {
        if query.len() != self.dimension {
            return Err(AnnIndexError::InvalidDimension {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let total = self.total();
        if total == 0 || k == 0 {
            return Ok(Vec::new());
        }

        let mut hits: Vec<AnnHit> = (0..total)
            .map(|offset| {
                let score = self
                    .row(offset)
                    .iter()
                    .zip(query.iter())
                    .map(|(a, b)| a * b)
                    .sum();
                AnnHit { offset, score }
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(k);
        Ok(hits)
    }

    fn reconstruct(&self, offset: usize) -> Option<Vec<f32>> {
        if offset < self.total() {
            Some(self.row(offset).to_vec())
        } else {
            None
        }
    }

    fn snapshot(&self) -> IndexSnapshot {
        IndexSnapshot {
            kind: IndexKind::Flat,
            dimension: self.dimension,
            data: self.data.clone(),
        }
    }
}

/// HNSW-backed index. The graph answers searches; an offset-ordered vector
/// arena beside it serves reconstruction and snapshots, since the graph
/// itself cannot return stored vectors or be rebuilt incrementally.
pub struct HnswIndex {
    dimension: usize,
    params: HnswParams,
    graph: Hnsw<'static, f32, DistCosine>,
    arena: Vec<f32>,
}

impl HnswIndex {
    pub fn new(dimension: usize, params: HnswParams) -> Self {
        let graph = Hnsw::<f32, DistCosine>::new(
            params.m,
            100_000, // expected element count hint
            16,      // max layer
            params.ef_construction,
            DistCosine,
        );

        Self {
            dimension,
            params,
            graph,
            arena: Vec::new(),
        }
    }
}

impl AnnIndex for HnswIndex {
    fn kind(&self) -> IndexKind {
        IndexKind::Hnsw
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn total(&self) -> usize {
        self.arena.len() / self.dimension
    }

    fn add_batch(&mut self, vectors: &[Vec<f32>]) -> Result<usize, AnnIndexError> {
        for vector in vectors {
            if vector.len() != self.dimension {
                return Err(AnnIndexError::InvalidDimension {
                    expected: self.dimension,
                    actual: vector.len(),
                });
            }
        }

        let base = self.total();
        for (i, vector) in vectors.iter().enumerate() {
            self.graph.insert((vector, base + i));
            self.arena.extend_from_slice(vector);
        }
        Ok(base)
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<AnnHit>, AnnIndexError> {
        if query.len() != self.dimension {
            return Err(AnnIndexError::InvalidDimension {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        if self.total() == 0 || k == 0 {
            return Ok(Vec::new());
        }

        let neighbours = self.graph.search(query, k, self.params.ef_search);

        // Cosine distance to similarity; neighbours arrive distance-ascending
        Ok(neighbours
            .into_iter()
            .map(|n| AnnHit {
                offset: n.d_id,
                score: 1.0 - n.distance,
            })
            .collect())
    }

    fn reconstruct(&self, offset: usize) -> Option<Vec<f32>> {
        if offset < self.total() {
            let start = offset * self.dimension;
            Some(self.arena[start..start + self.dimension].to_vec())
        } else {
            None
        }
    }

    fn snapshot(&self) -> IndexSnapshot {
        IndexSnapshot {
            kind: IndexKind::Hnsw,
            dimension: self.dimension,
            data: self.arena.clone(),
        }
    }
}
