//! Embedding capability seams
//!
//! The index core treats embedding computation as an external capability:
//! `EmbeddingProvider` turns text into fixed-length vectors, `VisualProvider`
//! turns images (or text descriptions of images) into vectors in the visual
//! embedding space. FastEmbed-backed implementations are provided for both.

mod provider;
mod visual;

pub use provider::{EmbeddingError, EmbeddingProvider, FastEmbedProvider};
pub use visual::{ClipProvider, VisualProvider};

/// Normalize a vector to unit L2 length in place.
///
/// Inner-product indices require normalized vectors for scores to behave as
/// cosine similarity; a zero vector is left untouched.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_l2_normalize() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_l2_normalize_zero_vector() {
        let mut v = vec![0.0, 0.0, 0.0];
        l2_normalize(&mut v);
        assert_eq!(v, vec![0.0, 0.0, 0.0]);
    }
}
