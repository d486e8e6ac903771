use crate::{bitvector::BitVector, index::core::Hyperplane, EmbeddingPrecision};
use serde::{Deserialize, Serialize};

/// A family of locality-sensitive hash functions, each member selected by a set of hyperplanes.
///
/// Implementations decide how a vector's relationship to each hyperplane becomes one bit of its hash code, so that nearby vectors under some notion of distance tend to share codes.
pub trait HashFamily {
    /// Compute the hash code of a vector.
    ///
    /// # Arguments
    ///
    /// * `hyperplanes` - The hyperplanes selecting the hash function; one bit is produced per hyperplane.
    ///
    /// * `vector` - The vector to hash.
    ///
    /// # Returns
    ///
    /// A bit vector as long as `hyperplanes`.
    fn compute_hash(&self, hyperplanes: &[Hyperplane], vector: &[EmbeddingPrecision])
        -> BitVector;
}

#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize)]
/// Random projection hashing for angular (cosine) distance, also known as SimHash.
///
/// Bit `i` is set when the vector lies on or above hyperplane `i`. Vectors separated by a small angle are likely to agree on most bits.
/// Inputs are not normalised.
pub struct Angular;

impl HashFamily for Angular {
    fn compute_hash(
        &self,
        hyperplanes: &[Hyperplane],
        vector: &[EmbeddingPrecision],
    ) -> BitVector {
        let mut code = BitVector::new(hyperplanes.len());
        for (i, hyperplane) in hyperplanes.iter().enumerate() {
            if hyperplane.point_is_above(vector) {
                code.set(i);
            }
        }
        code
    }
}
