use crate::{Embedding, EmbeddingPrecision};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use simsimd::SpatialSimilarity;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A hyperplane passing through the origin; a hyperplane is a generalisation of a line (which has one dimension) or plane (which has two dimensions).
///
/// It is defined by the set of points whose dot product with its normal vector equals zero.
pub struct Hyperplane {
    /// The vector normal to the hyperplane.
    pub coefficients: Embedding,
}

impl Hyperplane {
    /// Calculates if a point is 'above' the hyperplane.
    ///
    /// A point is 'above' a hyperplane when it is pointing in the same direction as the hyperplane's normal vector. Points lying on the hyperplane count as above it.
    ///
    /// # Arguments
    ///
    /// * `point` - The point which may be above, on, or below the hyperplane.
    ///
    /// # Returns
    ///
    /// If the given point is above the hyperplane.
    pub fn point_is_above(&self, point: &[EmbeddingPrecision]) -> bool {
        EmbeddingPrecision::dot(self.coefficients.as_slice(), point).unwrap_or_default() >= 0.0
    }
}

/// A deterministic, unbounded source of random vectors.
///
/// Two generators built with the same seed and dimensionality yield the same sequence of vectors.
/// Components are drawn from the standard normal distribution, so the direction of each vector is uniform over the unit sphere.
pub struct RandomVectorGenerator {
    rng: StdRng,
    dimensions: usize,
}

impl RandomVectorGenerator {
    /// Construct a new [RandomVectorGenerator].
    ///
    /// # Arguments
    ///
    /// * `seed` - The seed of the underlying random number generator.
    ///
    /// * `dimensions` - The number of components in each generated vector.
    pub fn new(seed: u64, dimensions: usize) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            dimensions,
        }
    }
}

impl Iterator for RandomVectorGenerator {
    type Item = Embedding;

    fn next(&mut self) -> Option<Self::Item> {
        Some(
            (0..self.dimensions)
                .map(|_| self.rng.sample::<EmbeddingPrecision, _>(StandardNormal))
                .collect(),
        )
    }
}
