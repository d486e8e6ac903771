use super::{
    core::{Hyperplane, RandomVectorGenerator},
    report::{BucketReport, DumpReport},
    storage::Storage,
};
use crate::{
    bitvector::{self, BitVector},
    distance::{Angular, HashFamily},
    error::{IndexError, Result, MAX_BITSIZE},
    EmbeddingPrecision, ItemId,
};
use ahash::AHashMap;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Creation options for an [`Indexer`].
pub struct IndexerOptions {
    /// The seed the hyperplanes are generated from. Indices built with the same options assign vectors to the same buckets.
    pub seed: u64,
    /// The number of hyperplanes, and so the number of bits in a bucket key; between 1 and 32. More bits make smaller, more precise buckets.
    pub bitsize: usize,
    /// The number of dimensions of every vector inserted into or queried against the index.
    pub vecsize: usize,
}

impl Default for IndexerOptions {
    fn default() -> Self {
        Self {
            seed: 0,
            bitsize: 16,
            vecsize: 128,
        }
    }
}

impl IndexerOptions {
    /// Check that the options describe a usable index.
    pub fn validate(&self) -> Result<()> {
        match self.bitsize {
            1..=MAX_BITSIZE => Ok(()),
            bitsize => Err(IndexError::Configuration { bitsize }),
        }
    }
}

/// An implementation of [the random projection method of locality sensitive hashing (LSH)](https://en.wikipedia.org/wiki/Locality-sensitive_hashing#Random_projection) as an in-memory index.
///
/// Each vector is hashed to a bucket key of `bitsize` bits, and its identifier appended to that bucket's chain of pages.
/// A search drains whole buckets, nearest bucket key first, so results are candidates to be re-ranked by the caller.
///
/// The index is single-writer; see [`SharedIndexer`](super::shared::SharedIndexer) for a handle that may be shared across threads.
pub struct Indexer<H: HashFamily = Angular> {
    options: IndexerOptions,
    hasher: H,
    hyperplanes: Vec<Hyperplane>,
    storage: Storage,
    lookup: AHashMap<u32, usize>,
}

impl Indexer<Angular> {
    /// Construct a new [Indexer] hashing by angular distance.
    ///
    /// # Arguments
    ///
    /// * `options` - The creation options for the index.
    ///
    /// # Returns
    ///
    /// An [Indexer], or a configuration error if `options.bitsize` is not between 1 and 32.
    pub fn new(options: &IndexerOptions) -> Result<Self> {
        Self::with_hasher(options, Angular)
    }

    /// Construct a new [Indexer] hashing by angular distance.
    ///
    /// # Arguments
    ///
    /// * `seed` - The seed the hyperplanes are generated from.
    ///
    /// * `bitsize` - The number of bits in a bucket key.
    ///
    /// * `vecsize` - The number of dimensions of indexed vectors.
    pub fn with_params(seed: u64, bitsize: usize, vecsize: usize) -> Result<Self> {
        Self::new(&IndexerOptions {
            seed,
            bitsize,
            vecsize,
        })
    }
}

impl<H: HashFamily> Indexer<H> {
    /// Construct a new [Indexer] with a given hash family.
    ///
    /// # Arguments
    ///
    /// * `options` - The creation options for the index.
    ///
    /// * `hasher` - The hash family turning vectors into bucket keys.
    pub fn with_hasher(options: &IndexerOptions, hasher: H) -> Result<Self> {
        options.validate()?;
        let hyperplanes = RandomVectorGenerator::new(options.seed, options.vecsize)
            .take(options.bitsize)
            .map(|coefficients| Hyperplane { coefficients })
            .collect();
        info!(
            seed = options.seed,
            bitsize = options.bitsize,
            vecsize = options.vecsize,
            "created index"
        );
        Ok(Self {
            options: options.clone(),
            hasher,
            hyperplanes,
            storage: Storage::default(),
            lookup: AHashMap::new(),
        })
    }

    /// The options the index was created with.
    pub fn options(&self) -> &IndexerOptions {
        &self.options
    }

    /// The hyperplanes selecting the index's hash function, in bit order.
    pub fn hyperplanes(&self) -> &[Hyperplane] {
        &self.hyperplanes
    }

    /// The bucket code of a vector; mainly for debugging and analysis.
    pub fn bit_vector(&self, vector: &[EmbeddingPrecision]) -> BitVector {
        self.hasher.compute_hash(&self.hyperplanes, vector)
    }

    fn bucket_key(&self, vector: &[EmbeddingPrecision]) -> u32 {
        self.bit_vector(vector).to_u32()
    }

    fn check_dimensions(&self, vector: &[EmbeddingPrecision]) -> Result<()> {
        match vector.len() == self.options.vecsize {
            true => Ok(()),
            false => Err(IndexError::Dimension {
                expected: self.options.vecsize,
                actual: vector.len(),
            }),
        }
    }

    fn insert(&mut self, id: ItemId, key: u32) -> Result<()> {
        let head = match self.lookup.get(&key) {
            Some(head) => *head,
            None => {
                let head = self.storage.allocate_page()?;
                self.lookup.insert(key, head);
                debug!(key, page = head, "created bucket");
                head
            }
        };
        self.storage.add(id, head)?;
        Ok(())
    }

    /// Adds a vector to the index.
    ///
    /// The vector's dimensionality is not checked; a vector of the wrong length is hashed to an arbitrary bucket.
    ///
    /// # Arguments
    ///
    /// * `id` - The identifier returned by searches that reach this vector's bucket. Duplicates are allowed.
    ///
    /// * `vector` - The vector to index.
    pub fn add(&mut self, id: ItemId, vector: &[EmbeddingPrecision]) -> Result<()> {
        let key = self.bucket_key(vector);
        self.insert(id, key)
    }

    /// Adds a vector to the index, first checking that it has as many dimensions as the index.
    pub fn try_add(&mut self, id: ItemId, vector: &[EmbeddingPrecision]) -> Result<()> {
        self.check_dimensions(vector)?;
        self.add(id, vector)
    }

    /// Adds many vectors to the index.
    ///
    /// Vectors are hashed in parallel and then stored in the order given, leaving the index as if [`add`](Self::add) had been called for each in turn.
    ///
    /// # Arguments
    ///
    /// * `records` - Pairs of identifiers and the vectors to index under them.
    pub fn add_batch<V>(&mut self, records: &[(ItemId, V)]) -> Result<()>
    where
        H: Sync,
        V: AsRef<[EmbeddingPrecision]> + Sync,
    {
        let keys: Vec<(ItemId, u32)> = records
            .par_iter()
            .map(|(id, vector)| (*id, self.bucket_key(vector.as_ref())))
            .collect();
        for (id, key) in keys {
            self.insert(id, key)?;
        }
        Ok(())
    }

    /// Perform an approximate nearest neighbours search.
    ///
    /// Buckets are visited by increasing Hamming distance between their key and the query's, and every item in a visited bucket is returned.
    /// Visiting stops once at least `limit` items are collected and the next bucket is further away than the last, so all buckets at the final distance are included and the result may hold more than `limit` items.
    /// Buckets at distance zero from the query are always drained, even when `limit` is zero.
    ///
    /// # Arguments
    ///
    /// * `query` - The query vector.
    ///
    /// * `limit` - The minimum number of identifiers wanted.
    ///
    /// # Returns
    ///
    /// Identifiers in non-decreasing order of bucket distance. Order within a distance is unspecified; the caller should re-rank by true distance if it matters.
    pub fn search(&self, query: &[EmbeddingPrecision], limit: usize) -> Vec<ItemId> {
        let code = self.bit_vector(query);

        let mut keys: Vec<BitVector> = self
            .lookup
            .keys()
            .map(|key| BitVector::from_u32(*key, self.options.bitsize))
            .collect();
        bitvector::sort_by_distance_from(&code, &mut keys);

        let mut items = Vec::new();
        // The query's own tier is always drained, even for a zero limit.
        let mut last_distance = 0;
        for key in keys {
            let distance = code.hamming(&key);
            if items.len() >= limit && last_distance != distance {
                break;
            }
            last_distance = distance;

            let key = key.to_u32();
            trace!(key, distance, "draining bucket");
            if let Some(head) = self.lookup.get(&key) {
                for (_, page) in self.storage.pages(*head) {
                    items.extend_from_slice(page.items());
                }
            }
        }
        items
    }

    /// Perform an approximate nearest neighbours search, first checking that the query has as many dimensions as the index.
    pub fn try_search(&self, query: &[EmbeddingPrecision], limit: usize) -> Result<Vec<ItemId>> {
        self.check_dimensions(query)?;
        Ok(self.search(query, limit))
    }

    /// Describe the layout of the index.
    ///
    /// # Returns
    ///
    /// The hyperplanes, the pages and item count of every bucket, and how evenly items are spread across buckets.
    pub fn dump(&self) -> DumpReport {
        let mut keys: Vec<u32> = self.lookup.keys().copied().collect();
        keys.sort_unstable();

        let buckets = keys
            .into_iter()
            .map(|key| {
                let (pages, items) = self.storage.pages(self.lookup[&key]).fold(
                    (Vec::new(), 0),
                    |(mut pages, items), (position, page)| {
                        pages.push(position);
                        (pages, items + page.len())
                    },
                );
                BucketReport {
                    key,
                    bits: BitVector::from_u32(key, self.options.bitsize).to_string(),
                    pages,
                    items,
                }
            })
            .collect();

        DumpReport::new(
            self.hyperplanes
                .iter()
                .map(|h| h.coefficients.clone())
                .collect(),
            buckets,
        )
    }

    /// The number of items in the index.
    pub fn len(&self) -> usize {
        self.lookup
            .values()
            .flat_map(|head| self.storage.pages(*head))
            .map(|(_, page)| page.len())
            .sum()
    }

    /// Whether the index holds no items.
    pub fn is_empty(&self) -> bool {
        self.lookup.is_empty()
    }

    /// The number of non-empty buckets.
    pub fn bucket_count(&self) -> usize {
        self.lookup.len()
    }

    /// The number of pages allocated across all buckets.
    pub fn page_count(&self) -> usize {
        self.storage.len()
    }
}
