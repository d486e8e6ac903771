#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Fixed-length bit strings and Hamming distance.
pub mod bitvector;
/// Hash families mapping vectors to bit codes.
pub mod distance;
/// Errors raised by the index.
pub mod error;
/// The bucketed locality-sensitive hashing index.
pub mod index;

/// The data type representing a single component of an embedding vector.
pub type EmbeddingPrecision = f32;

/// An embedding vector.
pub type Embedding = Vec<EmbeddingPrecision>;

/// An opaque, caller-assigned identifier for an indexed item.
pub type ItemId = u64;

pub use bitvector::BitVector;
pub use distance::{Angular, HashFamily};
pub use error::{IndexError, Result};
pub use index::lsh::{Indexer, IndexerOptions};
pub use index::report::DumpReport;
pub use index::shared::SharedIndexer;
