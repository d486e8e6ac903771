/// Hyperplanes and the random vectors they are drawn from.
pub mod core;
/// Implementation of a locality-sensitive hashing approach to vector indexing, with buckets stored in chains of pages.
pub mod lsh;
/// Diagnostic reports describing the layout of an index.
pub mod report;
/// Sharing an index between threads.
pub mod shared;
/// Append-only page storage for bucket contents.
pub mod storage;
