use super::{lsh::Indexer, report::DumpReport};
use crate::{distance::Angular, distance::HashFamily, error::Result, EmbeddingPrecision, ItemId};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::Arc;

/// A cloneable handle to an [`Indexer`] shared between threads.
///
/// Insertions take an exclusive lock; searches and dumps share a read lock, so they never observe a half-applied insertion.
pub struct SharedIndexer<H: HashFamily = Angular> {
    inner: Arc<RwLock<Indexer<H>>>,
}

impl<H: HashFamily> Clone for SharedIndexer<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<H: HashFamily> From<Indexer<H>> for SharedIndexer<H> {
    fn from(indexer: Indexer<H>) -> Self {
        Self::new(indexer)
    }
}

impl<H: HashFamily> SharedIndexer<H> {
    /// Share an index.
    pub fn new(indexer: Indexer<H>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(indexer)),
        }
    }

    /// See [`Indexer::add`].
    pub fn add(&self, id: ItemId, vector: &[EmbeddingPrecision]) -> Result<()> {
        self.inner.write().add(id, vector)
    }

    /// See [`Indexer::add_batch`]. The write lock is held for the whole batch.
    pub fn add_batch<V>(&self, records: &[(ItemId, V)]) -> Result<()>
    where
        H: Sync,
        V: AsRef<[EmbeddingPrecision]> + Sync,
    {
        self.inner.write().add_batch(records)
    }

    /// See [`Indexer::search`].
    pub fn search(&self, query: &[EmbeddingPrecision], limit: usize) -> Vec<ItemId> {
        self.inner.read().search(query, limit)
    }

    /// See [`Indexer::dump`].
    pub fn dump(&self) -> DumpReport {
        self.inner.read().dump()
    }

    /// See [`Indexer::len`].
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// See [`Indexer::is_empty`].
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Lock the index for reading, for several reads against the same state.
    pub fn read(&self) -> RwLockReadGuard<'_, Indexer<H>> {
        self.inner.read()
    }

    /// Lock the index for writing.
    pub fn write(&self) -> RwLockWriteGuard<'_, Indexer<H>> {
        self.inner.write()
    }
}
