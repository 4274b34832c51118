//! Bucket row storage contract.
//!
//! A store holds one 64-bit mask per `(block, bucket)` pair in a flat sequence
//! ordered by [`RowId`]. Stores are read-only once populated, so the row count
//! is fixed when the store is opened and [`BucketStore::total_rows`] is just a
//! field read.

use crate::error::StoreError;
use crate::index::types::RowId;
use crate::index::writer::RowSink;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Read access to persisted bucket rows
pub trait BucketStore: Send + Sync {
    /// Number of stored rows, computed once when the store was opened
    fn total_rows(&self) -> u64;

    /// Mask stored at `row`. A row that does not exist reads as 0.
    fn fetch_one(&self, row: RowId) -> Result<u64, StoreError>;

    /// Masks for several rows in one round trip.
    ///
    /// Results are `(row, mask)` pairs in no particular order, one per distinct
    /// requested id. Rows that do not exist come back as `(row, 0)`. Callers
    /// must look results up by id, never by position.
    fn fetch_many(&self, rows: &[RowId]) -> Result<Vec<(RowId, u64)>, StoreError>;
}

impl<S: BucketStore + ?Sized> BucketStore for &S {
    fn total_rows(&self) -> u64 {
        (**self).total_rows()
    }

    fn fetch_one(&self, row: RowId) -> Result<u64, StoreError> {
        (**self).fetch_one(row)
    }

    fn fetch_many(&self, rows: &[RowId]) -> Result<Vec<(RowId, u64)>, StoreError> {
        (**self).fetch_many(rows)
    }
}

impl<S: BucketStore + ?Sized> BucketStore for Arc<S> {
    fn total_rows(&self) -> u64 {
        (**self).total_rows()
    }

    fn fetch_one(&self, row: RowId) -> Result<u64, StoreError> {
        (**self).fetch_one(row)
    }

    fn fetch_many(&self, rows: &[RowId]) -> Result<Vec<(RowId, u64)>, StoreError> {
        (**self).fetch_many(rows)
    }
}

/// In-memory bucket store.
///
/// Doubles as a [`RowSink`] so small indexes can be built and queried without
/// touching disk. Only committed rows are visible to readers.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    rows: Vec<u64>,
    committed: usize,
    commits: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store over already-populated rows, all treated as committed
    pub fn from_rows(rows: Vec<u64>) -> Self {
        let committed = rows.len();
        Self {
            rows,
            committed,
            commits: 0,
        }
    }

    /// Number of commits received while populating
    pub fn commits(&self) -> usize {
        self.commits
    }

    /// Committed rows in id order
    pub fn rows(&self) -> &[u64] {
        &self.rows[..self.committed]
    }
}

impl BucketStore for MemoryStore {
    fn total_rows(&self) -> u64 {
        self.committed as u64
    }

    fn fetch_one(&self, row: RowId) -> Result<u64, StoreError> {
        Ok(self.rows().get(row as usize).copied().unwrap_or(0))
    }

    fn fetch_many(&self, rows: &[RowId]) -> Result<Vec<(RowId, u64)>, StoreError> {
        let committed = self.rows();
        let mut ids = rows.to_vec();
        // Like an `IN (...)` lookup: key order, not request order
        ids.sort_unstable();
        ids.dedup();
        Ok(ids
            .into_iter()
            .map(|id| (id, committed.get(id as usize).copied().unwrap_or(0)))
            .collect())
    }
}

impl RowSink for MemoryStore {
    fn append(&mut self, row: RowId, mask: u64) -> Result<(), StoreError> {
        let expected = self.rows.len() as RowId;
        if row != expected {
            return Err(StoreError::OutOfOrder { expected, got: row });
        }
        self.rows.push(mask);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        self.committed = self.rows.len();
        self.commits += 1;
        Ok(())
    }
}

/// Store wrapper that counts round trips to the wrapped store.
///
/// Each `fetch_one` or `fetch_many` call is one round trip.
#[derive(Debug, Default)]
pub struct CountingStore<S> {
    inner: S,
    round_trips: AtomicU64,
    rows_requested: AtomicU64,
}

impl<S> CountingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            round_trips: AtomicU64::new(0),
            rows_requested: AtomicU64::new(0),
        }
    }

    pub fn round_trips(&self) -> u64 {
        self.round_trips.load(Ordering::Relaxed)
    }

    pub fn rows_requested(&self) -> u64 {
        self.rows_requested.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.round_trips.store(0, Ordering::Relaxed);
        self.rows_requested.store(0, Ordering::Relaxed);
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: BucketStore> BucketStore for CountingStore<S> {
    fn total_rows(&self) -> u64 {
        self.inner.total_rows()
    }

    fn fetch_one(&self, row: RowId) -> Result<u64, StoreError> {
        self.round_trips.fetch_add(1, Ordering::Relaxed);
        self.rows_requested.fetch_add(1, Ordering::Relaxed);
        self.inner.fetch_one(row)
    }

    fn fetch_many(&self, rows: &[RowId]) -> Result<Vec<(RowId, u64)>, StoreError> {
        self.round_trips.fetch_add(1, Ordering::Relaxed);
        self.rows_requested
            .fetch_add(rows.len() as u64, Ordering::Relaxed);
        self.inner.fetch_many(rows)
    }
}
