//! Bucket fetch strategies.
//!
//! Both strategies feed the same AND in [`and_masks`]; they differ only in how
//! many storage round trips a block costs and where short-circuiting can
//! happen. For any index and query they produce the same candidates.

use crate::error::StoreError;
use crate::index::store::BucketStore;
use crate::index::types::RowId;
use crate::query::matcher::and_masks;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a query's bucket rows are retrieved for each block
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum AccessStrategy {
    /// One `fetch_one` per bucket, stopping as soon as the AND hits zero
    #[default]
    Sequential,
    /// One `fetch_many` per block covering every bucket
    Batched,
}

impl AccessStrategy {
    /// The fetcher implementing this strategy
    pub fn fetcher(self) -> &'static dyn BucketFetcher {
        match self {
            AccessStrategy::Sequential => &SequentialFetcher,
            AccessStrategy::Batched => &BatchedFetcher,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AccessStrategy::Sequential => "sequential",
            AccessStrategy::Batched => "batched",
        }
    }
}

impl fmt::Display for AccessStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sequential" => Ok(AccessStrategy::Sequential),
            "batched" => Ok(AccessStrategy::Batched),
            other => Err(format!("unknown access strategy: {}", other)),
        }
    }
}

/// Retrieves the masks of one block's query rows and ANDs them
pub trait BucketFetcher: Send + Sync {
    /// AND of the masks stored at `rows` (all rows of the same block).
    /// `rows` is never empty.
    fn block_mask(&self, store: &dyn BucketStore, rows: &[RowId]) -> Result<u64, StoreError>;
}

/// Fetches rows one at a time in query order
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialFetcher;

impl BucketFetcher for SequentialFetcher {
    fn block_mask(&self, store: &dyn BucketStore, rows: &[RowId]) -> Result<u64, StoreError> {
        // Lazy: a row is only fetched if the running AND is still nonzero
        and_masks(rows.iter().map(|&row| store.fetch_one(row)))
    }
}

/// Fetches all of a block's rows in a single round trip
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchedFetcher;

impl BucketFetcher for BatchedFetcher {
    fn block_mask(&self, store: &dyn BucketStore, rows: &[RowId]) -> Result<u64, StoreError> {
        let fetched: FxHashMap<RowId, u64> = store.fetch_many(rows)?.into_iter().collect();
        // Rows the store did not return are absent, i.e. zero
        and_masks(
            rows.iter()
                .map(|row| Ok(fetched.get(row).copied().unwrap_or(0))),
        )
    }
}
