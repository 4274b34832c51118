//! Candidate matching over a bit-sliced signature index.
//!
//! For every block, the masks of the query's buckets are ANDed; each bit that
//! survives is a document that has all of them set. Blocks are always scanned
//! in full, lowest first. Results are candidates only: a bucket bit may have
//! been set by a different term that hashed to the same bucket.

use crate::error::{IndexError, Result, StoreError};
use crate::index::config::IndexConfig;
use crate::index::store::BucketStore;
use crate::index::types::*;
use crate::query::strategy::{AccessStrategy, BucketFetcher};
use crate::utils::{TermHasher, extract_terms};
use rayon::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::debug;

/// AND a sequence of masks, stopping at the first zero.
///
/// The iterator is only advanced while the running result is nonzero, so a
/// lazy iterator of fetches performs no fetch past that point. An empty
/// sequence yields 0 (no candidates).
pub fn and_masks<I>(masks: I) -> Result<u64, StoreError>
where
    I: IntoIterator<Item = Result<u64, StoreError>>,
{
    let mut masks = masks.into_iter();
    let mut acc = match masks.next() {
        Some(mask) => mask?,
        None => return Ok(0),
    };

    while acc != 0 {
        match masks.next() {
            Some(mask) => acc &= mask?,
            None => break,
        }
    }

    Ok(acc)
}

/// Document ids for the set bits of a block's final mask, lowest bit first
pub fn decode_block(block: BlockId, mask: u64) -> impl Iterator<Item = DocId> {
    let mut remaining = mask;
    std::iter::from_fn(move || {
        if remaining == 0 {
            return None;
        }
        let bit = remaining.trailing_zeros();
        remaining &= remaining - 1; // clear lowest set bit
        Some(doc_id(block, bit))
    })
}

/// Cooperative cancellation flag, checked once per block
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Cancel this token from a timer thread once `timeout` has passed.
    ///
    /// Dropping the returned [`Watchdog`] before then disarms the timer and
    /// joins its thread.
    pub fn cancel_after(&self, timeout: Duration) -> Watchdog {
        let token = self.clone();
        let disarmed = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&disarmed);

        let handle = thread::spawn(move || {
            let deadline = Instant::now() + timeout;
            loop {
                if flag.load(Ordering::Acquire) {
                    return;
                }
                let now = Instant::now();
                if now >= deadline {
                    token.cancel();
                    return;
                }
                thread::park_timeout(deadline - now);
            }
        });

        Watchdog {
            disarmed,
            handle: Some(handle),
        }
    }
}

/// Timer armed by [`CancelToken::cancel_after`]
#[must_use = "dropping the watchdog disarms the timeout"]
#[derive(Debug)]
pub struct Watchdog {
    disarmed: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.disarmed.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            handle.thread().unpark();
            let _ = handle.join();
        }
    }
}

/// Candidates of one query plus scan counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchOutcome {
    /// Candidate document ids in block-then-bit order
    pub doc_ids: Vec<DocId>,
    pub blocks_scanned: u64,
    /// Blocks whose final mask was nonzero
    pub blocks_matched: u64,
}

/// Query handle over a populated, read-only bucket store.
///
/// The block count is derived once from the store's row count when the
/// handle is built; the store cannot change afterwards. Query strings go
/// through [`extract_terms`] exactly like documents at build time.
pub struct BloomIndex<S> {
    store: S,
    hasher: TermHasher,
    block_count: u64,
    /// Workers for parallel scans; `None` uses rayon's global pool
    pool: Option<rayon::ThreadPool>,
}

impl<S: BucketStore> BloomIndex<S> {
    /// Wrap a store populated with `hasher`'s parameters
    pub fn new(store: S, hasher: TermHasher) -> Result<Self, StoreError> {
        let bloom_size = hasher.bloom_size() as u64;
        let total_rows = store.total_rows();
        if total_rows % bloom_size != 0 {
            return Err(StoreError::Corrupt(format!(
                "{} rows is not a whole number of {}-bucket blocks",
                total_rows, bloom_size
            )));
        }

        Ok(Self {
            block_count: total_rows / bloom_size,
            store,
            hasher,
            pool: None,
        })
    }

    /// Wrap a store using the build parameters of `config`
    pub fn with_config(store: S, config: &IndexConfig) -> Result<Self> {
        let hasher = TermHasher::from_config(config)?;
        Ok(Self::new(store, hasher)?)
    }

    /// Give parallel scans a dedicated pool of `threads` workers, built once
    /// for the lifetime of the handle. 0 keeps rayon's global pool, which has
    /// one worker per CPU.
    pub fn with_concurrency(mut self, threads: usize) -> Result<Self> {
        self.pool = match threads {
            0 => None,
            n => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .thread_name(|i| format!("bloomsig-scan-{}", i))
                    .build()?,
            ),
        };
        Ok(self)
    }

    /// Workers available to [`search_parallel`](Self::search_parallel)
    pub fn concurrency(&self) -> usize {
        self.pool
            .as_ref()
            .map_or_else(rayon::current_num_threads, |pool| pool.current_num_threads())
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn hasher(&self) -> &TermHasher {
        &self.hasher
    }

    pub fn block_count(&self) -> u64 {
        self.block_count
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Buckets of a query, tokenized the same way as indexed documents.
    /// `"Fox!"` and `"quick fox"` select the buckets of `fox` and of
    /// `quick` + `fox`.
    pub fn query_buckets<T: AsRef<str>>(&self, terms: &[T]) -> Vec<Bucket> {
        let words: Vec<String> = terms
            .iter()
            .flat_map(|term| extract_terms(term.as_ref()))
            .collect();
        self.hasher.buckets_for_terms(&words)
    }

    /// Candidate documents for a query string
    pub fn search(&self, query: &str, strategy: AccessStrategy) -> Result<Vec<DocId>> {
        self.search_terms(&[query], strategy)
    }

    /// Candidate documents containing every term
    pub fn search_terms<T: AsRef<str>>(
        &self,
        terms: &[T],
        strategy: AccessStrategy,
    ) -> Result<Vec<DocId>> {
        let outcome = self.search_with_cancel(terms, strategy, &CancelToken::new())?;
        Ok(outcome.doc_ids)
    }

    /// Sequential scan that gives up with [`IndexError::Cancelled`] once
    /// `cancel` is set. Nothing found before cancellation is returned.
    pub fn search_with_cancel<T: AsRef<str>>(
        &self,
        terms: &[T],
        strategy: AccessStrategy,
        cancel: &CancelToken,
    ) -> Result<SearchOutcome> {
        let buckets = self.query_buckets(terms);
        self.search_buckets(&buckets, strategy, cancel)
    }

    /// Sequential scan for a precomputed bucket set
    pub fn search_buckets(
        &self,
        buckets: &[Bucket],
        strategy: AccessStrategy,
        cancel: &CancelToken,
    ) -> Result<SearchOutcome> {
        let mut outcome = SearchOutcome::default();
        if buckets.is_empty() {
            return Ok(outcome);
        }

        let fetcher = strategy.fetcher();
        let mut rows = Vec::with_capacity(buckets.len());

        for block in 0..self.block_count {
            if cancel.is_cancelled() {
                return Err(IndexError::Cancelled);
            }

            let mask = self.block_mask(fetcher, block, buckets, &mut rows)?;
            outcome.blocks_scanned += 1;
            if mask != 0 {
                outcome.blocks_matched += 1;
                outcome.doc_ids.extend(decode_block(block, mask));
            }
        }

        debug!(
            buckets = buckets.len(),
            blocks = outcome.blocks_scanned,
            matched_blocks = outcome.blocks_matched,
            candidates = outcome.doc_ids.len(),
            %strategy,
            "query complete"
        );
        Ok(outcome)
    }

    /// Scan blocks on the handle's worker pool.
    ///
    /// Produces exactly the output of [`search_with_cancel`](Self::search_with_cancel):
    /// per-block masks are collected in block order before decoding.
    pub fn search_parallel<T: AsRef<str>>(
        &self,
        terms: &[T],
        strategy: AccessStrategy,
        cancel: &CancelToken,
    ) -> Result<SearchOutcome> {
        let buckets = self.query_buckets(terms);
        if buckets.is_empty() {
            return Ok(SearchOutcome::default());
        }

        let fetcher = strategy.fetcher();
        let scan = || {
            (0..self.block_count)
                .into_par_iter()
                .map_init(
                    || Vec::with_capacity(buckets.len()),
                    |rows, block| {
                        if cancel.is_cancelled() {
                            return Err(IndexError::Cancelled);
                        }
                        Ok(self.block_mask(fetcher, block, &buckets, rows)?)
                    },
                )
                .collect::<Result<Vec<u64>>>()
        };
        let masks = match &self.pool {
            Some(pool) => pool.install(scan),
            None => scan(),
        }?;

        let mut outcome = SearchOutcome {
            blocks_scanned: masks.len() as u64,
            ..Default::default()
        };
        for (block, mask) in masks.into_iter().enumerate() {
            if mask != 0 {
                outcome.blocks_matched += 1;
                outcome.doc_ids.extend(decode_block(block as BlockId, mask));
            }
        }

        debug!(
            buckets = buckets.len(),
            blocks = outcome.blocks_scanned,
            candidates = outcome.doc_ids.len(),
            threads = self.concurrency(),
            %strategy,
            "parallel query complete"
        );
        Ok(outcome)
    }

    fn block_mask(
        &self,
        fetcher: &dyn BucketFetcher,
        block: BlockId,
        buckets: &[Bucket],
        rows: &mut Vec<RowId>,
    ) -> Result<u64, StoreError> {
        let bloom_size = self.hasher.bloom_size();
        rows.clear();
        rows.extend(buckets.iter().map(|&b| row_id(block, b, bloom_size)));
        fetcher.block_mask(&self.store, rows)
    }
}
