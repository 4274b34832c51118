//! Query execution over a built index.
//!
//! - [`strategy`] - How bucket rows are fetched (sequential or batched)
//! - [`matcher`] - Per-block AND, bit decoding and the [`BloomIndex`] handle

pub mod matcher;
pub mod strategy;

pub use matcher::{BloomIndex, CancelToken, SearchOutcome, Watchdog, and_masks, decode_block};
pub use strategy::{AccessStrategy, BatchedFetcher, BucketFetcher, SequentialFetcher};
