//! # bloomsig - Bit-sliced Bloom signature index
//!
//! Every document gets a small Bloom filter (its signature) over the n-grams
//! of its terms. Signatures are stored transposed: for each block of 64
//! documents there is one 64-bit mask per bucket, bit `j` telling whether
//! document `j` of the block has that bucket set. A query hashes its terms to
//! a bucket set, ANDs the matching masks of every block and reads candidate
//! ids from the surviving bits.
//!
//! ## Architecture
//!
//! - [`index`] - Configuration, on-disk format, population and storage
//! - [`query`] - Fetch strategies and block matching
//! - [`utils`] - Term extraction, hashing and progress reporting
//! - [`error`] - Error types shared by all of the above
//!
//! ## Quick Start
//!
//! ```no_run
//! use bloomsig::index::{FileStore, IndexConfig, build_index};
//! use bloomsig::query::{AccessStrategy, BloomIndex};
//! use std::path::Path;
//!
//! # fn main() -> bloomsig::error::Result<()> {
//! build_index(
//!     Path::new("corpus.txt"),
//!     Path::new("bloomsig-index"),
//!     &IndexConfig::default(),
//!     false,
//!     true,
//! )?;
//!
//! let (index, _meta) = BloomIndex::<FileStore>::open(Path::new("bloomsig-index"))?;
//! for id in index.search_terms(&["quick", "fox"], AccessStrategy::Batched)? {
//!     println!("{}", id);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Results are candidates: a hit may be a false positive, a miss never is.

pub mod error;
pub mod index;
pub mod query;
pub mod utils;
