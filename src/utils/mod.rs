//! Utility functions and data structures.
//!
//! ## Modules
//!
//! - [`hasher`] - Term to bucket hashing (n-grams + double hashing)
//! - [`tokenizer`] - Term extraction for documents and queries
//! - [`progress`] - Build progress bars (optional `progress` feature)
//!
//! ```no_run
//! use bloomsig::utils::{extract_terms, TermHasher};
//!
//! # fn main() -> Result<(), bloomsig::error::ConfigError> {
//! let hasher = TermHasher::new(2048, 3, 3)?;
//! let terms = extract_terms("getUserById(user_id)");
//! let buckets = hasher.buckets_for_terms(&terms);
//! # Ok(())
//! # }
//! ```

pub mod hasher;
pub mod progress;
pub mod tokenizer;

pub use hasher::*;
pub use progress::BuildProgress;
pub use tokenizer::*;
