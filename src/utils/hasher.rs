//! Term to bucket hashing.
//!
//! A term is lowercased, split into overlapping byte n-grams, and each gram is
//! hashed `k` times with double hashing derived from two fixed-seed ahash
//! computations. The same function runs at build time and query time, so it
//! must stay deterministic: seeds are constants and the bucket set of a
//! reference term is stored in meta.json to catch drift between builds.

use crate::error::ConfigError;
use crate::index::config::{IndexConfig, check_hasher_params};
use crate::index::types::Bucket;
use ahash::RandomState;
use rustc_hash::FxHashSet;
use std::hash::{BuildHasher, Hasher};

/// Term hashed into the fingerprint recorded in meta.json
const FINGERPRINT_TERM: &str = "bloomsig fingerprint term";

/// Buckets selected by all terms of one document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HashedDocument {
    pub buckets: Vec<Bucket>,
    pub term_count: usize,
}

/// Maps search terms to bucket indices in `[0, bloom_size)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermHasher {
    bloom_size: u32,
    num_hashes: u8,
    gram_size: usize,
}

impl TermHasher {
    /// Create a hasher, rejecting a zero bloom size and out-of-range hash
    /// or gram counts
    pub fn new(bloom_size: u32, num_hashes: u8, gram_size: usize) -> Result<Self, ConfigError> {
        check_hasher_params(bloom_size, num_hashes, gram_size)?;
        Ok(Self {
            bloom_size,
            num_hashes,
            gram_size,
        })
    }

    /// Create a hasher from a config, validating all of it first
    pub fn from_config(config: &IndexConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Self::new(config.bloom_size, config.num_hashes, config.gram_size)
    }

    pub fn bloom_size(&self) -> u32 {
        self.bloom_size
    }

    pub fn num_hashes(&self) -> u8 {
        self.num_hashes
    }

    pub fn gram_size(&self) -> usize {
        self.gram_size
    }

    /// Ordered, deduplicated bucket indices for a term.
    /// An empty term yields no buckets.
    pub fn buckets(&self, term: &str) -> Vec<Bucket> {
        let mut out = Vec::new();
        let mut seen = FxHashSet::default();
        self.push_buckets(term, &mut out, &mut seen);
        out
    }

    /// Union of the bucket sets of several terms, in first-occurrence order.
    /// A document must carry every bucket to match, so this is an AND query.
    pub fn buckets_for_terms<I, T>(&self, terms: I) -> Vec<Bucket>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        self.hash_document(terms).buckets
    }

    /// Hash every term of a document into one bucket set
    pub fn hash_document<I, T>(&self, terms: I) -> HashedDocument
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let mut doc = HashedDocument::default();
        let mut seen = FxHashSet::default();
        for term in terms {
            doc.term_count += 1;
            self.push_buckets(term.as_ref(), &mut doc.buckets, &mut seen);
        }
        doc
    }

    /// Bucket set of a fixed reference term, recorded at build time
    pub fn fingerprint(&self) -> Vec<Bucket> {
        self.buckets(FINGERPRINT_TERM)
    }

    fn push_buckets(&self, term: &str, out: &mut Vec<Bucket>, seen: &mut FxHashSet<Bucket>) {
        if term.is_empty() {
            return;
        }

        let normalized = term.to_lowercase();
        let bytes = normalized.as_bytes();

        // Terms shorter than a gram are hashed whole
        let gram_len = self.gram_size.min(bytes.len());

        for gram in bytes.windows(gram_len) {
            let (h1, h2) = hash_pair(gram);
            for i in 0..self.num_hashes as u64 {
                // Double hashing: h(i) = h1 + i*h2
                let hash = h1.wrapping_add(i.wrapping_mul(h2));
                let bucket = (hash % self.bloom_size as u64) as Bucket;
                if seen.insert(bucket) {
                    out.push(bucket);
                }
            }
        }
    }
}

/// Two independent hashes of a gram for double hashing
#[inline]
fn hash_pair(gram: &[u8]) -> (u64, u64) {
    let mut hasher1 = RandomState::with_seeds(0, 0, 0, 0).build_hasher();
    hasher1.write(gram);
    let h1 = hasher1.finish();

    let mut hasher2 = RandomState::with_seeds(
        0x517cc1b727220a95,
        0x9e3779b97f4a7c15,
        0xbf58476d1ce4e5b9,
        0x94d049bb133111eb,
    )
    .build_hasher();
    hasher2.write(gram);
    let h2 = hasher2.finish();

    (h1, h2)
}

/// Theoretical false-positive rate `(1 - e^(-kn/m))^k` of a Bloom filter
/// with `k` hashes, `n` inserted items and `m` buckets
pub fn false_positive_bound(num_hashes: u8, items: f64, bloom_size: u32) -> f64 {
    let k = num_hashes as f64;
    let m = bloom_size as f64;
    (1.0 - (-k * items / m).exp()).powf(k)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_term_has_no_buckets() {
        let hasher = TermHasher::new(1024, 3, 3).unwrap();
        assert!(hasher.buckets("").is_empty());
        assert!(hasher.buckets_for_terms(Vec::<&str>::new()).is_empty());
        assert!(hasher.buckets_for_terms(["", ""]).is_empty());
    }

    #[test]
    fn test_buckets_are_deterministic() {
        let a = TermHasher::new(2048, 3, 3).unwrap();
        let b = TermHasher::new(2048, 3, 3).unwrap();
        for term in ["abc", "abcdefghij", "hello world", "x"] {
            assert_eq!(a.buckets(term), a.buckets(term));
            assert_eq!(a.buckets(term), b.buckets(term));
        }
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_buckets_in_range_and_unique() {
        let hasher = TermHasher::new(17, 5, 3).unwrap();
        let buckets = hasher.buckets("abcdefghijklmnopqrstuvwxyz");
        assert!(!buckets.is_empty());
        assert!(buckets.iter().all(|&b| b < 17));

        let unique: FxHashSet<_> = buckets.iter().copied().collect();
        assert_eq!(unique.len(), buckets.len());
    }

    #[test]
    fn test_bucket_count_bounded_by_grams() {
        let hasher = TermHasher::new(1 << 20, 2, 3).unwrap();
        // "hello" has 3 trigrams, each hashed twice
        assert!(hasher.buckets("hello").len() <= 6);
        // Short terms are a single gram
        assert!(hasher.buckets("hi").len() <= 2);
        assert!(!hasher.buckets("hi").is_empty());
    }

    #[test]
    fn test_case_insensitive() {
        let hasher = TermHasher::new(1024, 3, 3).unwrap();
        assert_eq!(hasher.buckets("Hello"), hasher.buckets("hello"));
        assert_eq!(hasher.buckets("CAFÉ"), hasher.buckets("café"));
    }

    #[test]
    fn test_substring_buckets_are_subset() {
        let hasher = TermHasher::new(4096, 3, 3).unwrap();
        let word: FxHashSet<_> = hasher.buckets("abcdefgh").into_iter().collect();
        for sub in ["abc", "bcd", "cdefg", "abcdefgh"] {
            assert!(hasher.buckets(sub).iter().all(|b| word.contains(b)), "{sub}");
        }
    }

    #[test]
    fn test_hash_document_unions_terms() {
        let hasher = TermHasher::new(512, 2, 3).unwrap();
        let doc = hasher.hash_document(["alpha", "beta", "alpha"]);
        assert_eq!(doc.term_count, 3);

        let alpha = hasher.buckets("alpha");
        let beta = hasher.buckets("beta");
        assert!(alpha.iter().all(|b| doc.buckets.contains(b)));
        assert!(beta.iter().all(|b| doc.buckets.contains(b)));
        // First-occurrence order starts with alpha's buckets
        assert_eq!(&doc.buckets[..alpha.len()], alpha.as_slice());
    }

    #[test]
    fn test_different_parameters_change_buckets() {
        let narrow = TermHasher::new(64, 3, 3).unwrap();
        let wide = TermHasher::new(65536, 3, 3).unwrap();
        assert_ne!(narrow.fingerprint(), wide.fingerprint());
    }

    #[test]
    fn test_new_rejects_invalid_parameters() {
        assert!(matches!(
            TermHasher::new(0, 3, 3),
            Err(ConfigError::InvalidBloomSize(0))
        ));
        assert!(matches!(
            TermHasher::new(64, 0, 3),
            Err(ConfigError::InvalidHashCount { got: 0, .. })
        ));
        assert!(matches!(
            TermHasher::new(64, 3, 0),
            Err(ConfigError::InvalidGramSize { got: 0, .. })
        ));
        assert!(TermHasher::new(0, 0, 0).is_err());
        assert!(TermHasher::new(64, 17, 3).is_err());
        assert!(TermHasher::new(1, 1, 1).is_ok());
    }

    #[test]
    fn test_from_config_validates() {
        let config = IndexConfig {
            bloom_size: 0,
            ..Default::default()
        };
        assert!(TermHasher::from_config(&config).is_err());
        assert!(TermHasher::from_config(&IndexConfig::default()).is_ok());
    }

    #[test]
    fn test_hash_pair_independence() {
        let mut same_count = 0;
        for i in 0..1000u32 {
            let gram = i.to_le_bytes();
            let (h1, h2) = hash_pair(&gram[..3]);
            if h1 == h2 {
                same_count += 1;
            }
        }
        assert_eq!(same_count, 0);
    }

    #[test]
    fn test_false_positive_bound() {
        // Empty filter never matches, a saturated one nearly always does
        assert_eq!(false_positive_bound(3, 0.0, 1024), 0.0);
        assert!(false_positive_bound(3, 1_000_000.0, 1024) > 0.99);

        let p = false_positive_bound(3, 20.0, 256);
        assert!((p - 0.00912).abs() < 0.0005, "{p}");
    }
}
