//! Empirical false-positive rate against the Bloom filter bound.
//!
//! Documents hold 20 random three-letter words, so with gram size 3 each term
//! is a single gram and a signature carries at most `3 * 20` set buckets.
//! Query terms are made of digits and can never occur in the corpus, so every
//! hit on them is a false positive.

mod fixtures;

use bloomsig::index::IndexConfig;
use bloomsig::query::AccessStrategy;
use bloomsig::utils::false_positive_bound;
use fixtures::{exact_matches, memory_index, random_corpus};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const BLOOM_SIZE: u32 = 256;
const NUM_HASHES: u8 = 3;
const TERMS_PER_DOC: usize = 20;
const DOCS: usize = 640;
const QUERIES: usize = 400;

#[test]
fn false_positive_rate_within_bound() {
    let config = IndexConfig {
        bloom_size: BLOOM_SIZE,
        num_hashes: NUM_HASHES,
        gram_size: 3,
        ..Default::default()
    };
    let corpus = random_corpus(0x5EED, DOCS, TERMS_PER_DOC, 3);
    let index = memory_index(&corpus, &config);

    let mut rng = StdRng::seed_from_u64(99);
    let mut hits = 0usize;
    for _ in 0..QUERIES {
        let query = format!("{:03}", rng.gen_range(0..1000));
        hits += index.search(&query, AccessStrategy::Batched).unwrap().len();
    }

    let empirical = hits as f64 / (QUERIES * DOCS) as f64;
    let bound = false_positive_bound(NUM_HASHES, TERMS_PER_DOC as f64, BLOOM_SIZE);
    assert!(
        empirical <= bound * 1.5 + 0.002,
        "empirical {empirical:.5} exceeds bound {bound:.5}"
    );
}

#[test]
fn no_false_negatives() {
    let config = IndexConfig {
        bloom_size: BLOOM_SIZE,
        num_hashes: NUM_HASHES,
        ..Default::default()
    };
    let corpus = random_corpus(0xBEEF, DOCS, TERMS_PER_DOC, 3);
    let index = memory_index(&corpus, &config);

    for doc in corpus.iter().step_by(13) {
        for term in doc.iter().take(3) {
            let ids = index.search(term, AccessStrategy::Sequential).unwrap();
            for id in exact_matches(&corpus, term) {
                assert!(ids.contains(&id), "{term} missing doc {id}");
            }
        }
    }
}

#[test]
fn wider_filter_lowers_false_positives() {
    let corpus = random_corpus(1, DOCS, TERMS_PER_DOC, 3);
    let queries: Vec<String> = (0..200).map(|i| format!("{:03}", i * 5)).collect();

    let rate = |bloom_size: u32| {
        let config = IndexConfig {
            bloom_size,
            ..Default::default()
        };
        let index = memory_index(&corpus, &config);
        let hits: usize = queries
            .iter()
            .map(|q| index.search(q, AccessStrategy::Batched).unwrap().len())
            .sum();
        hits as f64 / (queries.len() * DOCS) as f64
    };

    assert!(rate(4096) <= rate(128));
}
