//! Shared corpus generators for the integration tests

#![allow(dead_code)]

use bloomsig::index::{IndexConfig, IndexWriter, MemoryStore};
use bloomsig::query::BloomIndex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Random lowercase word of exactly `len` letters
pub fn random_word(rng: &mut StdRng, len: usize) -> String {
    (0..len).map(|_| rng.gen_range(b'a'..=b'z') as char).collect()
}

/// `docs` documents of `terms_per_doc` random words each, reproducible from `seed`
pub fn random_corpus(seed: u64, docs: usize, terms_per_doc: usize, word_len: usize) -> Vec<Vec<String>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..docs)
        .map(|_| (0..terms_per_doc).map(|_| random_word(&mut rng, word_len)).collect())
        .collect()
}

/// Populate an in-memory index with `corpus`, document `i` getting id `i`
pub fn memory_index(corpus: &[Vec<String>], config: &IndexConfig) -> BloomIndex<MemoryStore> {
    let mut writer = IndexWriter::new(MemoryStore::new(), config).expect("valid config");
    let hasher = writer.hasher().clone();
    for (i, terms) in corpus.iter().enumerate() {
        let id = writer.add_document(terms).expect("memory append");
        assert_eq!(id, i as u64);
    }
    let (store, _) = writer.finish().expect("memory commit");
    BloomIndex::new(store, hasher).expect("whole blocks")
}

/// Ids of documents that really contain `term`
pub fn exact_matches(corpus: &[Vec<String>], term: &str) -> Vec<u64> {
    corpus
        .iter()
        .enumerate()
        .filter(|(_, terms)| terms.iter().any(|t| t == term))
        .map(|(i, _)| i as u64)
        .collect()
}
