#![no_main]

use arbitrary::Arbitrary;
use bloomsig::utils::{TermHasher, extract_terms, is_binary};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Input<'a> {
    bloom_size: u16,
    num_hashes: u8,
    gram_size: u8,
    text: &'a str,
}

fuzz_target!(|input: Input| {
    let _ = is_binary(input.text.as_bytes());

    let bloom_size = input.bloom_size as u32;
    let Ok(hasher) = TermHasher::new(bloom_size, input.num_hashes, input.gram_size as usize) else {
        return;
    };

    let terms = extract_terms(input.text);
    let buckets = hasher.buckets_for_terms(&terms);
    assert!(buckets.iter().all(|&b| b < bloom_size));

    // Every term's buckets are part of the query's bucket set
    for term in &terms {
        assert!(hasher.buckets(term).iter().all(|b| buckets.contains(b)));
    }
});
