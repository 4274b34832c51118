use rustc_hash::FxHashSet;

/// Maximum term length to index.
/// Longer runs are likely base64, hex dumps, or other non-searchable content.
pub const MAX_TERM_LENGTH: usize = 128;

/// Extract the searchable terms of a document or query string.
///
/// A term is a maximal run of alphanumeric characters, lowercased. Terms are
/// returned in first-occurrence order without duplicates. Queries go through
/// the same function, so punctuation in a query never produces grams the
/// index could not contain.
pub fn extract_terms(content: &str) -> Vec<String> {
    let mut terms = Vec::new();
    let mut seen = FxHashSet::default();

    for run in content.split(|c: char| !c.is_alphanumeric()) {
        if run.is_empty() || run.len() > MAX_TERM_LENGTH {
            continue;
        }

        let term = run.to_lowercase();
        if seen.insert(term.clone()) {
            terms.push(term);
        }
    }

    terms
}

/// Check if content is likely binary
pub fn is_binary(content: &[u8]) -> bool {
    let sample_size = content.len().min(8192);
    let sample = &content[..sample_size];

    let null_count = sample.iter().filter(|&&b| b == 0).count();
    if null_count > sample_size / 10 {
        return true;
    }

    let non_text_count = sample
        .iter()
        .filter(|&&b| b < 0x20 && b != b'\n' && b != b'\r' && b != b'\t')
        .count();

    non_text_count > sample_size / 8
}
