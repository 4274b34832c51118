use crate::error::{IndexError, StoreError};
use crate::index::config::IndexConfig;
use crate::index::types::*;
use crate::index::writer::{BuildSummary, FileSink, IndexWriter};
use crate::utils::{BuildProgress, HashedDocument, extract_terms, is_binary};
use ignore::WalkBuilder;
use rayon::prelude::*;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

/// Documents hashed in parallel before their bits are set in order
const HASH_CHUNK_SIZE: usize = 4096;

/// One document of a corpus, with the label shown for its id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusDocument {
    pub label: String,
    pub text: String,
}

/// Read a corpus.
///
/// A file yields one document per non-empty line, labelled `path:line`. A
/// directory yields one document per text file, labelled by its relative
/// path; files are walked with gitignore rules and sorted so ids are stable
/// across builds.
pub fn load_corpus(corpus: &Path) -> Result<Vec<CorpusDocument>, StoreError> {
    if corpus.is_dir() {
        load_directory(corpus)
    } else {
        load_lines(corpus)
    }
}

fn load_lines(path: &Path) -> Result<Vec<CorpusDocument>, StoreError> {
    let bytes = fs::read(path)?;
    let text = String::from_utf8_lossy(&bytes);
    let name = path.display();

    Ok(text
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| CorpusDocument {
            label: format!("{}:{}", name, i + 1),
            text: line.to_string(),
        })
        .collect())
}

fn load_directory(root: &Path) -> Result<Vec<CorpusDocument>, StoreError> {
    let walker = WalkBuilder::new(root)
        .hidden(true)
        .git_ignore(true)
        .git_exclude(true)
        .filter_entry(|entry| {
            let name = entry.file_name().to_string_lossy();
            !matches!(name.as_ref(), ".git" | "node_modules" | "target")
        })
        .build();

    let mut paths: Vec<(PathBuf, PathBuf)> = walker
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| {
            let path = entry.path().to_path_buf();
            let rel_path = path.strip_prefix(root).ok()?.to_path_buf();
            Some((path, rel_path))
        })
        .collect();
    paths.sort_by(|a, b| a.1.cmp(&b.1));

    let mut docs = Vec::with_capacity(paths.len());
    for (path, rel_path) in paths {
        let content = match fs::read(&path) {
            Ok(c) => c,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable file");
                continue;
            }
        };
        if is_binary(&content) {
            continue;
        }
        docs.push(CorpusDocument {
            label: rel_path.to_string_lossy().into_owned(),
            text: String::from_utf8_lossy(&content).into_owned(),
        });
    }

    Ok(docs)
}

/// Build an index over `corpus` into `index_dir`.
///
/// The directory ends up holding buckets.bin, docs.json and, written last,
/// meta.json; an index without meta.json is never opened. An existing index
/// is only replaced when `force` is set.
pub fn build_index(
    corpus: &Path,
    index_dir: &Path,
    config: &IndexConfig,
    force: bool,
    silent: bool,
) -> Result<BuildSummary, IndexError> {
    config.validate()?;

    if index_dir.exists() && fs::read_dir(index_dir)?.next().is_some() {
        if !force {
            return Err(StoreError::AlreadyExists(index_dir.display().to_string()).into());
        }
        fs::remove_dir_all(index_dir)?;
    }
    fs::create_dir_all(index_dir)?;

    let spinner = BuildProgress::spinner("Reading corpus...", silent);
    let docs = load_corpus(corpus)?;
    spinner.finish(format!("Found {} documents", docs.len()));

    let sink = FileSink::create(&index_dir.join(BUCKETS_FILE), config.bloom_size)?;
    let mut writer = IndexWriter::new(sink, config)?;
    let hasher = writer.hasher().clone();

    let progress = BuildProgress::bar(docs.len() as u64, "Hashing documents...", silent);
    for chunk in docs.chunks(HASH_CHUNK_SIZE) {
        let hashed: Vec<HashedDocument> = chunk
            .par_iter()
            .map(|doc| hasher.hash_document(extract_terms(&doc.text)))
            .collect();

        // Bits are set in document order so ids follow the corpus
        for doc in &hashed {
            writer.add_hashed(doc)?;
        }
        progress.inc(chunk.len() as u64);
    }

    let (_, summary) = writer.finish()?;
    progress.finish(format!("Indexed {} documents", summary.doc_count));

    let labels: Vec<&str> = docs.iter().map(|d| d.label.as_str()).collect();
    let mut file = BufWriter::new(File::create(index_dir.join(DOCS_FILE))?);
    serde_json::to_writer(&mut file, &labels).map_err(StoreError::Meta)?;
    file.flush()?;

    let avg_terms_per_doc = if summary.doc_count > 0 {
        summary.term_count as f64 / summary.doc_count as f64
    } else {
        0.0
    };

    let meta = IndexMeta {
        version: INDEX_VERSION,
        bloom_size: config.bloom_size,
        documents_per_block: config.documents_per_block,
        num_hashes: config.num_hashes,
        gram_size: config.gram_size,
        hasher_fingerprint: hasher.fingerprint(),
        doc_count: summary.doc_count,
        row_count: summary.row_count,
        block_count: summary.block_count,
        avg_terms_per_doc,
        created_at: SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0),
    };
    meta.save(index_dir)?;

    info!(
        index = %index_dir.display(),
        docs = summary.doc_count,
        blocks = summary.block_count,
        rows = summary.row_count,
        commits = summary.commits,
        "index built"
    );

    Ok(summary)
}

/// Document labels from docs.json, indexed by document id
pub fn load_labels(index_dir: &Path) -> Result<Vec<String>, StoreError> {
    let file = File::open(index_dir.join(DOCS_FILE))?;
    Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::reader::FileStore;
    use crate::query::{AccessStrategy, BloomIndex};
    use tempfile::tempdir;

    fn small_config() -> IndexConfig {
        IndexConfig {
            bloom_size: 256,
            commit_batch_size: 100,
            ..Default::default()
        }
    }

    #[test]
    fn test_load_lines_skips_blank() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("corpus.txt");
        fs::write(&path, "alpha beta\n\n   \ngamma\n").unwrap();

        let docs = load_corpus(&path).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].text, "alpha beta");
        assert!(docs[1].label.ends_with(":4"));
    }

    #[test]
    fn test_load_directory_sorted_without_binaries() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("b.txt"), "second").unwrap();
        fs::write(dir.path().join("a.txt"), "first").unwrap();
        fs::write(dir.path().join("blob.bin"), [0u8; 64]).unwrap();

        let docs = load_corpus(dir.path()).unwrap();
        let labels: Vec<_> = docs.iter().map(|d| d.label.as_str()).collect();
        assert_eq!(labels, vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn test_missing_corpus_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(load_corpus(&dir.path().join("nope.txt")).is_err());
    }

    #[test]
    fn test_build_and_search() {
        let dir = tempdir().unwrap();
        let corpus = dir.path().join("corpus.txt");
        let lines: Vec<String> = (0..150).map(|i| format!("document number{}", i)).collect();
        fs::write(&corpus, lines.join("\n") + "\nthe quick brown fox\n").unwrap();
        let index_dir = dir.path().join("index");

        let summary = build_index(&corpus, &index_dir, &small_config(), false, true).unwrap();
        assert_eq!(summary.doc_count, 151);
        assert_eq!(summary.block_count, 3);
        assert_eq!(summary.row_count, 3 * 256);

        let (index, meta) = BloomIndex::<FileStore>::open(&index_dir).unwrap();
        assert_eq!(meta.doc_count, 151);
        assert_eq!(index.block_count(), 3);

        for strategy in [AccessStrategy::Sequential, AccessStrategy::Batched] {
            let hits = index.search("fox", strategy).unwrap();
            assert!(hits.contains(&150));
            let hits = index.search("number42", strategy).unwrap();
            assert!(hits.contains(&42));
        }

        let labels = load_labels(&index_dir).unwrap();
        assert_eq!(labels.len(), 151);
        assert!(labels[150].ends_with(":151"));
    }

    #[test]
    fn test_search_tokenizes_query_text() {
        let dir = tempdir().unwrap();
        let corpus = dir.path().join("corpus.txt");
        let lines: Vec<String> = (0..80).map(|i| format!("filler row{}", i)).collect();
        fs::write(&corpus, "The quick brown fox\n".to_string() + &lines.join("\n")).unwrap();
        let index_dir = dir.path().join("index");
        build_index(&corpus, &index_dir, &small_config(), false, true).unwrap();

        let (index, _) = BloomIndex::<FileStore>::open(&index_dir).unwrap();
        for strategy in [AccessStrategy::Sequential, AccessStrategy::Batched] {
            for query in ["Fox!", "quick fox", "brown-fox", "QUICK", "(the) FOX."] {
                let hits = index.search(query, strategy).unwrap();
                assert!(hits.contains(&0), "{query} with {strategy}");
            }
            let hits = index.search_terms(&["Quick", "Fox!"], strategy).unwrap();
            assert!(hits.contains(&0));
        }
    }

    #[test]
    fn test_build_refuses_to_overwrite() {
        let dir = tempdir().unwrap();
        let corpus = dir.path().join("corpus.txt");
        fs::write(&corpus, "one\ntwo\n").unwrap();
        let index_dir = dir.path().join("index");

        build_index(&corpus, &index_dir, &small_config(), false, true).unwrap();
        let again = build_index(&corpus, &index_dir, &small_config(), false, true);
        assert!(matches!(
            again,
            Err(IndexError::Store(StoreError::AlreadyExists(_)))
        ));

        fs::write(&corpus, "one\ntwo\nthree\n").unwrap();
        let summary = build_index(&corpus, &index_dir, &small_config(), true, true).unwrap();
        assert_eq!(summary.doc_count, 3);
    }

    #[test]
    fn test_build_rejects_invalid_config() {
        let dir = tempdir().unwrap();
        let corpus = dir.path().join("corpus.txt");
        fs::write(&corpus, "one\n").unwrap();
        let config = IndexConfig {
            num_hashes: 0,
            ..small_config()
        };
        let result = build_index(&corpus, &dir.path().join("index"), &config, false, true);
        assert!(matches!(result, Err(IndexError::Config(_))));
    }

    #[test]
    fn test_build_empty_corpus() {
        let dir = tempdir().unwrap();
        let corpus = dir.path().join("empty.txt");
        fs::write(&corpus, "\n\n").unwrap();
        let index_dir = dir.path().join("index");

        let summary = build_index(&corpus, &index_dir, &small_config(), false, true).unwrap();
        assert_eq!(summary.doc_count, 0);

        let (index, _) = BloomIndex::<FileStore>::open(&index_dir).unwrap();
        assert_eq!(index.block_count(), 0);
        assert!(index.search("anything", AccessStrategy::Batched).unwrap().is_empty());
    }
}
