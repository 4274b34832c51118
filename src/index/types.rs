use crate::error::StoreError;
use crate::index::config::IndexConfig;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Global identifier of an indexed document
pub type DocId = u64;

/// Position of a bucket row in the flat row sequence
pub type RowId = u64;

/// Index of a block of documents
pub type BlockId = u64;

/// Bucket index within a block, always `< bloom_size`
pub type Bucket = u32;

/// Documents packed into one bucket mask (one bit each)
pub const DOCUMENTS_PER_BLOCK: u32 = u64::BITS;

/// On-disk format version for meta.json and buckets.bin
pub const INDEX_VERSION: u32 = 1;

pub const META_FILE: &str = "meta.json";
pub const BUCKETS_FILE: &str = "buckets.bin";
pub const DOCS_FILE: &str = "docs.json";

/// buckets.bin header: magic, version, bloom_size, reserved, committed_rows
pub const BUCKETS_MAGIC: u32 = 0x4749_5342; // "BSIG" little-endian
pub const BUCKETS_HEADER_SIZE: usize = 4 + 4 + 4 + 4 + 8;
pub const COMMITTED_ROWS_OFFSET: u64 = 16;

/// Row holding `bucket` of `block`
#[inline]
pub fn row_id(block: BlockId, bucket: Bucket, bloom_size: u32) -> RowId {
    block * bloom_size as u64 + bucket as u64
}

/// Document at bit `bit` of `block`
#[inline]
pub fn doc_id(block: BlockId, bit: u32) -> DocId {
    block * DOCUMENTS_PER_BLOCK as u64 + bit as u64
}

/// Split a document id into its block and local bit
#[inline]
pub fn locate_doc(doc: DocId) -> (BlockId, u32) {
    (
        doc / DOCUMENTS_PER_BLOCK as u64,
        (doc % DOCUMENTS_PER_BLOCK as u64) as u32,
    )
}

/// Index metadata stored in meta.json.
///
/// Holds the build-time parameters; readers hash queries with these values,
/// never with whatever the current config file says.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMeta {
    pub version: u32,
    pub bloom_size: u32,
    pub documents_per_block: u32,
    pub num_hashes: u8,
    pub gram_size: usize,
    /// Bucket set of a fixed reference term, detects hasher drift between builds
    pub hasher_fingerprint: Vec<Bucket>,
    pub doc_count: u64,
    pub row_count: u64,
    pub block_count: u64,
    #[serde(default)]
    pub avg_terms_per_doc: f64,
    pub created_at: u64,
}

impl IndexMeta {
    /// Load meta.json from an index directory
    pub fn load(index_dir: &Path) -> Result<Self, StoreError> {
        let file = File::open(index_dir.join(META_FILE))?;
        let meta: IndexMeta = serde_json::from_reader(file)?;
        if meta.version != INDEX_VERSION {
            return Err(StoreError::Corrupt(format!(
                "unsupported index version {} (expected {})",
                meta.version, INDEX_VERSION
            )));
        }
        Ok(meta)
    }

    /// Write meta.json via a temp file + rename, so a half-written file never
    /// marks an index as complete
    pub fn save(&self, index_dir: &Path) -> Result<(), StoreError> {
        let tmp_path = index_dir.join(format!("{}.tmp", META_FILE));
        {
            let mut file = BufWriter::new(File::create(&tmp_path)?);
            serde_json::to_writer_pretty(&mut file, self)?;
            file.flush()?;
            file.get_ref().sync_all()?;
        }
        fs::rename(&tmp_path, index_dir.join(META_FILE))?;
        Ok(())
    }

    /// Whether an index directory holds a completed build
    pub fn exists(index_dir: &Path) -> bool {
        index_dir.join(META_FILE).exists()
    }

    /// Overlay the build-time parameters onto a runtime config
    pub fn apply_to(&self, config: &mut IndexConfig) {
        config.bloom_size = self.bloom_size;
        config.documents_per_block = self.documents_per_block;
        config.num_hashes = self.num_hashes;
        config.gram_size = self.gram_size;
    }
}
