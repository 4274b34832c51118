use crate::error::{IndexError, StoreError};
use crate::index::config::IndexConfig;
use crate::index::store::BucketStore;
use crate::index::types::*;
use crate::query::BloomIndex;
use crate::utils::TermHasher;
use memmap2::Mmap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Memory-mapped, read-only view of buckets.bin.
///
/// The usable row count is fixed at open: the committed count from the
/// header, capped by the rows actually present and rounded down to whole
/// blocks. Cloning shares the mapping, so any number of concurrent queries
/// can read without locks.
#[derive(Clone)]
pub struct FileStore {
    mmap: Arc<Mmap>,
    bloom_size: u32,
    total_rows: u64,
    path: PathBuf,
}

impl FileStore {
    /// Open buckets.bin, checking it was written with `bloom_size`
    pub fn open(path: &Path, bloom_size: u32) -> Result<Self, StoreError> {
        let file = File::open(path)?;
        // SAFETY: the index is immutable once built; nothing writes to the
        // file while it is mapped
        let mmap = unsafe { Mmap::map(&file)? };

        if mmap.len() < BUCKETS_HEADER_SIZE {
            return Err(StoreError::Corrupt(format!(
                "{}: truncated header ({} bytes)",
                path.display(),
                mmap.len()
            )));
        }

        let magic = read_u32(&mmap, 0);
        if magic != BUCKETS_MAGIC {
            return Err(StoreError::Corrupt(format!(
                "{}: bad magic {:#010x}",
                path.display(),
                magic
            )));
        }

        let version = read_u32(&mmap, 4);
        if version != INDEX_VERSION {
            return Err(StoreError::Corrupt(format!(
                "{}: unsupported version {}",
                path.display(),
                version
            )));
        }

        let stored_bloom_size = read_u32(&mmap, 8);
        if stored_bloom_size != bloom_size {
            return Err(StoreError::ParameterMismatch(format!(
                "buckets.bin has bloom_size {} but {} was expected",
                stored_bloom_size, bloom_size
            )));
        }

        let committed = read_u64(&mmap, COMMITTED_ROWS_OFFSET as usize);
        let present = ((mmap.len() - BUCKETS_HEADER_SIZE) / 8) as u64;
        let readable = committed.min(present);
        let total_rows = readable - readable % bloom_size as u64;

        if total_rows != committed || present != committed {
            warn!(
                path = %path.display(),
                committed,
                present,
                usable = total_rows,
                "bucket store has an uncommitted or partial tail; ignoring it"
            );
        }

        Ok(Self {
            mmap: Arc::new(mmap),
            bloom_size,
            total_rows,
            path: path.to_path_buf(),
        })
    }

    pub fn bloom_size(&self) -> u32 {
        self.bloom_size
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    fn row(&self, row: RowId) -> u64 {
        read_u64(&self.mmap, BUCKETS_HEADER_SIZE + row as usize * 8)
    }
}

impl BucketStore for FileStore {
    fn total_rows(&self) -> u64 {
        self.total_rows
    }

    fn fetch_one(&self, row: RowId) -> Result<u64, StoreError> {
        if row >= self.total_rows {
            return Ok(0);
        }
        Ok(self.row(row))
    }

    fn fetch_many(&self, rows: &[RowId]) -> Result<Vec<(RowId, u64)>, StoreError> {
        let mut ids = rows.to_vec();
        ids.sort_unstable();
        ids.dedup();
        Ok(ids
            .into_iter()
            .map(|id| {
                let mask = if id < self.total_rows { self.row(id) } else { 0 };
                (id, mask)
            })
            .collect())
    }
}

#[inline]
fn read_u32(data: &[u8], offset: usize) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&data[offset..offset + 4]);
    u32::from_le_bytes(buf)
}

#[inline]
fn read_u64(data: &[u8], offset: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&data[offset..offset + 8]);
    u64::from_le_bytes(buf)
}

impl BloomIndex<FileStore> {
    /// Open a built index directory.
    ///
    /// Hashing parameters come from meta.json. The store must agree with the
    /// metadata on bloom size and row count, and the hasher of this binary
    /// must reproduce the fingerprint recorded at build time.
    pub fn open(index_dir: &Path) -> Result<(Self, IndexMeta), IndexError> {
        if !IndexMeta::exists(index_dir) {
            return Err(StoreError::Corrupt(format!(
                "no index found at {} (run 'bloomsig build' first)",
                index_dir.display()
            ))
            .into());
        }

        let meta = IndexMeta::load(index_dir)?;
        let mut config = IndexConfig::default();
        meta.apply_to(&mut config);
        let hasher = TermHasher::from_config(&config)?;

        if hasher.fingerprint() != meta.hasher_fingerprint {
            return Err(StoreError::ParameterMismatch(
                "term hasher differs from the one that built this index".to_string(),
            )
            .into());
        }

        let store = FileStore::open(&index_dir.join(BUCKETS_FILE), meta.bloom_size)?;
        if store.total_rows() != meta.row_count {
            return Err(StoreError::ParameterMismatch(format!(
                "meta.json records {} rows but buckets.bin holds {}",
                meta.row_count,
                store.total_rows()
            ))
            .into());
        }

        info!(
            index = %index_dir.display(),
            docs = meta.doc_count,
            blocks = meta.block_count,
            bloom_size = meta.bloom_size,
            "opened index"
        );

        let index = BloomIndex::new(store, hasher)?;
        Ok((index, meta))
    }
}
