use crate::error::{ConfigError, StoreError};
use crate::index::config::IndexConfig;
use crate::index::types::*;
use crate::utils::{HashedDocument, TermHasher};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::debug;

/// Append-only destination for bucket rows during population
pub trait RowSink {
    /// Append the row with id `row`; ids must arrive in increasing order
    /// without gaps
    fn append(&mut self, row: RowId, mask: u64) -> Result<(), StoreError>;

    /// Make every appended row durable and visible to readers
    fn commit(&mut self) -> Result<(), StoreError>;
}

/// File-backed row sink writing buckets.bin.
///
/// Rows are buffered and become durable on [`commit`](RowSink::commit), which
/// syncs the data and then bumps the committed row count in the header. A
/// crash between commits loses only the rows after the last commit.
pub struct FileSink {
    file: BufWriter<File>,
    next_row: RowId,
    committed: RowId,
}

impl FileSink {
    /// Create a fresh buckets.bin at `path`, truncating anything there
    pub fn create(path: &Path, bloom_size: u32) -> Result<Self, StoreError> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        let mut file = BufWriter::with_capacity(65536, file);

        file.write_all(&BUCKETS_MAGIC.to_le_bytes())?;
        file.write_all(&INDEX_VERSION.to_le_bytes())?;
        file.write_all(&bloom_size.to_le_bytes())?;
        file.write_all(&0u32.to_le_bytes())?;
        file.write_all(&0u64.to_le_bytes())?;
        file.flush()?;

        Ok(Self {
            file,
            next_row: 0,
            committed: 0,
        })
    }

    /// Rows made durable so far
    pub fn committed_rows(&self) -> RowId {
        self.committed
    }
}

impl RowSink for FileSink {
    fn append(&mut self, row: RowId, mask: u64) -> Result<(), StoreError> {
        if row != self.next_row {
            return Err(StoreError::OutOfOrder {
                expected: self.next_row,
                got: row,
            });
        }
        self.file.write_all(&mask.to_le_bytes())?;
        self.next_row += 1;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        self.file.flush()?;
        let file = self.file.get_mut();
        file.sync_data()?;

        // Publish the new row count only after the rows themselves are on disk
        file.seek(SeekFrom::Start(COMMITTED_ROWS_OFFSET))?;
        file.write_all(&self.next_row.to_le_bytes())?;
        file.sync_data()?;
        file.seek(SeekFrom::End(0))?;

        self.committed = self.next_row;
        Ok(())
    }
}

/// Counts produced by a finished population run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BuildSummary {
    pub doc_count: u64,
    pub row_count: u64,
    pub block_count: u64,
    pub commits: u64,
    pub term_count: u64,
}

/// Populates a bucket store block by block.
///
/// Documents get consecutive ids in the order they are added. Each block's
/// `bloom_size` masks are accumulated in memory and appended once the block
/// holds [`DOCUMENTS_PER_BLOCK`] documents, so rows always reach the sink in
/// row-id order. [`finish`](Self::finish) consumes the writer: a populated
/// index is frozen.
pub struct IndexWriter<S: RowSink> {
    sink: S,
    hasher: TermHasher,
    commit_batch_size: usize,
    /// Masks of the block currently being filled
    block: Vec<u64>,
    block_id: BlockId,
    /// Documents already placed in the current block
    slot: u32,
    doc_count: u64,
    term_count: u64,
    rows_written: u64,
    uncommitted: usize,
    commits: u64,
}

impl<S: RowSink> IndexWriter<S> {
    /// Create a writer over `sink` with validated parameters
    pub fn new(sink: S, config: &IndexConfig) -> Result<Self, ConfigError> {
        let hasher = TermHasher::from_config(config)?;
        Ok(Self {
            sink,
            block: vec![0u64; config.bloom_size as usize],
            hasher,
            commit_batch_size: config.commit_batch_size,
            block_id: 0,
            slot: 0,
            doc_count: 0,
            term_count: 0,
            rows_written: 0,
            uncommitted: 0,
            commits: 0,
        })
    }

    pub fn hasher(&self) -> &TermHasher {
        &self.hasher
    }

    /// Number of documents added so far
    pub fn doc_count(&self) -> u64 {
        self.doc_count
    }

    /// Add a document given its terms
    pub fn add_document<I, T>(&mut self, terms: I) -> Result<DocId, StoreError>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let hashed = self.hasher.hash_document(terms);
        self.add_hashed(&hashed)
    }

    /// Add a document whose terms were already hashed with [`Self::hasher`].
    ///
    /// A document without terms still takes an id and a slot.
    pub fn add_hashed(&mut self, doc: &HashedDocument) -> Result<DocId, StoreError> {
        let id = doc_id(self.block_id, self.slot);
        let bit = 1u64 << self.slot;
        for &bucket in &doc.buckets {
            self.block[bucket as usize] |= bit;
        }

        self.doc_count += 1;
        self.term_count += doc.term_count as u64;
        self.slot += 1;

        if self.slot == DOCUMENTS_PER_BLOCK {
            self.flush_block()?;
        }

        Ok(id)
    }

    /// Append the current block's rows and reset the accumulator
    fn flush_block(&mut self) -> Result<(), StoreError> {
        let bloom_size = self.hasher.bloom_size();
        for bucket in 0..bloom_size {
            let row = row_id(self.block_id, bucket, bloom_size);
            self.sink.append(row, self.block[bucket as usize])?;
            self.rows_written += 1;
            self.uncommitted += 1;

            if self.uncommitted >= self.commit_batch_size {
                self.commit()?;
            }
        }

        self.block.fill(0);
        self.block_id += 1;
        self.slot = 0;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        self.sink.commit()?;
        self.commits += 1;
        debug!(rows = self.rows_written, "committed bucket rows");
        self.uncommitted = 0;
        Ok(())
    }

    /// Flush a partial final block, commit, and hand back the sink
    pub fn finish(mut self) -> Result<(S, BuildSummary), StoreError> {
        if self.slot > 0 {
            self.flush_block()?;
        }
        if self.uncommitted > 0 || self.commits == 0 {
            self.commit()?;
        }

        let summary = BuildSummary {
            doc_count: self.doc_count,
            row_count: self.rows_written,
            block_count: self.block_id,
            commits: self.commits,
            term_count: self.term_count,
        };
        Ok((self.sink, summary))
    }
}
