use crate::error::{IndexError, StoreError};
use crate::index::reader::FileStore;
use crate::index::store::BucketStore;
use crate::index::types::{DOCUMENTS_PER_BLOCK, IndexMeta};
use crate::query::BloomIndex;
use crate::utils::false_positive_bound;
use std::path::Path;

/// Rows read per batch while counting set bits
const SCAN_BATCH: u64 = 4096;

/// Fill statistics of a built index
#[derive(Debug, Clone, PartialEq)]
pub struct IndexStats {
    pub doc_count: u64,
    pub block_count: u64,
    pub bloom_size: u32,
    pub num_hashes: u8,
    pub set_bits: u64,
    /// Fraction of all mask bits that are set
    pub density: f64,
    /// `(1 - e^(-kn/m))^k` for the average terms per document
    pub theoretical_fp: f64,
    /// `density^k`, the chance a random bucket set is fully covered
    pub estimated_fp: f64,
}

impl IndexStats {
    /// Scan every row of `store` and combine with the build metadata
    pub fn collect<S: BucketStore>(store: &S, meta: &IndexMeta) -> Result<Self, StoreError> {
        let total_rows = store.total_rows();
        let mut set_bits = 0u64;

        let mut start = 0;
        while start < total_rows {
            let end = (start + SCAN_BATCH).min(total_rows);
            let ids: Vec<u64> = (start..end).collect();
            set_bits += store
                .fetch_many(&ids)?
                .into_iter()
                .map(|(_, mask)| mask.count_ones() as u64)
                .sum::<u64>();
            start = end;
        }

        let total_bits = total_rows * DOCUMENTS_PER_BLOCK as u64;
        let density = if total_bits > 0 {
            set_bits as f64 / total_bits as f64
        } else {
            0.0
        };

        Ok(Self {
            doc_count: meta.doc_count,
            block_count: meta.block_count,
            bloom_size: meta.bloom_size,
            num_hashes: meta.num_hashes,
            set_bits,
            density,
            theoretical_fp: false_positive_bound(
                meta.num_hashes,
                meta.avg_terms_per_doc,
                meta.bloom_size,
            ),
            estimated_fp: density.powi(meta.num_hashes as i32),
        })
    }
}

/// Display index statistics
pub fn show_stats(index_dir: &Path) -> Result<(), IndexError> {
    let (index, meta) = BloomIndex::<FileStore>::open(index_dir)?;
    let stats = IndexStats::collect(index.store(), &meta)?;

    println!("Index Statistics");
    println!("================");
    println!();
    println!("Index location:   {}", index_dir.display());
    println!("Index version:    {}", meta.version);
    println!("Document count:   {}", stats.doc_count);
    println!("Block count:      {}", stats.block_count);
    println!("Row count:        {}", meta.row_count);
    println!();
    println!("Bloom size:       {}", stats.bloom_size);
    println!("Hash functions:   {}", stats.num_hashes);
    println!("Gram size:        {}", meta.gram_size);
    println!("Terms per doc:    {:.1}", meta.avg_terms_per_doc);
    println!();
    println!("Bit density:      {:.4}", stats.density);
    println!("FP bound:         {:.6}", stats.theoretical_fp);
    println!("FP (density^k):   {:.6}", stats.estimated_fp);

    if let Ok(size) = dir_size(index_dir) {
        println!();
        println!("Index size:       {}", format_size(size));
    }

    println!();
    println!("Created:          {}", format_timestamp(meta.created_at));

    Ok(())
}

fn dir_size(path: &Path) -> std::io::Result<u64> {
    let mut size = 0;
    for entry in std::fs::read_dir(path)? {
        let entry = entry?;
        if entry.path().is_file() {
            size += entry.metadata()?.len();
        }
    }
    Ok(size)
}

/// Format byte size to human readable
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

fn format_timestamp(ts: u64) -> String {
    use std::time::{Duration, UNIX_EPOCH};
    let datetime = UNIX_EPOCH + Duration::from_secs(ts);
    format!("{:?}", datetime)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::store::MemoryStore;
    use crate::index::types::INDEX_VERSION;

    fn meta(bloom_size: u32, num_hashes: u8, rows: u64) -> IndexMeta {
        IndexMeta {
            version: INDEX_VERSION,
            bloom_size,
            documents_per_block: DOCUMENTS_PER_BLOCK,
            num_hashes,
            gram_size: 3,
            hasher_fingerprint: Vec::new(),
            doc_count: 64,
            row_count: rows,
            block_count: rows / bloom_size as u64,
            avg_terms_per_doc: 20.0,
            created_at: 0,
        }
    }

    #[test]
    fn test_density() {
        // 4 rows * 64 bits = 256 bits, 64 + 32 set
        let store = MemoryStore::from_rows(vec![u64::MAX, 0, 0xFFFF_FFFF, 0]);
        let stats = IndexStats::collect(&store, &meta(4, 2, 4)).unwrap();
        assert_eq!(stats.set_bits, 96);
        assert!((stats.density - 0.375).abs() < 1e-12);
        assert!((stats.estimated_fp - 0.140625).abs() < 1e-12);
    }

    #[test]
    fn test_empty_index_stats() {
        let stats = IndexStats::collect(&MemoryStore::new(), &meta(8, 3, 0)).unwrap();
        assert_eq!(stats.set_bits, 0);
        assert_eq!(stats.density, 0.0);
        assert_eq!(stats.estimated_fp, 0.0);
    }

    #[test]
    fn test_theoretical_bound_uses_meta() {
        let stats = IndexStats::collect(&MemoryStore::new(), &meta(256, 3, 0)).unwrap();
        assert!((stats.theoretical_fp - 0.00912).abs() < 0.0005);
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 bytes");
        assert_eq!(format_size(2048), "2.00 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.00 MB");
    }
}
