//! Index configuration
//!
//! Values are resolved with priority: CLI flags > environment variables >
//! config file (`[index]` section) > defaults. The build-time parameters end up
//! in meta.json; at query time [`IndexMeta::apply_to`](crate::index::IndexMeta::apply_to)
//! overrides whatever this config says about them.

use crate::error::ConfigError;
use crate::index::types::DOCUMENTS_PER_BLOCK;
use crate::query::AccessStrategy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEFAULT_BLOOM_SIZE: u32 = 2048;
pub const DEFAULT_NUM_HASHES: u8 = 3;
pub const DEFAULT_GRAM_SIZE: usize = 3;
pub const DEFAULT_COMMIT_BATCH_SIZE: usize = DOCUMENTS_PER_BLOCK as usize;

pub const MAX_NUM_HASHES: u8 = 16;
pub const MAX_GRAM_SIZE: usize = 8;

/// Index-wide parameters plus query-time knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Buckets per block (filter width)
    pub bloom_size: u32,
    /// Documents per bucket mask; fixed by the mask width
    pub documents_per_block: u32,
    /// Hash functions applied to each gram
    pub num_hashes: u8,
    /// Length of the overlapping n-grams a term is split into
    pub gram_size: usize,
    /// Rows per write commit during population
    pub commit_batch_size: usize,
    /// Worker threads for parallel scans; 0 means one per CPU
    pub storage_concurrency: usize,
    /// Bucket fetch policy used by queries
    pub strategy: AccessStrategy,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            bloom_size: DEFAULT_BLOOM_SIZE,
            documents_per_block: DOCUMENTS_PER_BLOCK,
            num_hashes: DEFAULT_NUM_HASHES,
            gram_size: DEFAULT_GRAM_SIZE,
            commit_batch_size: DEFAULT_COMMIT_BATCH_SIZE,
            storage_concurrency: 0,
            strategy: AccessStrategy::default(),
        }
    }
}

/// `[index]` section of the config file; every key optional
#[derive(Debug, Default, Deserialize)]
pub struct IndexSection {
    pub bloom_size: Option<u32>,
    pub documents_per_block: Option<u32>,
    pub num_hashes: Option<u8>,
    pub gram_size: Option<usize>,
    pub commit_batch_size: Option<usize>,
    pub storage_concurrency: Option<usize>,
    pub strategy: Option<AccessStrategy>,
}

/// Config file structure
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub index: IndexSection,
}

impl IndexConfig {
    /// Load config: defaults, then the optional file, then `BLOOMSIG_*`
    /// environment variables. Does not validate; call [`validate`](Self::validate)
    /// once CLI overrides are applied.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = config_path {
            let content = fs::read_to_string(path)?;
            let file: ConfigFile = toml::from_str(&content)?;
            config.apply_file(file);
        }

        config.apply_env_with(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    fn apply_file(&mut self, file: ConfigFile) {
        let section = file.index;
        if let Some(v) = section.bloom_size {
            self.bloom_size = v;
        }
        if let Some(v) = section.documents_per_block {
            self.documents_per_block = v;
        }
        if let Some(v) = section.num_hashes {
            self.num_hashes = v;
        }
        if let Some(v) = section.gram_size {
            self.gram_size = v;
        }
        if let Some(v) = section.commit_batch_size {
            self.commit_batch_size = v;
        }
        if let Some(v) = section.storage_concurrency {
            self.storage_concurrency = v;
        }
        if let Some(v) = section.strategy {
            self.strategy = v;
        }
    }

    /// Apply environment overrides through `lookup`. Unparseable values are an
    /// error rather than silently ignored.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("BLOOMSIG_BLOOM_SIZE") {
            self.bloom_size = parse_env("BLOOMSIG_BLOOM_SIZE", &v)?;
        }
        if let Some(v) = lookup("BLOOMSIG_NUM_HASHES") {
            self.num_hashes = parse_env("BLOOMSIG_NUM_HASHES", &v)?;
        }
        if let Some(v) = lookup("BLOOMSIG_GRAM_SIZE") {
            self.gram_size = parse_env("BLOOMSIG_GRAM_SIZE", &v)?;
        }
        if let Some(v) = lookup("BLOOMSIG_COMMIT_BATCH_SIZE") {
            self.commit_batch_size = parse_env("BLOOMSIG_COMMIT_BATCH_SIZE", &v)?;
        }
        if let Some(v) = lookup("BLOOMSIG_STORAGE_CONCURRENCY") {
            self.storage_concurrency = parse_env("BLOOMSIG_STORAGE_CONCURRENCY", &v)?;
        }
        if let Some(v) = lookup("BLOOMSIG_STRATEGY") {
            self.strategy = parse_env("BLOOMSIG_STRATEGY", &v)?;
        }
        Ok(())
    }

    /// Reject parameters the index cannot be built or queried with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.documents_per_block != DOCUMENTS_PER_BLOCK {
            return Err(ConfigError::InvalidDocumentsPerBlock {
                got: self.documents_per_block,
                expected: DOCUMENTS_PER_BLOCK,
            });
        }

        check_hasher_params(self.bloom_size, self.num_hashes, self.gram_size)?;

        if self.commit_batch_size == 0 {
            return Err(ConfigError::InvalidCommitBatchSize);
        }

        Ok(())
    }

    /// Worker count for parallel scans (resolves 0 to the CPU count)
    pub fn effective_storage_concurrency(&self) -> usize {
        if self.storage_concurrency == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        } else {
            self.storage_concurrency
        }
    }
}

/// Reject hashing parameters a [`TermHasher`](crate::utils::TermHasher) cannot work with
pub(crate) fn check_hasher_params(
    bloom_size: u32,
    num_hashes: u8,
    gram_size: usize,
) -> Result<(), ConfigError> {
    if bloom_size == 0 {
        return Err(ConfigError::InvalidBloomSize(bloom_size));
    }

    if num_hashes == 0 || num_hashes > MAX_NUM_HASHES {
        return Err(ConfigError::InvalidHashCount {
            got: num_hashes,
            max: MAX_NUM_HASHES,
        });
    }

    if gram_size == 0 || gram_size > MAX_GRAM_SIZE {
        return Err(ConfigError::InvalidGramSize {
            got: gram_size,
            max: MAX_GRAM_SIZE,
        });
    }

    Ok(())
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}
