//! Error types for index configuration, storage and query execution

use crate::index::types::RowId;
use thiserror::Error;

/// Invalid index-wide parameters. Fatal before any build or query starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("bloom_size must be positive, got {0}")]
    InvalidBloomSize(u32),

    #[error("documents_per_block must match the mask width: {got} != {expected}")]
    InvalidDocumentsPerBlock { got: u32, expected: u32 },

    #[error("num_hashes must be between 1 and {max}, got {got}")]
    InvalidHashCount { got: u8, max: u8 },

    #[error("gram_size must be between 1 and {max}, got {got}")]
    InvalidGramSize { got: usize, max: usize },

    #[error("commit_batch_size must be positive")]
    InvalidCommitBatchSize,

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Failures of the bucket-row storage layer
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt bucket store: {0}")]
    Corrupt(String),

    #[error("rows must be appended in id order: expected {expected}, got {got}")]
    OutOfOrder { expected: RowId, got: RowId },

    #[error("index parameters disagree: {0}")]
    ParameterMismatch(String),

    #[error("index metadata error: {0}")]
    Meta(#[from] serde_json::Error),

    #[error("index already exists at {0} (use --force to rebuild)")]
    AlreadyExists(String),
}

/// Top-level error for building and querying an index
#[derive(Debug, Error)]
pub enum IndexError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("query cancelled")]
    Cancelled,

    #[error("failed to start scan workers: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl From<std::io::Error> for IndexError {
    fn from(err: std::io::Error) -> Self {
        IndexError::Store(StoreError::Io(err))
    }
}

pub type Result<T, E = IndexError> = std::result::Result<T, E>;
