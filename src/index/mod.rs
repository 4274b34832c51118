pub mod build;
pub mod config;
pub mod reader;
pub mod stats;
pub mod store;
pub mod types;
pub mod writer;

pub use build::{build_index, load_labels};
pub use config::IndexConfig;
pub use reader::FileStore;
pub use store::{BucketStore, CountingStore, MemoryStore};
pub use types::*;
pub use writer::{BuildSummary, FileSink, IndexWriter, RowSink};
