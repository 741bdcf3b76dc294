// rust/corpus-core/src/lib.rs

//! Corpus Split - Core Library
//!
//! Deterministic, reproducible train/validation splitting of large indexed
//! corpora. A seeded sampler picks a sparse validation subset, its
//! complement is verified to partition the dataset exactly, and both
//! partitions are written in parallel as compressed, checksummed shard
//! groups.

pub mod config;
pub mod error;
pub mod storage;

// Re-export commonly used types for convenience
pub use config::{SamplingStrategy, SplitConfig};
pub use error::{CorpusError, Result};
pub use storage::{LocalStorage, ObjectMeta, StorageBackend, StorageReader, StorageWriter};

pub mod dataset;
pub use dataset::{
    detect_column, Column, IndexedDataset, InMemoryDataset, JsonlDataset, Record, ShardedDataset,
};

pub mod shard;
pub use shard::{merge_shard_groups, Compression, ShardIndex, ShardWriter, ShardWriterOptions};

pub mod split;
pub use split::{sample_right_indices, SplitSummary, Splitter};
