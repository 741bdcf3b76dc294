// rust/corpus-core/src/dataset/mod.rs

//! Indexed datasets.
//!
//! A split reads its input through the [`IndexedDataset`] trait: a length
//! and random access to records by index. Each record carries exactly one
//! payload column, either `tokens` or `text`, and the column of record 0
//! decides the schema of the whole split (see [`detect_column`]).
//!
//! Two readers are provided besides the in-memory one:
//!
//! - [`ShardedDataset`] reads a shard group, or a partition root holding
//!   one group per worker, as produced by a previous split.
//! - [`JsonlDataset`] reads newline-delimited JSON objects.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use corpus_core::config::StorageConfig;
//! use corpus_core::dataset::{detect_column, IndexedDataset, JsonlDataset};
//! use corpus_core::storage::LocalStorage;
//!
//! let storage = Arc::new(LocalStorage::new(&StorageConfig::default())?);
//! let dataset = JsonlDataset::open(storage, "corpus.jsonl")?;
//! println!("{} records of {}", dataset.len(), detect_column(&dataset)?);
//! # Ok::<(), corpus_core::CorpusError>(())
//! ```

mod jsonl;
mod schema;
mod sharded;
mod traits;

pub use jsonl::JsonlDataset;
pub use schema::{detect_column, ColumnSchema};
pub use sharded::ShardedDataset;
pub use traits::{Column, InMemoryDataset, IndexedDataset, Record};
