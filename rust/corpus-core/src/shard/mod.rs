// rust/corpus-core/src/shard/mod.rs

//! Shard groups: the on-disk output of a split.
//!
//! Each worker writes its records into one shard group through a
//! [`ShardWriter`]. Groups can then be merged under their partition root
//! with [`merge_shard_groups`] and read back with
//! [`ShardedDataset`](crate::dataset::ShardedDataset).
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use corpus_core::config::StorageConfig;
//! use corpus_core::dataset::{Column, Record};
//! use corpus_core::shard::{ShardWriter, ShardWriterOptions};
//! use corpus_core::storage::LocalStorage;
//!
//! let storage = Arc::new(LocalStorage::new(&StorageConfig::default())?);
//! let summary = ShardWriter::scoped(
//!     storage,
//!     "valid/0",
//!     Column::Text,
//!     ShardWriterOptions::default(),
//!     |writer| writer.write(&Record::Text("hello".into())),
//! )?;
//! println!("{} samples in {} shards", summary.samples, summary.shards);
//! # Ok::<(), corpus_core::CorpusError>(())
//! ```

mod format;
mod merge;
mod writer;

pub use format::{
    checksum, decode_payload, encode_payload, Compression, DecodedShard, ShardBuffer, ShardIndex,
    ShardInfo, INDEX_FILE, INDEX_VERSION,
};
pub use merge::{collect_shard_groups, merge_shard_groups};
pub use writer::{ShardGroupSummary, ShardWriter, ShardWriterOptions};
