// rust/corpus-core/src/storage/mod.rs

//! Storage abstraction for dataset readers and shard writers.
//!
//! # Example
//!
//! ```no_run
//! use corpus_core::config::StorageConfig;
//! use corpus_core::storage::{LocalStorage, StorageBackend};
//! use std::io::Write;
//! use std::path::Path;
//!
//! let storage = LocalStorage::new(&StorageConfig::default()).unwrap();
//!
//! let mut writer = storage.open_write(Path::new("example.txt")).unwrap();
//! writer.write_all(b"Hello, world!").unwrap();
//! writer.finish().unwrap();
//!
//! let content = storage.read_all(Path::new("example.txt")).unwrap();
//! assert_eq!(content, b"Hello, world!");
//! ```

mod local;
mod traits;

pub use local::LocalStorage;
pub use traits::{ObjectMeta, StorageBackend, StorageReader, StorageWriter};
