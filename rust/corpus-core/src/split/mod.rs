// rust/corpus-core/src/split/mod.rs

//! Deterministic train/validation splitting.
//!
//! A split runs in four steps:
//!
//! 1. [`RightSetSampler`] draws the right (validation) indices.
//! 2. [`resolve_left_indices`] takes the complement and checks that the two
//!    sets partition the dataset exactly.
//! 3. [`write_partition`] writes each partition with a pool of worker
//!    threads, one shard group per worker.
//! 4. Optionally, the worker groups of each partition are merged under a
//!    root index.
//!
//! [`Splitter`] runs all of it from a [`SplitConfig`](crate::config::SplitConfig).

mod dispatch;
mod resolver;
mod runner;
mod sampler;

pub use dispatch::{chunk_indices, write_partition, PartitionSummary, PartitionTarget, WorkerSummary};
pub use resolver::{resolve_left_indices, verify_partition};
pub use runner::{SplitSummary, Splitter, LEFT_PARTITION, RIGHT_PARTITION};
pub use sampler::{sample_right_indices, RightSetSampler};
