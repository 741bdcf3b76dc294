// rust/corpus-core/src/split/dispatch.rs

//! Parallel partition writing.
//!
//! A partition's indices are cut into one contiguous chunk per worker. Each
//! worker thread writes its chunk, in order, into its own shard group
//! `<root>/<worker_id>`. All workers run to completion or failure before the
//! partition result is decided.

use std::any::Any;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use crate::dataset::{Column, IndexedDataset};
use crate::error::{CorpusError, Result};
use crate::shard::{ShardWriter, ShardWriterOptions};
use crate::storage::StorageBackend;

/// Where and how one partition is written.
#[derive(Debug, Clone)]
pub struct PartitionTarget {
    /// Partition name used in logs and errors ("train", "valid").
    pub name: String,
    /// Output root; worker groups are created beneath it.
    pub root: PathBuf,
    pub column: Column,
    pub options: ShardWriterOptions,
    pub num_workers: usize,
}

/// Output of one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSummary {
    pub worker_id: usize,
    pub samples: u64,
    pub shards: usize,
    /// Bytes written to storage.
    pub bytes: u64,
}

/// Output of one partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionSummary {
    pub name: String,
    pub root: PathBuf,
    pub samples: u64,
    pub workers: Vec<WorkerSummary>,
}

/// Splits `indices` into exactly `num_workers` contiguous chunks.
///
/// Chunk sizes differ by at most one, the longer chunks first. Order is
/// preserved, so concatenating the chunks gives back `indices`.
///
/// # Errors
///
/// Returns a configuration error if `num_workers` is zero.
pub fn chunk_indices(indices: &[usize], num_workers: usize) -> Result<Vec<&[usize]>> {
    if num_workers == 0 {
        return Err(CorpusError::config("num_workers must be > 0"));
    }

    let base = indices.len() / num_workers;
    let extra = indices.len() % num_workers;

    let mut chunks = Vec::with_capacity(num_workers);
    let mut rest = indices;
    for worker_id in 0..num_workers {
        let len = base + usize::from(worker_id < extra);
        let (chunk, tail) = rest.split_at(len);
        chunks.push(chunk);
        rest = tail;
    }
    Ok(chunks)
}

/// Writes the records at `indices` into `target`, one thread per worker.
///
/// # Errors
///
/// If any worker fails, returns the failure of the lowest failing worker
/// once every worker has stopped. Groups finished by other workers are left
/// in place.
pub fn write_partition(
    storage: &Arc<dyn StorageBackend>,
    target: &PartitionTarget,
    dataset: &dyn IndexedDataset,
    indices: &[usize],
) -> Result<PartitionSummary> {
    let chunks = chunk_indices(indices, target.num_workers)?;

    tracing::info!(
        partition = %target.name,
        root = %target.root.display(),
        samples = indices.len(),
        workers = target.num_workers,
        "writing partition"
    );

    let results: Vec<Result<WorkerSummary>> = thread::scope(|scope| {
        let handles: Vec<_> = chunks
            .iter()
            .enumerate()
            .map(|(worker_id, &chunk)| {
                let storage = Arc::clone(storage);
                thread::Builder::new()
                    .name(format!("{}-writer-{worker_id}", target.name))
                    .spawn_scoped(scope, move || {
                        run_worker(storage, target, worker_id, dataset, chunk)
                    })
            })
            .collect();

        handles
            .into_iter()
            .enumerate()
            .map(|(worker_id, handle)| {
                let handle = handle.map_err(|e| {
                    CorpusError::worker(
                        &target.name,
                        worker_id,
                        CorpusError::storage_with_source(
                            &target.root,
                            "failed to spawn writer thread",
                            e,
                        ),
                    )
                })?;
                match handle.join() {
                    Ok(result) => result.map_err(|e| CorpusError::worker(&target.name, worker_id, e)),
                    Err(payload) => Err(CorpusError::worker_panicked(
                        &target.name,
                        worker_id,
                        panic_message(payload.as_ref()),
                    )),
                }
            })
            .collect()
    });

    let mut workers = Vec::with_capacity(results.len());
    let mut first_failure = None;
    for result in results {
        match result {
            Ok(summary) => workers.push(summary),
            Err(e) => {
                let cause = std::error::Error::source(&e).map(|c| c.to_string());
                tracing::error!(
                    partition = %target.name,
                    error = %e,
                    cause = cause.as_deref().unwrap_or("-"),
                    "partition worker failed"
                );
                if first_failure.is_none() {
                    first_failure = Some(e);
                }
            }
        }
    }
    if let Some(e) = first_failure {
        return Err(e);
    }

    let summary = PartitionSummary {
        name: target.name.clone(),
        root: target.root.clone(),
        samples: workers.iter().map(|w| w.samples).sum(),
        workers,
    };
    tracing::info!(partition = %summary.name, samples = summary.samples, "partition written");
    Ok(summary)
}

fn run_worker(
    storage: Arc<dyn StorageBackend>,
    target: &PartitionTarget,
    worker_id: usize,
    dataset: &dyn IndexedDataset,
    chunk: &[usize],
) -> Result<WorkerSummary> {
    let dir = target.root.join(worker_id.to_string());
    tracing::debug!(partition = %target.name, worker_id, samples = chunk.len(), "worker started");

    let group = ShardWriter::scoped(storage, dir, target.column, target.options, |writer| {
        for &index in chunk {
            let record = dataset.get_item(index)?;
            target.column.check(index, &record)?;
            writer.write(&record)?;
        }
        Ok(())
    })?;

    tracing::debug!(
        partition = %target.name,
        worker_id,
        samples = group.samples,
        shards = group.shards,
        "worker finished"
    );
    Ok(WorkerSummary {
        worker_id,
        samples: group.samples,
        shards: group.shards,
        bytes: group.zip_bytes,
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("worker panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("worker panicked: {s}")
    } else {
        "worker panicked".to_string()
    }
}
