// rust/corpus-core/src/split/runner.rs

//! End-to-end split of one dataset into a left and a right partition.

use std::sync::Arc;

use crate::config::SplitConfig;
use crate::dataset::{detect_column, Column, IndexedDataset};
use crate::error::Result;
use crate::shard::{merge_shard_groups, ShardWriterOptions};
use crate::storage::StorageBackend;

use super::dispatch::{write_partition, PartitionSummary, PartitionTarget};
use super::resolver::resolve_left_indices;
use super::sampler::RightSetSampler;

/// Name of the left partition in logs and summaries.
pub const LEFT_PARTITION: &str = "train";
/// Name of the right partition in logs and summaries.
pub const RIGHT_PARTITION: &str = "valid";

/// Result of a completed split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitSummary {
    pub total: usize,
    pub left: usize,
    pub right: usize,
    pub column: Column,
    pub left_partition: PartitionSummary,
    pub right_partition: PartitionSummary,
}

/// Runs a split against a storage backend.
///
/// ```no_run
/// use std::sync::Arc;
/// use corpus_core::config::SplitConfig;
/// use corpus_core::dataset::ShardedDataset;
/// use corpus_core::split::Splitter;
/// use corpus_core::storage::LocalStorage;
///
/// let config = SplitConfig::default();
/// let storage = Arc::new(LocalStorage::new(&config.storage)?);
/// let dataset = ShardedDataset::open(storage.clone(), "corpus")?;
/// let summary = Splitter::new(storage, config).run(&dataset)?;
/// println!("train {} / valid {}", summary.left, summary.right);
/// # Ok::<(), corpus_core::CorpusError>(())
/// ```
pub struct Splitter {
    storage: Arc<dyn StorageBackend>,
    config: SplitConfig,
}

impl Splitter {
    pub fn new(storage: Arc<dyn StorageBackend>, config: SplitConfig) -> Self {
        Self { storage, config }
    }

    pub fn config(&self) -> &SplitConfig {
        &self.config
    }

    /// Splits `dataset` and writes both partitions.
    ///
    /// Configuration is validated and the payload column detected before
    /// anything is written. The left partition is written in full before
    /// the right one is started.
    pub fn run(&self, dataset: &dyn IndexedDataset) -> Result<SplitSummary> {
        self.config.validate()?;
        let options = ShardWriterOptions::from_config(&self.config.output)?;

        let n = dataset.len();
        let column = detect_column(dataset)?;

        let sampling = &self.config.split;
        let right = RightSetSampler::new(sampling.seed, sampling.strategy).sample(
            n,
            sampling.right_prob,
            sampling.right_max,
        )?;
        let left = resolve_left_indices(n, &right)?;

        tracing::info!(
            dataset = dataset.name(),
            column = %column,
            total = n,
            train = left.len(),
            valid = right.len(),
            "resolved partitions"
        );

        let target = |name: &str, root: &std::path::Path| PartitionTarget {
            name: name.to_string(),
            root: root.to_path_buf(),
            column,
            options,
            num_workers: sampling.num_workers,
        };

        let left_target = target(LEFT_PARTITION, &self.config.output.left_path);
        let right_target = target(RIGHT_PARTITION, &self.config.output.right_path);

        let left_partition = write_partition(&self.storage, &left_target, dataset, &left)?;
        let right_partition = write_partition(&self.storage, &right_target, dataset, &right)?;

        if self.config.output.merge {
            merge_shard_groups(self.storage.as_ref(), &left_target.root)?;
            merge_shard_groups(self.storage.as_ref(), &right_target.root)?;
        }

        Ok(SplitSummary {
            total: n,
            left: left.len(),
            right: right.len(),
            column,
            left_partition,
            right_partition,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use crate::dataset::{InMemoryDataset, Record};
    use crate::error::CorpusError;
    use crate::storage::LocalStorage;
    use std::path::Path;
    use tempfile::TempDir;

    fn create_storage() -> (Arc<dyn StorageBackend>, TempDir) {
        let temp = TempDir::new().unwrap();
        let config = StorageConfig {
            base_path: temp.path().to_path_buf(),
            ..Default::default()
        };
        (Arc::new(LocalStorage::new(&config).unwrap()), temp)
    }

    fn config(right_prob: f64, right_max: usize, num_workers: usize) -> SplitConfig {
        let mut config = SplitConfig::default();
        config.split.right_prob = right_prob;
        config.split.right_max = right_max;
        config.split.num_workers = num_workers;
        config
    }

    #[test]
    fn test_everything_goes_right() {
        let (storage, _temp) = create_storage();
        let dataset = InMemoryDataset::numbered_tokens("mem", 10);

        let summary = Splitter::new(storage, config(1.0, 10, 2)).run(&dataset).unwrap();
        assert_eq!((summary.total, summary.left, summary.right), (10, 0, 10));
        assert_eq!(summary.left_partition.samples, 0);
        assert_eq!(summary.right_partition.samples, 10);
    }

    #[test]
    fn test_nothing_goes_right() {
        let (storage, _temp) = create_storage();
        let dataset = InMemoryDataset::numbered_tokens("mem", 100);

        let summary = Splitter::new(storage.clone(), config(0.0, 1000, 3))
            .run(&dataset)
            .unwrap();
        assert_eq!(summary.right, 0);
        assert_eq!(summary.left, 100);
        assert_eq!(summary.column, Column::Tokens);
        // Every right worker still leaves an empty, finished group.
        for w in 0..3 {
            let index = format!("valid/{w}/index.json");
            assert!(storage.exists(Path::new(&index)).unwrap());
        }
    }

    #[test]
    fn test_merge_option_writes_root_indexes() {
        let (storage, _temp) = create_storage();
        let dataset = InMemoryDataset::new(
            "txt",
            (0..50).map(|i| Record::Text(format!("line {i}"))).collect(),
        );
        let mut cfg = config(0.2, 1000, 4);
        cfg.output.merge = true;
        cfg.output.compression = "lz4".into();

        let summary = Splitter::new(storage.clone(), cfg).run(&dataset).unwrap();
        assert_eq!(summary.left + summary.right, 50);
        assert!(storage.exists(Path::new("train/index.json")).unwrap());
        assert!(storage.exists(Path::new("valid/index.json")).unwrap());
    }

    #[test]
    fn test_invalid_config_writes_nothing() {
        let (storage, _temp) = create_storage();
        let dataset = InMemoryDataset::numbered_tokens("mem", 10);

        let err = Splitter::new(storage.clone(), config(0.5, 10, 0))
            .run(&dataset)
            .unwrap_err();
        assert!(matches!(err, CorpusError::Config { .. }));
        assert!(!storage.exists(Path::new("train")).unwrap());
        assert!(!storage.exists(Path::new("valid")).unwrap());
    }

    #[test]
    fn test_empty_dataset_is_error() {
        let (storage, _temp) = create_storage();
        let dataset = InMemoryDataset::new("empty", vec![]);

        assert!(matches!(
            Splitter::new(storage, SplitConfig::default()).run(&dataset),
            Err(CorpusError::Dataset { .. })
        ));
    }
}
