// rust/corpus-core/src/dataset/sharded.rs

//! Reading shard groups back as an [`IndexedDataset`].

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use super::traits::{Column, IndexedDataset, Record};
use crate::error::{CorpusError, Result};
use crate::shard::{
    checksum, collect_shard_groups, decode_payload, Compression, DecodedShard, ShardIndex,
    ShardInfo, INDEX_FILE,
};
use crate::storage::StorageBackend;

/// Decoded shards kept between lookups by [`ShardedDataset::open`].
pub const DEFAULT_CACHED_SHARDS: usize = 4;

/// A shard group, or a partition root of worker groups, opened for reads.
pub struct ShardedDataset {
    name: String,
    storage: Arc<dyn StorageBackend>,
    root: PathBuf,
    column: Column,
    compression: Compression,
    shards: Vec<ShardInfo>,
    /// Exclusive end sample of each shard.
    ends: Vec<u64>,
    /// Least recently used first.
    cache: Mutex<VecDeque<(usize, Arc<DecodedShard>)>>,
    cache_capacity: usize,
}

impl std::fmt::Debug for ShardedDataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardedDataset")
            .field("root", &self.root)
            .field("column", &self.column)
            .field("shards", &self.shards.len())
            .field("samples", &self.len())
            .field("cache_capacity", &self.cache_capacity)
            .finish()
    }
}

impl ShardedDataset {
    /// Opens `root`.
    ///
    /// If `root/index.json` exists it is used as is; otherwise the numbered
    /// worker groups under `root` are collected in memory.
    pub fn open(storage: Arc<dyn StorageBackend>, root: impl AsRef<Path>) -> Result<Self> {
        Self::with_cache(storage, root, DEFAULT_CACHED_SHARDS)
    }

    /// Opens `root` keeping up to `capacity` decoded shards in memory.
    ///
    /// Concurrent readers walking different shards each need one slot, so a
    /// dataset shared by `k` writer threads wants at least `k + 1`.
    pub fn with_cache(
        storage: Arc<dyn StorageBackend>,
        root: impl AsRef<Path>,
        capacity: usize,
    ) -> Result<Self> {
        let root = root.as_ref();
        let capacity = capacity.max(1);
        let index_path = root.join(INDEX_FILE);
        let index = if storage.exists(&index_path)? {
            ShardIndex::from_json(&storage.read_all(&index_path)?)?
        } else {
            collect_shard_groups(storage.as_ref(), root)?
        };

        let column = index.columns.column()?;
        let ends = index
            .shards
            .iter()
            .scan(0u64, |total, shard| {
                *total += shard.samples;
                Some(*total)
            })
            .collect::<Vec<_>>();

        tracing::debug!(
            root = %root.display(),
            column = %column,
            shards = index.shards.len(),
            samples = ends.last().copied().unwrap_or(0),
            "opened sharded dataset"
        );

        Ok(Self {
            name: root.display().to_string(),
            storage,
            root: root.to_path_buf(),
            column,
            compression: index.compression,
            shards: index.shards,
            ends,
            cache: Mutex::new(VecDeque::with_capacity(capacity)),
            cache_capacity: capacity,
        })
    }

    pub fn column(&self) -> Column {
        self.column
    }

    pub fn num_shards(&self) -> usize {
        self.shards.len()
    }

    pub fn cache_capacity(&self) -> usize {
        self.cache_capacity
    }

    fn load_shard(&self, shard_idx: usize) -> Result<Arc<DecodedShard>> {
        {
            let mut cache = self.cache.lock();
            if let Some(pos) = cache.iter().position(|(i, _)| *i == shard_idx) {
                if let Some(entry) = cache.remove(pos) {
                    let shard = Arc::clone(&entry.1);
                    cache.push_back(entry);
                    return Ok(shard);
                }
            }
        }

        let info = &self.shards[shard_idx];
        let path = self.root.join(&info.basename);
        let raw = self.compression.decompress(&self.storage.read_all(&path)?)?;

        if raw.len() as u64 != info.raw_bytes {
            return Err(CorpusError::serialization(format!(
                "{}: expected {} raw bytes, got {}",
                path.display(),
                info.raw_bytes,
                raw.len()
            )));
        }
        let actual = checksum(&raw);
        if actual != info.checksum {
            return Err(CorpusError::serialization(format!(
                "{}: checksum mismatch: expected {:016x}, got {actual:016x}",
                path.display(),
                info.checksum
            )));
        }

        let shard = DecodedShard::parse(raw)?;
        if shard.samples() as u64 != info.samples {
            return Err(CorpusError::serialization(format!(
                "{}: index lists {} samples, shard holds {}",
                path.display(),
                info.samples,
                shard.samples()
            )));
        }

        let shard = Arc::new(shard);
        let mut cache = self.cache.lock();
        if !cache.iter().any(|(i, _)| *i == shard_idx) {
            while cache.len() >= self.cache_capacity {
                cache.pop_front();
            }
            cache.push_back((shard_idx, Arc::clone(&shard)));
        }
        Ok(shard)
    }
}

impl IndexedDataset for ShardedDataset {
    fn name(&self) -> &str {
        &self.name
    }

    fn len(&self) -> usize {
        self.ends.last().copied().unwrap_or(0) as usize
    }

    fn get_item(&self, index: usize) -> Result<Record> {
        if index >= self.len() {
            return Err(CorpusError::dataset(
                &self.name,
                format!("index {index} out of range (len {})", self.len()),
            ));
        }

        let shard_idx = self.ends.partition_point(|&end| end <= index as u64);
        let start = if shard_idx == 0 { 0 } else { self.ends[shard_idx - 1] };
        let local = (index as u64 - start) as usize;

        let shard = self.load_shard(shard_idx)?;
        let bytes = shard.sample(local).ok_or_else(|| {
            CorpusError::dataset(&self.name, format!("sample {index} missing from shard"))
        })?;
        decode_payload(self.column, bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use crate::shard::{merge_shard_groups, ShardWriter, ShardWriterOptions};
    use crate::split::{write_partition, PartitionTarget};
    use crate::storage::{LocalStorage, ObjectMeta, StorageReader, StorageWriter};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn create_storage() -> (Arc<dyn StorageBackend>, TempDir) {
        let temp = TempDir::new().unwrap();
        let config = StorageConfig {
            base_path: temp.path().to_path_buf(),
            ..Default::default()
        };
        (Arc::new(LocalStorage::new(&config).unwrap()), temp)
    }

    fn text(i: usize) -> Record {
        Record::Text(format!("record number {i}"))
    }

    fn write_text_group(
        storage: &Arc<dyn StorageBackend>,
        dir: &str,
        range: std::ops::Range<usize>,
        compression: Compression,
    ) {
        let options = ShardWriterOptions {
            compression,
            compression_level: 3,
            shard_size_limit: 40,
        };
        ShardWriter::scoped(storage.clone(), dir, Column::Text, options, |w| {
            range.clone().try_for_each(|i| w.write(&text(i)))
        })
        .unwrap();
    }

    #[test]
    fn test_reads_back_every_compression() {
        for compression in [Compression::None, Compression::Lz4, Compression::Zstd] {
            let (storage, _temp) = create_storage();
            write_text_group(&storage, "group", 0..25, compression);

            let ds = ShardedDataset::open(storage, "group").unwrap();
            assert_eq!(ds.len(), 25);
            assert_eq!(ds.column(), Column::Text);
            assert!(ds.num_shards() > 1);
            for i in (0..25).rev() {
                assert_eq!(ds.get_item(i).unwrap(), text(i), "{compression}");
            }
            assert!(ds.get_item(25).is_err());
        }
    }

    #[test]
    fn test_reads_worker_groups_without_root_index() {
        let (storage, _temp) = create_storage();
        write_text_group(&storage, "part/0", 0..4, Compression::None);
        write_text_group(&storage, "part/1", 4..7, Compression::None);
        write_text_group(&storage, "part/2", 7..7, Compression::None);

        let ds = ShardedDataset::open(storage.clone(), "part").unwrap();
        assert_eq!(ds.len(), 7);
        assert_eq!(ds.get_item(5).unwrap(), text(5));

        merge_shard_groups(storage.as_ref(), Path::new("part")).unwrap();
        let merged = ShardedDataset::open(storage, "part").unwrap();
        assert_eq!(merged.len(), 7);
        assert_eq!(merged.get_item(6).unwrap(), text(6));
    }

    #[test]
    fn test_detects_corruption() {
        let (storage, temp) = create_storage();
        write_text_group(&storage, "group", 0..3, Compression::None);

        let shard_path = temp.path().join("group/shard.00000.bin");
        let mut bytes = std::fs::read(&shard_path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        std::fs::write(&shard_path, bytes).unwrap();

        let ds = ShardedDataset::open(storage, "group").unwrap();
        assert!(matches!(
            ds.get_item(0),
            Err(CorpusError::Serialization { .. })
        ));
    }

    /// Counts shard file opens on top of another backend.
    struct CountingStorage {
        inner: Arc<dyn StorageBackend>,
        shard_reads: AtomicUsize,
    }

    impl CountingStorage {
        fn reads(&self) -> usize {
            self.shard_reads.load(Ordering::SeqCst)
        }
    }

    impl StorageBackend for CountingStorage {
        fn exists(&self, path: &Path) -> Result<bool> {
            self.inner.exists(path)
        }

        fn metadata(&self, path: &Path) -> Result<ObjectMeta> {
            self.inner.metadata(path)
        }

        fn open_read(&self, path: &Path) -> Result<Box<dyn StorageReader>> {
            let is_shard = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("shard."));
            if is_shard {
                self.shard_reads.fetch_add(1, Ordering::SeqCst);
            }
            self.inner.open_read(path)
        }

        fn open_write(&self, path: &Path) -> Result<Box<dyn StorageWriter>> {
            self.inner.open_write(path)
        }

        fn delete(&self, path: &Path) -> Result<()> {
            self.inner.delete(path)
        }

        fn list(&self, prefix: &Path) -> Result<Vec<String>> {
            self.inner.list(prefix)
        }

        fn rename(&self, from: &Path, to: &Path) -> Result<()> {
            self.inner.rename(from, to)
        }

        fn create_dir_all(&self, path: &Path) -> Result<()> {
            self.inner.create_dir_all(path)
        }
    }

    /// Writes `shards` shards of exactly 8 five-byte text records each.
    fn write_fixed_shards(storage: &Arc<dyn StorageBackend>, dir: &str, shards: usize) {
        // 4 + 8 * 9 offsets + 8 * 5 payload = 116 bytes seals after 8 records.
        let options = ShardWriterOptions {
            shard_size_limit: 116,
            ..Default::default()
        };
        ShardWriter::scoped(storage.clone(), dir, Column::Text, options, |w| {
            (0..shards * 8).try_for_each(|i| w.write(&Record::Text(format!("r{i:04}"))))
        })
        .unwrap();
    }

    fn counting(inner: Arc<dyn StorageBackend>) -> Arc<CountingStorage> {
        Arc::new(CountingStorage {
            inner,
            shard_reads: AtomicUsize::new(0),
        })
    }

    #[test]
    fn test_cache_sized_for_concurrent_readers() {
        let (storage, _temp) = create_storage();
        write_fixed_shards(&storage, "group", 8);

        // Eight readers, each on its own shard, taking turns record by record.
        let interleaved = |ds: &ShardedDataset| {
            assert_eq!(ds.num_shards(), 8);
            for step in 0..8 {
                for reader in 0..8 {
                    let i = reader * 8 + step;
                    assert_eq!(ds.get_item(i).unwrap(), Record::Text(format!("r{i:04}")));
                }
            }
        };

        let sized = counting(storage.clone());
        let ds = ShardedDataset::with_cache(sized.clone(), "group", 9).unwrap();
        interleaved(&ds);
        assert_eq!(sized.reads(), 8);

        let small = counting(storage);
        let ds = ShardedDataset::with_cache(small.clone(), "group", DEFAULT_CACHED_SHARDS).unwrap();
        interleaved(&ds);
        assert_eq!(small.reads(), 64);
    }

    #[test]
    fn test_cache_hit_refreshes_entry() {
        let (storage, _temp) = create_storage();
        write_fixed_shards(&storage, "group", 3);

        let counted = counting(storage);
        let ds = ShardedDataset::with_cache(counted.clone(), "group", 2).unwrap();
        ds.get_item(0).unwrap();
        ds.get_item(8).unwrap();
        // Touch shard 0 so shard 1 is the one evicted by shard 2.
        ds.get_item(1).unwrap();
        ds.get_item(16).unwrap();
        ds.get_item(2).unwrap();
        assert_eq!(counted.reads(), 3);
    }

    #[test]
    fn test_many_writers_read_each_shard_about_once() {
        let (storage, _temp) = create_storage();
        write_fixed_shards(&storage, "input", 48);

        let counted = counting(storage.clone());
        let workers = 12;
        let ds = ShardedDataset::with_cache(counted.clone(), "input", workers + 1).unwrap();
        let target = PartitionTarget {
            name: "train".to_string(),
            root: PathBuf::from("train"),
            column: Column::Text,
            options: ShardWriterOptions::default(),
            num_workers: workers,
        };
        let indices: Vec<usize> = (0..ds.len()).collect();

        let summary = write_partition(&storage, &target, &ds, &indices).unwrap();
        assert_eq!(summary.samples, 384);
        // Chunks line up with shard boundaries (32 records = 4 shards each).
        assert!(counted.reads() <= 48 + workers, "{} shard reads", counted.reads());
    }

    #[test]
    fn test_missing_root_is_error() {
        let (storage, _temp) = create_storage();
        assert!(ShardedDataset::open(storage, "absent").is_err());
    }
}
