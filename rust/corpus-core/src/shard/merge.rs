// rust/corpus-core/src/shard/merge.rs

//! Merging per-worker shard groups into one index.
//!
//! A partition root holds one numbered subdirectory per worker. Merging
//! lists every subdirectory's shards in one `index.json` at the root, with
//! basenames rewritten to `<worker>/<shard>` so the root is readable as a
//! single shard group.

use std::path::Path;

use crate::error::{CorpusError, Result};
use crate::storage::StorageBackend;

use super::format::{ShardIndex, INDEX_FILE};

/// Reads every worker group under `root`, in numeric order, into one index.
///
/// Nothing is written.
///
/// # Errors
///
/// Fails if `root` has no numbered groups, if a group has no `index.json`
/// (it was never finished), or if groups disagree on columns or compression.
pub fn collect_shard_groups(storage: &dyn StorageBackend, root: &Path) -> Result<ShardIndex> {
    let mut groups: Vec<(usize, String)> = Vec::new();
    for name in storage.list(root)? {
        let Ok(id) = name.parse::<usize>() else {
            continue;
        };
        if storage.metadata(&root.join(&name))?.is_dir {
            groups.push((id, name));
        }
    }
    groups.sort();

    if groups.is_empty() {
        return Err(CorpusError::storage(root, "no shard groups found"));
    }

    let mut merged: Option<ShardIndex> = None;
    for (_, name) in &groups {
        let index_path = root.join(name).join(INDEX_FILE);
        if !storage.exists(&index_path)? {
            return Err(CorpusError::storage(
                root.join(name),
                "shard group is not finalized (missing index.json)",
            ));
        }
        let group = ShardIndex::from_json(&storage.read_all(&index_path)?)?;

        let target = merged.get_or_insert_with(|| ShardIndex {
            shards: Vec::new(),
            ..group.clone()
        });
        if target.columns != group.columns {
            return Err(CorpusError::serialization(format!(
                "shard group {name} has columns {:?}, expected {:?}",
                group.columns.columns(),
                target.columns.columns()
            )));
        }
        if target.compression != group.compression {
            return Err(CorpusError::serialization(format!(
                "shard group {name} uses {} compression, expected {}",
                group.compression, target.compression
            )));
        }

        target.shards.extend(group.shards.into_iter().map(|mut shard| {
            shard.basename = format!("{name}/{}", shard.basename);
            shard
        }));
    }

    merged.ok_or_else(|| CorpusError::storage(root, "no shard groups found"))
}

/// Collects the groups under `root` and writes the merged `root/index.json`.
pub fn merge_shard_groups(storage: &dyn StorageBackend, root: &Path) -> Result<ShardIndex> {
    let merged = collect_shard_groups(storage, root)?;
    storage.write_atomic(&root.join(INDEX_FILE), &merged.to_json()?)?;

    tracing::info!(
        root = %root.display(),
        shards = merged.shards.len(),
        samples = merged.total_samples(),
        "merged shard groups"
    );
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use crate::dataset::{Column, Record};
    use crate::shard::{Compression, ShardWriter, ShardWriterOptions};
    use crate::storage::LocalStorage;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn create_storage() -> (Arc<dyn StorageBackend>, TempDir) {
        let temp = TempDir::new().unwrap();
        let config = StorageConfig {
            base_path: temp.path().to_path_buf(),
            ..Default::default()
        };
        (Arc::new(LocalStorage::new(&config).unwrap()), temp)
    }

    fn write_group(storage: &Arc<dyn StorageBackend>, dir: &str, column: Column, n: usize) {
        let options = ShardWriterOptions {
            shard_size_limit: 8,
            ..Default::default()
        };
        let mut writer = ShardWriter::open(storage.clone(), dir, column, options).unwrap();
        for i in 0..n {
            let record = match column {
                Column::Tokens => Record::Tokens(vec![i as i32; 2]),
                Column::Text => Record::Text(format!("sample-{i}")),
            };
            writer.write(&record).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_merge_orders_numerically() {
        let (storage, _temp) = create_storage();
        for (dir, n) in [("part/0", 3), ("part/1", 2), ("part/10", 1), ("part/2", 0)] {
            write_group(&storage, dir, Column::Tokens, n);
        }

        let merged = merge_shard_groups(storage.as_ref(), Path::new("part")).unwrap();
        assert_eq!(merged.total_samples(), 6);
        assert_eq!(merged.shards[0].basename, "0/shard.00000.bin");
        assert_eq!(merged.shards.last().unwrap().basename, "10/shard.00000.bin");
        assert!(storage.exists(Path::new("part/index.json")).unwrap());
    }

    #[test]
    fn test_unfinished_group_is_rejected() {
        let (storage, _temp) = create_storage();
        write_group(&storage, "part/0", Column::Text, 2);
        storage.create_dir_all(Path::new("part/1")).unwrap();

        let err = collect_shard_groups(storage.as_ref(), Path::new("part")).unwrap_err();
        assert!(matches!(err, CorpusError::Storage { .. }));
    }

    #[test]
    fn test_mismatched_columns_rejected() {
        let (storage, _temp) = create_storage();
        write_group(&storage, "part/0", Column::Text, 1);
        write_group(&storage, "part/1", Column::Tokens, 1);

        assert!(collect_shard_groups(storage.as_ref(), Path::new("part")).is_err());
    }

    #[test]
    fn test_mismatched_compression_rejected() {
        let (storage, _temp) = create_storage();
        write_group(&storage, "part/0", Column::Text, 1);
        let options = ShardWriterOptions {
            compression: Compression::Lz4,
            ..Default::default()
        };
        ShardWriter::open(storage.clone(), "part/1", Column::Text, options)
            .unwrap()
            .finish()
            .unwrap();

        assert!(collect_shard_groups(storage.as_ref(), Path::new("part")).is_err());
    }

    #[test]
    fn test_empty_root_is_error() {
        let (storage, _temp) = create_storage();
        assert!(collect_shard_groups(storage.as_ref(), Path::new("nothing")).is_err());
    }
}
