// rust/corpus-core/src/shard/writer.rs

//! Shard group writer.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::OutputConfig;
use crate::dataset::{Column, Record};
use crate::error::{CorpusError, Result};
use crate::storage::StorageBackend;

use super::format::{checksum, Compression, ShardBuffer, ShardIndex, ShardInfo, INDEX_FILE};

/// Largest sample count the `u32` shard header can hold.
const MAX_SHARD_SAMPLES: usize = u32::MAX as usize;

/// Settings shared by every writer of a split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardWriterOptions {
    pub compression: Compression,
    pub compression_level: i32,
    /// Raw shard bytes (count, offsets and payload) after which the current
    /// shard is sealed.
    ///
    /// A shard also seals once its sample count reaches `u32::MAX`.
    pub shard_size_limit: usize,
}

impl Default for ShardWriterOptions {
    fn default() -> Self {
        Self {
            compression: Compression::None,
            compression_level: 3,
            shard_size_limit: 1 << 26,
        }
    }
}

impl ShardWriterOptions {
    pub fn from_config(config: &OutputConfig) -> Result<Self> {
        if config.shard_size_limit == 0 {
            return Err(CorpusError::config("shard_size_limit must be > 0"));
        }
        Ok(Self {
            compression: Compression::parse(&config.compression)?,
            compression_level: config.compression_level,
            shard_size_limit: config.shard_size_limit,
        })
    }
}

/// What a finished writer produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardGroupSummary {
    pub dir: PathBuf,
    pub samples: u64,
    pub shards: usize,
    pub raw_bytes: u64,
    pub zip_bytes: u64,
}

/// Writes records of a single column into a shard group directory.
///
/// Shards are sealed as the buffer fills and committed with a temp file
/// plus rename. `index.json` is written only by [`ShardWriter::finish`], so a
/// group whose writer was dropped early is never readable. Dropping an
/// unfinished writer removes the shards it already sealed.
pub struct ShardWriter {
    storage: Arc<dyn StorageBackend>,
    dir: PathBuf,
    column: Column,
    options: ShardWriterOptions,
    index: ShardIndex,
    buffer: ShardBuffer,
    written: u64,
    finished: bool,
}

impl std::fmt::Debug for ShardWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardWriter")
            .field("dir", &self.dir)
            .field("column", &self.column)
            .field("options", &self.options)
            .field("written", &self.written)
            .finish()
    }
}

impl ShardWriter {
    /// Creates `dir` and prepares an empty shard group in it.
    ///
    /// # Errors
    ///
    /// Fails if `dir` already exists with content, or cannot be created.
    pub fn open(
        storage: Arc<dyn StorageBackend>,
        dir: impl Into<PathBuf>,
        column: Column,
        options: ShardWriterOptions,
    ) -> Result<Self> {
        let dir = dir.into();
        if options.shard_size_limit == 0 {
            return Err(CorpusError::config("shard_size_limit must be > 0"));
        }
        if !storage.list(&dir)?.is_empty() {
            return Err(CorpusError::storage(&dir, "output directory is not empty"));
        }
        storage.create_dir_all(&dir)?;

        tracing::debug!(dir = %dir.display(), column = %column, compression = %options.compression, "opened shard writer");

        Ok(Self {
            storage,
            dir,
            column,
            options,
            index: ShardIndex::new(column, options.compression),
            buffer: ShardBuffer::new(),
            written: 0,
            finished: false,
        })
    }

    /// Opens a writer, hands it to `f`, and finishes it if `f` succeeds.
    ///
    /// On any error the writer is dropped unfinished and its shards are
    /// discarded.
    pub fn scoped<F>(
        storage: Arc<dyn StorageBackend>,
        dir: impl Into<PathBuf>,
        column: Column,
        options: ShardWriterOptions,
        f: F,
    ) -> Result<ShardGroupSummary>
    where
        F: FnOnce(&mut ShardWriter) -> Result<()>,
    {
        let mut writer = Self::open(storage, dir, column, options)?;
        f(&mut writer)?;
        writer.finish()
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Samples accepted so far.
    pub fn samples(&self) -> u64 {
        self.written
    }

    /// Appends one record.
    ///
    /// # Errors
    ///
    /// Returns a schema error if the record does not carry this writer's
    /// column, or a storage error if sealing a full shard fails.
    pub fn write(&mut self, record: &Record) -> Result<()> {
        self.column.check(self.written as usize, record)?;

        self.buffer.push(record);
        self.written += 1;

        if self.buffer.raw_len() >= self.options.shard_size_limit
            || self.buffer.samples() >= MAX_SHARD_SAMPLES
        {
            self.seal_shard()?;
        }
        Ok(())
    }

    fn seal_shard(&mut self) -> Result<()> {
        let samples = self.buffer.samples() as u64;
        let raw = self.buffer.take_raw();
        let sum = checksum(&raw);
        let zip = self
            .options
            .compression
            .compress(&raw, self.options.compression_level)?;

        let basename = self.options.compression.shard_basename(self.index.shards.len());
        self.storage.write_atomic(&self.dir.join(&basename), &zip)?;

        tracing::debug!(
            dir = %self.dir.display(),
            shard = %basename,
            samples,
            raw_bytes = raw.len(),
            zip_bytes = zip.len(),
            "sealed shard"
        );

        self.index.shards.push(ShardInfo {
            basename,
            samples,
            raw_bytes: raw.len() as u64,
            zip_bytes: zip.len() as u64,
            checksum: sum,
        });
        Ok(())
    }

    /// Seals the last shard and writes `index.json`.
    pub fn finish(mut self) -> Result<ShardGroupSummary> {
        if !self.buffer.is_empty() {
            self.seal_shard()?;
        }

        let json = self.index.to_json()?;
        self.storage.write_atomic(&self.dir.join(INDEX_FILE), &json)?;
        self.finished = true;

        let summary = ShardGroupSummary {
            dir: self.dir.clone(),
            samples: self.written,
            shards: self.index.shards.len(),
            raw_bytes: self.index.shards.iter().map(|s| s.raw_bytes).sum(),
            zip_bytes: self.index.shards.iter().map(|s| s.zip_bytes).sum(),
        };

        tracing::debug!(
            dir = %summary.dir.display(),
            samples = summary.samples,
            shards = summary.shards,
            "finished shard group"
        );
        Ok(summary)
    }

    fn discard(&self) -> Result<()> {
        for name in self.storage.list(&self.dir)? {
            let is_temp = name.starts_with('.') && name.ends_with(".tmp");
            let is_ours = self.index.shards.iter().any(|s| s.basename == name);
            if is_temp || is_ours {
                self.storage.delete(&self.dir.join(&name))?;
            }
        }
        Ok(())
    }
}

impl Drop for ShardWriter {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        tracing::warn!(
            dir = %self.dir.display(),
            samples = self.written,
            "shard writer dropped without finish, discarding output"
        );
        if let Err(e) = self.discard() {
            tracing::warn!(dir = %self.dir.display(), error = %e, "failed to clean up shard group");
        }
    }
}
