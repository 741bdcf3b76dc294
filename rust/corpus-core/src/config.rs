// rust/corpus-core/src/config.rs

//! Configuration management for corpus splitting.
//!
//! This module provides configuration parsing from TOML files, environment
//! variable overrides, and validation of configuration values.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{CorpusError, Result};
use crate::shard::Compression;

/// Default seed for the right-set sampler.
pub const DEFAULT_SEED: u64 = 0x5eed;

// Top-level split configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    pub split: SamplingConfig,
    pub output: OutputConfig,
    pub storage: StorageConfig,
}

/// How right-set membership is drawn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplingStrategy {
    /// Walk forward by geometric gap lengths; cost scales with the right set.
    #[default]
    Geometric,
    /// One biased coin per item; cost scales with the dataset.
    Bernoulli,
}

impl FromStr for SamplingStrategy {
    type Err = CorpusError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "geometric" => Ok(Self::Geometric),
            "bernoulli" => Ok(Self::Bernoulli),
            other => Err(CorpusError::config(format!(
                "unknown sampling strategy '{other}', expected 'geometric' or 'bernoulli'"
            ))),
        }
    }
}

/// Right-set sampling and worker pool options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Per-item probability of landing in the right (validation) split.
    pub right_prob: f64,
    /// Expected-size cap for the right split; the smaller of the two wins.
    pub right_max: usize,
    // Seed for the sampler's generator.
    pub seed: u64,
    // Worker threads per partition.
    pub num_workers: usize,
    pub strategy: SamplingStrategy,
}

// Output locations and shard encoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    // Output root for the left (train) partition.
    pub left_path: PathBuf,
    // Output root for the right (valid) partition.
    pub right_path: PathBuf,
    // Compression algorithm: "none", "lz4", or "zstd".
    pub compression: String,
    // Compression level (zstd only).
    pub compression_level: i32,
    // Raw shard bytes (header, offsets and payload) before a shard is sealed.
    pub shard_size_limit: usize,
    // Whether to merge per-worker shard groups into one root index.
    pub merge: bool,
}

// Storage options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    // Base path that relative input and output paths resolve against.
    pub base_path: PathBuf,
    // Buffer size in bytes for I/O operations.
    pub buffer_size: usize,
    // Whether to use memory-mapped I/O for large reads.
    pub use_mmap: bool,
    // File size threshold (bytes) above which to use mmap.
    pub mmap_threshold: u64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            right_prob: 1e-3,
            right_max: 1000,
            seed: DEFAULT_SEED,
            num_workers: 4,
            strategy: SamplingStrategy::Geometric,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            left_path: PathBuf::from("train"),
            right_path: PathBuf::from("valid"),
            compression: "none".to_string(),
            compression_level: 3,
            shard_size_limit: 1 << 26, // 64 MB
            merge: false,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("."),
            buffer_size: 64 * 1024, // 64 KB
            use_mmap: true,
            mmap_threshold: 1024 * 1024, // 1 MB
        }
    }
}

impl FromStr for SplitConfig {
    type Err = CorpusError;

    /// Parse configuration from a TOML string.
    fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s)
            .map_err(|e| CorpusError::config_with_source("failed to parse TOML config", e))
    }
}

impl SplitConfig {
    // Load configuration from a TOML file.
    //
    // The result is not validated; call `validate` once every override has
    // been applied.
    //
    // # Errors
    //
    // Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            CorpusError::storage_with_source(path, "failed to read config file", e)
        })?;
        content.parse()
    }

    // Apply environment variable overrides.
    //
    // Environment variables are prefixed with `CORPUS_`:
    // - `CORPUS_SPLIT_RIGHT_PROB`, `CORPUS_SPLIT_RIGHT_MAX`, `CORPUS_SPLIT_SEED`
    // - `CORPUS_SPLIT_NUM_WORKERS`, `CORPUS_SPLIT_STRATEGY`
    // - `CORPUS_OUTPUT_LEFT_PATH`, `CORPUS_OUTPUT_RIGHT_PATH`
    // - `CORPUS_OUTPUT_COMPRESSION`, `CORPUS_OUTPUT_COMPRESSION_LEVEL`
    // - `CORPUS_OUTPUT_SHARD_SIZE_LIMIT`, `CORPUS_OUTPUT_MERGE`
    // - `CORPUS_STORAGE_BASE_PATH`, `CORPUS_STORAGE_BUFFER_SIZE`
    // - `CORPUS_STORAGE_USE_MMAP`, `CORPUS_STORAGE_MMAP_THRESHOLD`
    //
    // Values that fail to parse are ignored.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        // Sampling overrides
        if let Ok(val) = std::env::var("CORPUS_SPLIT_RIGHT_PROB") {
            if let Ok(v) = val.parse() {
                self.split.right_prob = v;
            }
        }
        if let Ok(val) = std::env::var("CORPUS_SPLIT_RIGHT_MAX") {
            if let Ok(v) = val.parse() {
                self.split.right_max = v;
            }
        }
        if let Ok(val) = std::env::var("CORPUS_SPLIT_SEED") {
            if let Ok(v) = val.parse() {
                self.split.seed = v;
            }
        }
        if let Ok(val) = std::env::var("CORPUS_SPLIT_NUM_WORKERS") {
            if let Ok(v) = val.parse() {
                self.split.num_workers = v;
            }
        }
        if let Ok(val) = std::env::var("CORPUS_SPLIT_STRATEGY") {
            if let Ok(v) = val.parse() {
                self.split.strategy = v;
            }
        }

        // Output overrides
        if let Ok(val) = std::env::var("CORPUS_OUTPUT_LEFT_PATH") {
            self.output.left_path = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("CORPUS_OUTPUT_RIGHT_PATH") {
            self.output.right_path = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("CORPUS_OUTPUT_COMPRESSION") {
            self.output.compression = val;
        }
        if let Ok(val) = std::env::var("CORPUS_OUTPUT_COMPRESSION_LEVEL") {
            if let Ok(v) = val.parse() {
                self.output.compression_level = v;
            }
        }
        if let Ok(val) = std::env::var("CORPUS_OUTPUT_SHARD_SIZE_LIMIT") {
            if let Ok(v) = val.parse() {
                self.output.shard_size_limit = v;
            }
        }
        if let Ok(val) = std::env::var("CORPUS_OUTPUT_MERGE") {
            if let Ok(v) = val.parse() {
                self.output.merge = v;
            }
        }

        // Storage overrides
        if let Ok(val) = std::env::var("CORPUS_STORAGE_BASE_PATH") {
            self.storage.base_path = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("CORPUS_STORAGE_BUFFER_SIZE") {
            if let Ok(v) = val.parse() {
                self.storage.buffer_size = v;
            }
        }
        if let Ok(val) = std::env::var("CORPUS_STORAGE_USE_MMAP") {
            if let Ok(v) = val.parse() {
                self.storage.use_mmap = v;
            }
        }
        if let Ok(val) = std::env::var("CORPUS_STORAGE_MMAP_THRESHOLD") {
            if let Ok(v) = val.parse() {
                self.storage.mmap_threshold = v;
            }
        }

        self
    }

    // Validate all configuration values before any worker is launched.
    //
    // # Errors
    //
    // Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<()> {
        // Sampling validation
        let prob = self.split.right_prob;
        if prob.is_nan() {
            return Err(CorpusError::config("split.right_prob must be a number"));
        }
        if prob > 1.0 {
            return Err(CorpusError::config(format!(
                "split.right_prob must be at most 1.0, got {prob}"
            )));
        }
        if self.split.num_workers == 0 {
            return Err(CorpusError::config(
                "split.num_workers must be greater than 0",
            ));
        }

        // Output validation
        Compression::parse(&self.output.compression).map_err(|e| {
            CorpusError::config_with_source("output.compression must be none, lz4 or zstd", e)
        })?;
        if self.output.shard_size_limit == 0 {
            return Err(CorpusError::config(
                "output.shard_size_limit must be greater than 0",
            ));
        }
        if self.output.left_path == self.output.right_path {
            return Err(CorpusError::config(
                "output.left_path and output.right_path must differ",
            ));
        }

        // Storage validation
        if self.storage.buffer_size == 0 {
            return Err(CorpusError::config(
                "storage.buffer_size must be greater than 0",
            ));
        }

        Ok(())
    }
}
