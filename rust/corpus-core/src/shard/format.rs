// rust/corpus-core/src/shard/format.rs

//! Shard group on-disk format.
//!
//! A shard group is a directory holding shard files and an `index.json`
//! that is written last. Each shard file is a compressed raw shard:
//!
//! ```text
//! +-------------------------------+
//! | Sample count N (u32 LE)       |
//! +-------------------------------+
//! | Offsets (N + 1) x u64 LE      |  <- relative to the payload start
//! +-------------------------------+
//! | Payload bytes                 |  <- samples back to back
//! +-------------------------------+
//! ```
//!
//! Token payloads are `i32` little-endian; text payloads are UTF-8. The
//! index records an XXHash64 checksum of every raw (uncompressed) shard.

use std::hash::Hasher;

use serde::{Deserialize, Serialize};
use twox_hash::XxHash64;

use crate::dataset::{Column, ColumnSchema, Record};
use crate::error::{CorpusError, Result};

/// Name of the index file in every shard group.
pub const INDEX_FILE: &str = "index.json";

/// Current index format version.
pub const INDEX_VERSION: u32 = 1;

/// Shard compression algorithm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    None,
    Lz4,
    Zstd,
}

impl Compression {
    /// Parses a compression name. An empty name means no compression.
    pub fn parse(name: &str) -> Result<Self> {
        match name.to_lowercase().as_str() {
            "" | "none" => Ok(Compression::None),
            "lz4" => Ok(Compression::Lz4),
            "zstd" => Ok(Compression::Zstd),
            other => Err(CorpusError::config(format!(
                "unknown compression algorithm: {other}"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Compression::None => "none",
            Compression::Lz4 => "lz4",
            Compression::Zstd => "zstd",
        }
    }

    /// Shard file name for the `n`th shard of a group.
    pub fn shard_basename(&self, n: usize) -> String {
        match self {
            Compression::None => format!("shard.{n:05}.bin"),
            Compression::Lz4 => format!("shard.{n:05}.bin.lz4"),
            Compression::Zstd => format!("shard.{n:05}.bin.zstd"),
        }
    }

    pub fn compress(&self, data: &[u8], level: i32) -> Result<Vec<u8>> {
        match self {
            Compression::None => Ok(data.to_vec()),
            Compression::Lz4 => Ok(lz4_flex::compress_prepend_size(data)),
            Compression::Zstd => zstd::encode_all(data, level)
                .map_err(|e| CorpusError::serialization(format!("zstd compression failed: {e}"))),
        }
    }

    pub fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Compression::None => Ok(data.to_vec()),
            Compression::Lz4 => lz4_flex::decompress_size_prepended(data)
                .map_err(|e| CorpusError::serialization(format!("lz4 decompression failed: {e}"))),
            Compression::Zstd => zstd::decode_all(data)
                .map_err(|e| CorpusError::serialization(format!("zstd decompression failed: {e}"))),
        }
    }
}

impl std::fmt::Display for Compression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// XXHash64 of raw shard bytes.
pub fn checksum(data: &[u8]) -> u64 {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(data);
    hasher.finish()
}

/// One sealed shard as listed in an index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardInfo {
    /// Path of the shard file relative to the directory holding the index.
    pub basename: String,
    pub samples: u64,
    pub raw_bytes: u64,
    pub zip_bytes: u64,
    pub checksum: u64,
}

/// Contents of `index.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardIndex {
    pub version: u32,
    pub columns: ColumnSchema,
    pub compression: Compression,
    pub shards: Vec<ShardInfo>,
}

impl ShardIndex {
    pub fn new(column: Column, compression: Compression) -> Self {
        Self {
            version: INDEX_VERSION,
            columns: ColumnSchema::for_column(column),
            compression,
            shards: Vec::new(),
        }
    }

    pub fn total_samples(&self) -> u64 {
        self.shards.iter().map(|s| s.samples).sum()
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
            .map_err(|e| CorpusError::serialization(format!("failed to encode shard index: {e}")))
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let index: Self = serde_json::from_slice(bytes)
            .map_err(|e| CorpusError::serialization(format!("failed to decode shard index: {e}")))?;

        if index.version != INDEX_VERSION {
            return Err(CorpusError::serialization(format!(
                "unsupported shard index version: expected {INDEX_VERSION}, got {}",
                index.version
            )));
        }
        Ok(index)
    }
}

/// Appends the payload of `record` to `out`.
pub fn encode_payload(record: &Record, out: &mut Vec<u8>) {
    match record {
        Record::Tokens(tokens) => {
            out.reserve(tokens.len() * 4);
            for token in tokens {
                out.extend_from_slice(&token.to_le_bytes());
            }
        }
        Record::Text(text) => out.extend_from_slice(text.as_bytes()),
    }
}

/// Decodes one payload written by [`encode_payload`].
pub fn decode_payload(column: Column, bytes: &[u8]) -> Result<Record> {
    match column {
        Column::Tokens => {
            if bytes.len() % 4 != 0 {
                return Err(CorpusError::serialization(format!(
                    "token payload of {} bytes is not a multiple of 4",
                    bytes.len()
                )));
            }
            let tokens = bytes
                .chunks_exact(4)
                .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect();
            Ok(Record::Tokens(tokens))
        }
        Column::Text => String::from_utf8(bytes.to_vec())
            .map(Record::Text)
            .map_err(|e| CorpusError::serialization(format!("text payload is not UTF-8: {e}"))),
    }
}

/// Samples accumulated for the shard currently being filled.
#[derive(Debug, Default)]
pub struct ShardBuffer {
    offsets: Vec<u64>,
    payload: Vec<u8>,
}

impl ShardBuffer {
    pub fn new() -> Self {
        Self {
            offsets: vec![0],
            payload: Vec::new(),
        }
    }

    pub fn push(&mut self, record: &Record) {
        if self.offsets.is_empty() {
            self.offsets.push(0);
        }
        encode_payload(record, &mut self.payload);
        self.offsets.push(self.payload.len() as u64);
    }

    pub fn samples(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.samples() == 0
    }

    pub fn payload_bytes(&self) -> usize {
        self.payload.len()
    }

    /// Size of the raw shard `take_raw` would produce.
    pub fn raw_len(&self) -> usize {
        4 + self.offsets.len() * 8 + self.payload.len()
    }

    /// Serializes the buffer to a raw shard and resets it.
    pub fn take_raw(&mut self) -> Vec<u8> {
        let samples = self.samples() as u32;
        let mut raw = Vec::with_capacity(self.raw_len());
        raw.extend_from_slice(&samples.to_le_bytes());
        for offset in &self.offsets {
            raw.extend_from_slice(&offset.to_le_bytes());
        }
        raw.extend_from_slice(&self.payload);

        self.offsets.clear();
        self.offsets.push(0);
        self.payload.clear();
        raw
    }
}

/// A raw shard parsed for random access.
#[derive(Debug)]
pub struct DecodedShard {
    offsets: Vec<u64>,
    payload_start: usize,
    raw: Vec<u8>,
}

impl DecodedShard {
    pub fn parse(raw: Vec<u8>) -> Result<Self> {
        if raw.len() < 4 {
            return Err(CorpusError::serialization("shard too small for sample count"));
        }
        let samples = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize;
        let payload_start = 4 + (samples + 1) * 8;
        if raw.len() < payload_start {
            return Err(CorpusError::serialization(format!(
                "shard truncated: {samples} samples need {payload_start} header bytes, got {}",
                raw.len()
            )));
        }

        let offsets: Vec<u64> = raw[4..payload_start]
            .chunks_exact(8)
            .map(|c| u64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
            .collect();

        let payload_len = (raw.len() - payload_start) as u64;
        let well_formed = offsets[0] == 0
            && offsets.windows(2).all(|w| w[0] <= w[1])
            && offsets[samples] == payload_len;
        if !well_formed {
            return Err(CorpusError::serialization("shard offsets are inconsistent"));
        }

        Ok(Self {
            offsets,
            payload_start,
            raw,
        })
    }

    pub fn samples(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Payload bytes of sample `i` within this shard.
    pub fn sample(&self, i: usize) -> Option<&[u8]> {
        let start = *self.offsets.get(i)? as usize;
        let end = *self.offsets.get(i + 1)? as usize;
        Some(&self.raw[self.payload_start + start..self.payload_start + end])
    }
}
