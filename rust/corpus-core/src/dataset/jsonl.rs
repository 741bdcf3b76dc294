// rust/corpus-core/src/dataset/jsonl.rs

//! Newline-delimited JSON input.
//!
//! Each non-blank line is a JSON object carrying either a `"tokens"` array
//! of integers or a `"text"` string. Line boundaries are indexed once when
//! the dataset is opened; afterwards any record can be fetched by offset.

use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use super::traits::{IndexedDataset, Record};
use crate::error::{CorpusError, Result};
use crate::storage::{StorageBackend, StorageReader};

/// Byte span of one record line, excluding the line terminator.
#[derive(Debug, Clone, Copy)]
struct LineSpan {
    start: u64,
    len: usize,
}

/// A JSONL file exposed as an [`IndexedDataset`].
pub struct JsonlDataset {
    name: String,
    path: PathBuf,
    lines: Vec<LineSpan>,
    reader: Mutex<Box<dyn StorageReader>>,
}

impl std::fmt::Debug for JsonlDataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonlDataset")
            .field("path", &self.path)
            .field("records", &self.lines.len())
            .finish()
    }
}

impl JsonlDataset {
    /// Opens `path` and indexes its record lines.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or read.
    pub fn open(storage: Arc<dyn StorageBackend>, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let lines = {
            let mut reader = storage.open_read(path)?;
            index_lines(&mut *reader, path)?
        };

        tracing::debug!(path = %path.display(), records = lines.len(), "indexed jsonl dataset");

        Ok(Self {
            name: path.display().to_string(),
            path: path.to_path_buf(),
            lines,
            reader: Mutex::new(storage.open_read(path)?),
        })
    }
}

fn index_lines(reader: &mut dyn StorageReader, path: &Path) -> Result<Vec<LineSpan>> {
    let mut buffered = BufReader::new(reader);
    let mut lines = Vec::new();
    let mut line = Vec::new();
    let mut offset = 0u64;

    loop {
        line.clear();
        let read = buffered
            .read_until(b'\n', &mut line)
            .map_err(|e| CorpusError::storage_with_source(path, "failed to scan lines", e))?;
        if read == 0 {
            break;
        }

        let mut content = line.as_slice();
        while let Some((&last, rest)) = content.split_last() {
            if last == b'\n' || last == b'\r' {
                content = rest;
            } else {
                break;
            }
        }

        if !content.iter().all(u8::is_ascii_whitespace) {
            lines.push(LineSpan {
                start: offset,
                len: content.len(),
            });
        }
        offset += read as u64;
    }

    Ok(lines)
}

fn parse_record(index: usize, value: Value, name: &str) -> Result<Record> {
    let Value::Object(mut object) = value else {
        return Err(CorpusError::dataset(
            name,
            format!("record {index} is not a JSON object"),
        ));
    };

    match (object.remove("tokens"), object.remove("text")) {
        (Some(Value::Array(items)), None) => {
            let tokens = items
                .iter()
                .map(|item| {
                    item.as_i64()
                        .and_then(|v| i32::try_from(v).ok())
                        .ok_or_else(|| {
                            CorpusError::dataset(
                                name,
                                format!("record {index} has a non-int32 token: {item}"),
                            )
                        })
                })
                .collect::<Result<Vec<i32>>>()?;
            Ok(Record::Tokens(tokens))
        }
        (None, Some(Value::String(text))) => Ok(Record::Text(text)),
        (Some(_), Some(_)) => Err(CorpusError::schema(index, "tokens or text", "tokens and text")),
        (None, None) => Err(CorpusError::schema(index, "tokens or text", "none")),
        (Some(other), None) | (None, Some(other)) => Err(CorpusError::dataset(
            name,
            format!("record {index} has a malformed payload: {other}"),
        )),
    }
}

impl IndexedDataset for JsonlDataset {
    fn name(&self) -> &str {
        &self.name
    }

    fn len(&self) -> usize {
        self.lines.len()
    }

    fn get_item(&self, index: usize) -> Result<Record> {
        let span = self.lines.get(index).ok_or_else(|| {
            CorpusError::dataset(
                &self.name,
                format!("index {index} out of range (len {})", self.lines.len()),
            )
        })?;

        let bytes = self.reader.lock().read_range(span.start, span.len)?;
        let value: Value = serde_json::from_slice(&bytes).map_err(|e| {
            CorpusError::dataset(&self.name, format!("invalid JSON at record {index}: {e}"))
        })?;

        parse_record(index, value, &self.name)
    }
}
