// rust/corpus-core/src/dataset/traits.rs

use crate::error::{CorpusError, Result};

/// The payload column a record carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    /// A variable-length sequence of `i32` token ids.
    Tokens,
    /// A UTF-8 string.
    Text,
}

impl Column {
    /// Column key as it appears in records and shard indexes.
    pub fn name(self) -> &'static str {
        match self {
            Column::Tokens => "tokens",
            Column::Text => "text",
        }
    }

    /// Type tag recorded in the shard index column schema.
    pub fn type_tag(self) -> &'static str {
        match self {
            Column::Tokens => "ndarray:int32",
            Column::Text => "str",
        }
    }

    /// Looks a column up by its key.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "tokens" => Some(Column::Tokens),
            "text" => Some(Column::Text),
            _ => None,
        }
    }

    /// Fails with a schema violation if `record` does not carry this column.
    pub fn check(self, index: usize, record: &Record) -> Result<()> {
        let found = record.column();
        if found == self {
            Ok(())
        } else {
            Err(CorpusError::schema(index, self.name(), found.name()))
        }
    }
}

impl std::fmt::Display for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A single dataset item with exactly one payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Tokens(Vec<i32>),
    Text(String),
}

impl Record {
    pub fn column(&self) -> Column {
        match self {
            Record::Tokens(_) => Column::Tokens,
            Record::Text(_) => Column::Text,
        }
    }

    /// Number of payload bytes once encoded into a shard.
    pub fn encoded_len(&self) -> usize {
        match self {
            Record::Tokens(tokens) => tokens.len() * std::mem::size_of::<i32>(),
            Record::Text(text) => text.len(),
        }
    }
}

/// Random-access, read-only view over an ordered collection of records.
///
/// Implementations are shared by reference across every writer thread of a
/// split, so `get_item` takes `&self` and must tolerate concurrent callers.
pub trait IndexedDataset: Send + Sync {
    /// Human-readable name used in error messages and logs.
    fn name(&self) -> &str;

    /// Number of records.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fetches record `index`.
    ///
    /// # Errors
    ///
    /// Returns an error if `index >= len()` or the record cannot be read.
    fn get_item(&self, index: usize) -> Result<Record>;
}

/// A dataset held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDataset {
    name: String,
    records: Vec<Record>,
}

impl InMemoryDataset {
    pub fn new(name: impl Into<String>, records: Vec<Record>) -> Self {
        Self {
            name: name.into(),
            records,
        }
    }

    /// Builds a token dataset where record `i` is `[i, i, ...]` of length
    /// `1 + i % 4`. Handy for checking which items landed where.
    pub fn numbered_tokens(name: impl Into<String>, n: usize) -> Self {
        let records = (0..n)
            .map(|i| Record::Tokens(vec![i as i32; 1 + i % 4]))
            .collect();
        Self::new(name, records)
    }
}

impl IndexedDataset for InMemoryDataset {
    fn name(&self) -> &str {
        &self.name
    }

    fn len(&self) -> usize {
        self.records.len()
    }

    fn get_item(&self, index: usize) -> Result<Record> {
        self.records.get(index).cloned().ok_or_else(|| {
            CorpusError::dataset(
                &self.name,
                format!("index {index} out of range (len {})", self.records.len()),
            )
        })
    }
}
