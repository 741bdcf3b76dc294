// rust/corpus-core/src/dataset/schema.rs

//! Payload schema detection.
//!
//! The payload column is decided once from the first record and then held
//! fixed for every record and every partition of a split.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::traits::{Column, IndexedDataset};
use crate::error::{CorpusError, Result};

/// Column schema as stored in shard indexes: `{column name -> type tag}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnSchema(BTreeMap<String, String>);

impl ColumnSchema {
    pub fn for_column(column: Column) -> Self {
        let mut columns = BTreeMap::new();
        columns.insert(column.name().to_string(), column.type_tag().to_string());
        Self(columns)
    }

    /// Recovers the single payload column this schema describes.
    pub fn column(&self) -> Result<Column> {
        let mut entries = self.0.iter();
        match (entries.next(), entries.next()) {
            (Some((name, tag)), None) => {
                let column = Column::from_name(name).ok_or_else(|| {
                    CorpusError::serialization(format!("unknown column '{name}' in schema"))
                })?;
                if column.type_tag() != tag {
                    return Err(CorpusError::serialization(format!(
                        "column '{name}' has type '{tag}', expected '{}'",
                        column.type_tag()
                    )));
                }
                Ok(column)
            }
            _ => Err(CorpusError::serialization(format!(
                "schema must describe exactly one column, found {}",
                self.0.len()
            ))),
        }
    }

    pub fn columns(&self) -> &BTreeMap<String, String> {
        &self.0
    }
}

/// Detects the payload column by inspecting record 0.
///
/// # Errors
///
/// Returns a dataset error if the dataset is empty, or whatever error the
/// dataset reports for record 0.
pub fn detect_column(dataset: &dyn IndexedDataset) -> Result<Column> {
    if dataset.is_empty() {
        return Err(CorpusError::dataset(
            dataset.name(),
            "cannot detect payload column of an empty dataset",
        ));
    }
    Ok(dataset.get_item(0)?.column())
}
