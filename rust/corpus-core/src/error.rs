// rust/corpus-core/src/error.rs

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CorpusError {

    #[error("Storage error at '{path}': {message}")]
    Storage {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Dataset '{name}' error: {message}")]
    Dataset {
        name: String,
        message: String,
    },

    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Schema violation at record {index}: expected '{expected}' payload, found '{found}'")]
    Schema {
        index: usize,
        expected: String,
        found: String,
    },

    #[error("Partition invariant violated: {message}")]
    Invariant {
        message: String,
    },

    #[error("Worker {worker_id} failed while writing partition '{partition}': {message}")]
    Worker {
        partition: String,
        worker_id: usize,
        message: String,
        #[source]
        source: Option<Box<CorpusError>>,
    },

    #[error("Serialization error: {message}")]
    Serialization {
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, CorpusError>;

// Convenience constructors
impl CorpusError {

    pub fn storage(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Storage {
            path: path.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn storage_with_source(
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Self::Storage {
            path: path.into(),
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn dataset(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Dataset {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    pub fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn schema(index: usize, expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::Schema {
            index,
            expected: expected.into(),
            found: found.into(),
        }
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        Self::Invariant {
            message: message.into(),
        }
    }

    pub fn worker(partition: impl Into<String>, worker_id: usize, source: CorpusError) -> Self {
        Self::Worker {
            partition: partition.into(),
            worker_id,
            message: source.kind().to_string(),
            source: Some(Box::new(source)),
        }
    }

    pub fn worker_panicked(
        partition: impl Into<String>,
        worker_id: usize,
        message: impl Into<String>,
    ) -> Self {
        Self::Worker {
            partition: partition.into(),
            worker_id,
            message: message.into(),
            source: None,
        }
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Short label for the variant, without any of its details.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Storage { .. } => "storage error",
            Self::Dataset { .. } => "dataset error",
            Self::Config { .. } => "configuration error",
            Self::Schema { .. } => "schema violation",
            Self::Invariant { .. } => "partition invariant violated",
            Self::Worker { .. } => "worker failed",
            Self::Serialization { .. } => "serialization error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_message_names_both_columns() {
        let err = CorpusError::schema(7, "tokens", "text");
        let msg = err.to_string();
        assert!(msg.contains("record 7"));
        assert!(msg.contains("tokens"));
        assert!(msg.contains("text"));
    }

    #[test]
    fn test_worker_wraps_source() {
        let inner = CorpusError::dataset("input", "index 12 out of range");
        let err = CorpusError::worker("train", 2, inner);

        assert_eq!(
            err.to_string(),
            "Worker 2 failed while writing partition 'train': dataset error"
        );
        let source = std::error::Error::source(&err).unwrap();
        assert!(source.to_string().contains("index 12 out of range"));
    }

    #[test]
    fn test_worker_message_does_not_repeat_source() {
        let inner = CorpusError::schema(4, "tokens", "text");
        let err = CorpusError::worker("valid", 0, inner);

        let outer = err.to_string();
        let cause = std::error::Error::source(&err).unwrap().to_string();
        assert!(outer.ends_with("schema violation"));
        assert!(!outer.contains(&cause));
        assert!(!outer.contains("record 4"));
    }
}
