// rust/corpus-core/src/storage/traits.rs

//! Storage abstraction traits.
//!
//! Dataset readers, shard writers and the merge step all go through these
//! traits so that a split never touches the filesystem directly.

use std::io::{Read, Seek, Write};
use std::path::Path;

use crate::error::{CorpusError, Result};

/// Metadata about a stored object.
#[derive(Debug, Clone)]
pub struct ObjectMeta {
    /// Size of the object in bytes.
    pub size: u64,
    /// Whether this object is a directory.
    pub is_dir: bool,
}

/// A handle for reading from storage.
pub trait StorageReader: Read + Seek + Send {
    /// Returns the total size of the object in bytes.
    fn size(&self) -> u64;

    /// Reads `length` bytes starting at byte offset `start`.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails or the range is out of bounds.
    fn read_range(&mut self, start: u64, length: usize) -> Result<Vec<u8>>;
}

/// A handle for writing to storage.
pub trait StorageWriter: Write + Send {
    /// Flushes and syncs everything written so far.
    ///
    /// After calling `finish`, the writer must not be used again.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush or sync fails.
    fn finish(self: Box<Self>) -> Result<()>;
}

/// The core storage backend trait.
///
/// Object-safe; shared between worker threads as `Arc<dyn StorageBackend>`.
pub trait StorageBackend: Send + Sync {
    /// Checks if an object exists at the given path.
    fn exists(&self, path: &Path) -> Result<bool>;

    /// Retrieves metadata for an object.
    ///
    /// # Errors
    ///
    /// Returns an error if the object doesn't exist or metadata cannot be read.
    fn metadata(&self, path: &Path) -> Result<ObjectMeta>;

    /// Opens an object for reading.
    fn open_read(&self, path: &Path) -> Result<Box<dyn StorageReader>>;

    /// Opens an object for writing, truncating it if it exists.
    ///
    /// Parent directories are created if they don't exist.
    fn open_write(&self, path: &Path) -> Result<Box<dyn StorageWriter>>;

    /// Deletes a file or a directory tree.
    fn delete(&self, path: &Path) -> Result<()>;

    /// Lists the entry names directly under `prefix`, sorted.
    ///
    /// A missing directory lists as empty.
    fn list(&self, prefix: &Path) -> Result<Vec<String>>;

    /// Renames an object from one path to another.
    fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    /// Creates a directory and all parent directories.
    fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Reads a whole object into memory.
    fn read_all(&self, path: &Path) -> Result<Vec<u8>> {
        let mut reader = self.open_read(path)?;
        let mut buf = Vec::with_capacity(reader.size() as usize);
        reader
            .read_to_end(&mut buf)
            .map_err(|e| CorpusError::storage_with_source(path, "failed to read object", e))?;
        Ok(buf)
    }

    /// Writes `data` to a temporary sibling of `path` and renames it into
    /// place, so readers never observe a partially written object.
    fn write_atomic(&self, path: &Path, data: &[u8]) -> Result<()> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| CorpusError::storage(path, "path has no file name"))?;
        let temp_path = path.with_file_name(format!(".{file_name}.tmp"));

        let mut writer = self.open_write(&temp_path)?;
        writer
            .write_all(data)
            .map_err(|e| CorpusError::storage_with_source(&temp_path, "failed to write object", e))?;
        writer.finish()?;

        self.rename(&temp_path, path)
    }
}
