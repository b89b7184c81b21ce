use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use rowweld_common::Result;

/// Addressable location supporting streaming read and append-only write.
///
/// The partition and join engines are agnostic to the transport; remote
/// backends (object stores) implement this same trait. Writers hand back
/// plain `Write` handles, and callers are responsible for flushing them on
/// every exit path before a manifest referencing the data is published.
pub trait StorageBackend: Send + Sync {
    /// Opens a location for streaming read.
    fn open_read(&self, path: &Path) -> Result<Box<dyn Read + Send>>;

    /// Creates a location for streaming write, truncating any previous
    /// content. Parent directories are created as needed.
    fn create(&self, path: &Path) -> Result<Box<dyn Write + Send>>;

    /// Atomically publishes `temp` at `dest`. Readers observe either the old
    /// content or the complete new content, never a partial write.
    fn publish(&self, temp: &Path, dest: &Path) -> Result<()>;

    /// Ensures a directory exists.
    fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Removes a location if present; absence is not an error.
    fn remove(&self, path: &Path) -> Result<()>;
}

/// Local-filesystem backend.
#[derive(Debug, Clone, Default)]
pub struct LocalFs;

impl StorageBackend for LocalFs {
    fn open_read(&self, path: &Path) -> Result<Box<dyn Read + Send>> {
        let file = File::open(path)?;
        Ok(Box::new(BufReader::new(file)))
    }

    fn create(&self, path: &Path) -> Result<Box<dyn Write + Send>> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        Ok(Box::new(BufWriter::new(file)))
    }

    fn publish(&self, temp: &Path, dest: &Path) -> Result<()> {
        fs::rename(temp, dest)?;
        Ok(())
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        Ok(())
    }

    fn remove(&self, path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
