use std::path::{Path, PathBuf};

use rowweld_common::{Result, WeldError};
use rowweld_format::binrec::BinRowReader;
use rowweld_format::{Record, RowReader};
use rowweld_storage::StorageBackend;

use crate::layout::Manifest;

/// A published partitioned dataset: directory plus validated manifest.
#[derive(Debug, Clone)]
pub struct PartitionedDataset {
    dir: PathBuf,
    pub manifest: Manifest,
}

impl PartitionedDataset {
    /// Opens the dataset rooted at `dir`, validating its manifest.
    pub fn open(backend: &dyn StorageBackend, dir: &Path) -> Result<Self> {
        let manifest = Manifest::load(backend, dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            manifest,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Short human-readable name, used in error messages.
    pub fn name(&self) -> String {
        self.dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.dir.display().to_string())
    }

    pub fn num_partitions(&self) -> usize {
        self.manifest.num_partitions
    }

    pub fn field_names(&self) -> &[String] {
        &self.manifest.field_names
    }

    pub fn key_index(&self) -> usize {
        self.manifest.key_index
    }

    /// Streaming reader over one shard's records, in stored order.
    pub fn shard_reader(
        &self,
        backend: &dyn StorageBackend,
        index: usize,
    ) -> Result<BinRowReader> {
        if index >= self.num_partitions() {
            return Err(WeldError::InvalidConfig(format!(
                "shard index {index} out of range for {} partitions",
                self.num_partitions()
            )));
        }
        let input = backend.open_read(&self.manifest.shard_path(&self.dir, index))?;
        Ok(BinRowReader::new(
            input,
            Some(self.manifest.field_names.clone()),
        ))
    }

    /// Loads one shard fully into memory. The partition count bounds how
    /// large a shard can get.
    pub fn read_shard(&self, backend: &dyn StorageBackend, index: usize) -> Result<Vec<Record>> {
        let mut reader = self.shard_reader(backend, index)?;
        let mut records = Vec::new();
        while let Some(record) = reader.next_record()? {
            records.push(record);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowweld_storage::LocalFs;

    #[test]
    fn open_without_manifest_fails() {
        let dir = std::env::temp_dir().join("rowweld_reader_missing_manifest");
        let _ = std::fs::create_dir_all(&dir);
        assert!(PartitionedDataset::open(&LocalFs, &dir).is_err());
        let _ = std::fs::remove_dir_all(dir);
    }
}
