use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use rowweld_common::{Result, WeldError};
use rowweld_storage::StorageBackend;
use serde::{Deserialize, Serialize};

/// Manifest file name inside a partitioned dataset directory.
pub const MANIFEST_FILE: &str = "manifest.json";
/// Temp name the manifest is staged under before its atomic publish.
pub const MANIFEST_TEMP_FILE: &str = "manifest.json.tmp";
/// Bumped when the manifest or shard encoding changes incompatibly.
pub const MANIFEST_FORMAT_VERSION: u32 = 1;

/// Shard file name for a partition index.
pub fn shard_file_name(index: usize) -> String {
    format!("part-{index:05}.bin")
}

/// Per-shard metadata recorded by the partitioner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardMeta {
    pub index: usize,
    pub file: String,
    pub rows: u64,
}

/// Durable description of a partitioned dataset.
///
/// Written once, atomically, when partitioning completes; read-only
/// thereafter and safe to share across join workers without locking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub format_version: u32,
    pub num_partitions: usize,
    pub key_index: usize,
    pub field_names: Vec<String>,
    pub source_path: String,
    pub shards: Vec<ShardMeta>,
}

impl Manifest {
    /// Name of the partition key field.
    pub fn key_name(&self) -> &str {
        &self.field_names[self.key_index]
    }

    /// Total rows across all shards.
    pub fn total_rows(&self) -> u64 {
        self.shards.iter().map(|s| s.rows).sum()
    }

    /// Checks internal consistency.
    pub fn validate(&self) -> Result<()> {
        if self.format_version != MANIFEST_FORMAT_VERSION {
            return Err(WeldError::InvalidConfig(format!(
                "unsupported manifest format version {}",
                self.format_version
            )));
        }
        if self.num_partitions == 0 {
            return Err(WeldError::InvalidConfig(
                "manifest reports zero partitions".to_string(),
            ));
        }
        if self.shards.len() != self.num_partitions {
            return Err(WeldError::InvalidConfig(format!(
                "manifest lists {} shards but claims {} partitions",
                self.shards.len(),
                self.num_partitions
            )));
        }
        for (i, shard) in self.shards.iter().enumerate() {
            if shard.index != i {
                return Err(WeldError::InvalidConfig(format!(
                    "shard list out of order: position {i} holds index {}",
                    shard.index
                )));
            }
        }
        if self.key_index >= self.field_names.len() {
            return Err(WeldError::InvalidConfig(format!(
                "key index {} out of range for {} fields",
                self.key_index,
                self.field_names.len()
            )));
        }
        Ok(())
    }

    /// Absolute path of a shard inside `dir`.
    pub fn shard_path(&self, dir: &Path, index: usize) -> PathBuf {
        dir.join(&self.shards[index].file)
    }

    /// Loads and validates the manifest stored in `dir`.
    pub fn load(backend: &dyn StorageBackend, dir: &Path) -> Result<Manifest> {
        let mut raw = String::new();
        backend
            .open_read(&dir.join(MANIFEST_FILE))?
            .read_to_string(&mut raw)?;
        let manifest: Manifest = serde_json::from_str(&raw).map_err(|e| {
            WeldError::InvalidConfig(format!(
                "manifest decode failed for '{}': {e}",
                dir.display()
            ))
        })?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Stages the manifest to a temp file and publishes it atomically, so a
    /// reader never observes a manifest referencing incomplete shards.
    pub fn store(&self, backend: &dyn StorageBackend, dir: &Path) -> Result<()> {
        self.validate()?;
        let temp = dir.join(MANIFEST_TEMP_FILE);
        let dest = dir.join(MANIFEST_FILE);
        {
            let mut out = backend.create(&temp)?;
            let bytes = serde_json::to_vec_pretty(self).map_err(|e| {
                WeldError::InvalidConfig(format!("manifest encode failed: {e}"))
            })?;
            out.write_all(&bytes)?;
            out.flush()?;
        }
        backend.publish(&temp, &dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(num_partitions: usize) -> Manifest {
        Manifest {
            format_version: MANIFEST_FORMAT_VERSION,
            num_partitions,
            key_index: 0,
            field_names: vec!["iso3".to_string(), "name".to_string()],
            source_path: "names.csv".to_string(),
            shards: (0..num_partitions)
                .map(|i| ShardMeta {
                    index: i,
                    file: shard_file_name(i),
                    rows: 1,
                })
                .collect(),
        }
    }

    #[test]
    fn valid_manifest_passes() {
        assert!(sample(3).validate().is_ok());
        assert_eq!(sample(3).total_rows(), 3);
        assert_eq!(sample(3).key_name(), "iso3");
    }

    #[test]
    fn zero_partitions_rejected() {
        let mut m = sample(2);
        m.num_partitions = 0;
        m.shards.clear();
        assert!(m.validate().is_err());
    }

    #[test]
    fn shard_count_mismatch_rejected() {
        let mut m = sample(3);
        m.shards.pop();
        assert!(m.validate().is_err());
    }

    #[test]
    fn out_of_range_key_rejected() {
        let mut m = sample(2);
        m.key_index = 9;
        assert!(m.validate().is_err());
    }

    #[test]
    fn shard_names_are_zero_padded() {
        assert_eq!(shard_file_name(7), "part-00007.bin");
        assert_eq!(shard_file_name(12345), "part-12345.bin");
    }
}
