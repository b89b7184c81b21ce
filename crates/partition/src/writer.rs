use std::path::Path;

use rowweld_common::{Result, RuntimeConfig, WeldError};
use rowweld_format::binrec::BinRowWriter;
use rowweld_format::{RowReader, RowWriter};
use rowweld_storage::StorageBackend;
use tracing::{debug, info};

use crate::key::{bucket_for, extract_key, KeySpec};
use crate::layout::{shard_file_name, Manifest, ShardMeta, MANIFEST_FORMAT_VERSION};

/// Streams a dataset once and routes every record to its key-hashed shard.
///
/// Holds one open shard writer per partition for the duration of the pass,
/// so memory stays bounded by N rather than dataset size. The manifest is
/// published atomically at the end; until then the destination directory is
/// not a readable dataset.
pub struct Partitioner<'a> {
    backend: &'a dyn StorageBackend,
    config: &'a RuntimeConfig,
}

impl<'a> Partitioner<'a> {
    pub fn new(backend: &'a dyn StorageBackend, config: &'a RuntimeConfig) -> Self {
        Self { backend, config }
    }

    /// Partitions `reader` into `num_partitions` shards under `dest_dir`.
    ///
    /// Shard membership is a pure function of `(key spec, N, hash)`, so
    /// re-partitioning the same input yields the same assignment.
    pub fn partition(
        &self,
        reader: &mut dyn RowReader,
        keyspec: &KeySpec,
        dest_dir: &Path,
        num_partitions: usize,
        source_path: &str,
    ) -> Result<Manifest> {
        if num_partitions == 0 {
            return Err(WeldError::InvalidConfig(
                "partition count must be positive".to_string(),
            ));
        }

        // Key specs that can be checked against an already-known schema are
        // rejected before any shard file is created.
        let mut key_index = match reader.schema() {
            Some(fields) => Some(keyspec.resolve(fields)?),
            None => None,
        };

        info!(
            dest = %dest_dir.display(),
            num_partitions,
            source = source_path,
            "partitioning dataset"
        );
        self.backend.create_dir_all(dest_dir)?;

        let mut writers: Vec<BinRowWriter> = (0..num_partitions)
            .map(|i| {
                let path = dest_dir.join(shard_file_name(i));
                Ok(BinRowWriter::new(self.backend.create(&path)?))
            })
            .collect::<Result<_>>()?;
        let mut rows = vec![0u64; num_partitions];
        let mut total = 0u64;

        while let Some(record) = reader.next_record()? {
            let ki = match key_index {
                Some(ki) => ki,
                None => {
                    // Formats that learn their schema from the data (JSON
                    // lines, headerless CSV) can only resolve the key now.
                    let resolved = match reader.schema() {
                        Some(fields) => keyspec.resolve(fields)?,
                        None => match keyspec {
                            KeySpec::Index(i) if *i < record.len() => *i,
                            other => {
                                return Err(WeldError::KeySpec(format!(
                                    "cannot resolve {other:?} without a schema"
                                )))
                            }
                        },
                    };
                    debug!(key_index = resolved, "resolved partition key");
                    key_index = Some(resolved);
                    resolved
                }
            };

            let key = extract_key(&record, ki)?;
            let bucket = bucket_for(key, num_partitions);
            writers[bucket].write(&record)?;
            rows[bucket] += 1;
            total += 1;
            if self.config.progress_log_every > 0 && total % self.config.progress_log_every == 0 {
                info!(records = total, "partitioning progress");
            }
        }

        for writer in &mut writers {
            writer.finish()?;
        }

        let field_names = reader
            .schema()
            .map(|s| s.to_vec())
            .ok_or_else(|| {
                WeldError::InvalidConfig(
                    "field names could not be determined; pass them explicitly".to_string(),
                )
            })?;
        let key_index = match key_index {
            Some(ki) => ki,
            // Zero-record input: the schema is known, resolve against it.
            None => keyspec.resolve(&field_names)?,
        };

        let manifest = Manifest {
            format_version: MANIFEST_FORMAT_VERSION,
            num_partitions,
            key_index,
            field_names,
            source_path: source_path.to_string(),
            shards: (0..num_partitions)
                .map(|i| ShardMeta {
                    index: i,
                    file: shard_file_name(i),
                    rows: rows[i],
                })
                .collect(),
        };
        manifest.store(self.backend, dest_dir)?;

        info!(records = total, num_partitions, "partitioning complete");
        Ok(manifest)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use rowweld_format::{open_reader, Format, FormatParams, Record, RowReader};
    use rowweld_storage::LocalFs;
    use tempfile::TempDir;

    use super::*;
    use crate::reader::PartitionedDataset;

    fn csv_reader(data: &str) -> Box<dyn RowReader> {
        open_reader(
            Format::Csv,
            Box::new(std::io::Cursor::new(data.to_string())),
            None,
            &FormatParams::new(),
        )
        .unwrap()
    }

    const NAMES: &str = "iso3,name\nAND,Andorra\nAUS,Australia\nJPN,Japan\nNZL,New Zealand\nFRA,France\n";

    fn shard_contents(dataset: &PartitionedDataset, backend: &LocalFs) -> Vec<Vec<Record>> {
        (0..dataset.num_partitions())
            .map(|i| dataset.read_shard(backend, i).unwrap())
            .collect()
    }

    #[test]
    fn union_of_shards_equals_input() {
        let root = TempDir::new().unwrap();
        let dest = root.path().join("names");
        let backend = LocalFs;
        let config = RuntimeConfig::default();
        let manifest = Partitioner::new(&backend, &config)
            .partition(&mut *csv_reader(NAMES), &KeySpec::default(), &dest, 3, "names.csv")
            .unwrap();
        assert_eq!(manifest.total_rows(), 5);

        let dataset = PartitionedDataset::open(&backend, &dest).unwrap();
        let mut seen: BTreeMap<String, usize> = BTreeMap::new();
        for shard in shard_contents(&dataset, &backend) {
            for record in shard {
                *seen.entry(record[0].render().into_owned()).or_default() += 1;
            }
        }
        let keys: Vec<_> = seen.keys().cloned().collect();
        assert_eq!(keys, ["AND", "AUS", "FRA", "JPN", "NZL"]);
        assert!(seen.values().all(|&c| c == 1), "each record lands in exactly one shard");
    }

    #[test]
    fn repartitioning_is_deterministic() {
        let backend = LocalFs;
        let config = RuntimeConfig::default();
        let root = TempDir::new().unwrap();
        let dests = [root.path().join("run_a"), root.path().join("run_b")];
        for dest in &dests {
            Partitioner::new(&backend, &config)
                .partition(&mut *csv_reader(NAMES), &KeySpec::default(), dest, 4, "names.csv")
                .unwrap();
        }
        let a = PartitionedDataset::open(&backend, &dests[0]).unwrap();
        let b = PartitionedDataset::open(&backend, &dests[1]).unwrap();
        for i in 0..4 {
            assert_eq!(
                a.read_shard(&backend, i).unwrap(),
                b.read_shard(&backend, i).unwrap(),
                "shard {i} membership differs between runs"
            );
        }
    }

    #[test]
    fn manifest_row_counts_sum_to_dataset_rows() {
        let root = TempDir::new().unwrap();
        let backend = LocalFs;
        let config = RuntimeConfig::default();
        let manifest = Partitioner::new(&backend, &config)
            .partition(
                &mut *csv_reader(NAMES),
                &KeySpec::Name("iso3".to_string()),
                &root.path().join("names"),
                5,
                "names.csv",
            )
            .unwrap();
        assert_eq!(manifest.shards.iter().map(|s| s.rows).sum::<u64>(), 5);
        assert_eq!(manifest.key_name(), "iso3");
    }

    #[test]
    fn bad_key_name_fails_before_writing_shards() {
        let root = TempDir::new().unwrap();
        let dest = root.path().join("names");
        let backend = LocalFs;
        let config = RuntimeConfig::default();
        let err = Partitioner::new(&backend, &config)
            .partition(
                &mut *csv_reader(NAMES),
                &KeySpec::Name("currency".to_string()),
                &dest,
                3,
                "names.csv",
            )
            .unwrap_err();
        assert!(matches!(err, WeldError::KeySpec(_)));
        assert!(!dest.exists(), "no shard files for a rejected key spec");
    }

    #[test]
    fn zero_partitions_is_invalid() {
        let root = TempDir::new().unwrap();
        let backend = LocalFs;
        let config = RuntimeConfig::default();
        let err = Partitioner::new(&backend, &config)
            .partition(
                &mut *csv_reader(NAMES),
                &KeySpec::default(),
                &root.path().join("names"),
                0,
                "names.csv",
            )
            .unwrap_err();
        assert!(matches!(err, WeldError::InvalidConfig(_)));
    }

    #[test]
    fn json_dataset_resolves_key_from_first_record() {
        let root = TempDir::new().unwrap();
        let backend = LocalFs;
        let config = RuntimeConfig::default();
        let data = "{\"iso3\":\"AND\",\"currency\":\"Euro\"}\n{\"iso3\":\"JPN\",\"currency\":\"Yen\"}\n";
        let mut reader = open_reader(
            Format::JsonLines,
            Box::new(std::io::Cursor::new(data.to_string())),
            None,
            &FormatParams::new(),
        )
        .unwrap();
        let manifest = Partitioner::new(&backend, &config)
            .partition(
                &mut *reader,
                &KeySpec::Name("iso3".to_string()),
                &root.path().join("currencies"),
                2,
                "currencies.json",
            )
            .unwrap();
        // JSON schemas are the first record's keys, sorted.
        assert_eq!(manifest.field_names, ["currency", "iso3"]);
        assert_eq!(manifest.key_index, 1);
        assert_eq!(manifest.total_rows(), 2);
    }
}
