use ahash::AHashMap;
use rowweld_common::{Result, WeldError};
use rowweld_format::{Record, RowReader, Value};
use rowweld_partition::PartitionedDataset;
use rowweld_storage::StorageBackend;
use tracing::debug;

/// Joins one shard index across all inputs, emitting concatenated rows.
///
/// The first dataset is the probe side, streamed once; every other dataset
/// is a build side, loaded into a key multimap. Duplicate keys on a build
/// side are preserved in insertion order, so matches fan out as a
/// cross-product, matching SQL inner-join semantics. Rows without a match on
/// every build side are dropped.
///
/// Emission order: probe arrival order, then build-side insertion order with
/// later datasets cycling fastest. Any decode or extraction failure aborts
/// this shard only, tagged with its index.
pub fn join_shard_with(
    backend: &dyn StorageBackend,
    datasets: &[PartitionedDataset],
    shard_index: usize,
    mut emit: impl FnMut(Record) -> Result<()>,
) -> Result<u64> {
    join_shard_inner(backend, datasets, shard_index, &mut emit)
        .map_err(|e| match e {
            already @ WeldError::Shard { .. } => already,
            other => other.in_shard(shard_index),
        })
}

/// Convenience wrapper collecting the joined rows.
pub fn join_shard(
    backend: &dyn StorageBackend,
    datasets: &[PartitionedDataset],
    shard_index: usize,
) -> Result<Vec<Record>> {
    let mut rows = Vec::new();
    join_shard_with(backend, datasets, shard_index, |row| {
        rows.push(row);
        Ok(())
    })?;
    Ok(rows)
}

type Multimap = AHashMap<Value, Vec<Record>>;

fn join_shard_inner(
    backend: &dyn StorageBackend,
    datasets: &[PartitionedDataset],
    shard_index: usize,
    emit: &mut dyn FnMut(Record) -> Result<()>,
) -> Result<u64> {
    let (probe, builds) = datasets
        .split_first()
        .ok_or_else(|| WeldError::InvalidConfig("join requires at least one dataset".to_string()))?;

    // Each build shard must individually fit in memory; that bound is the
    // caller's responsibility via the partition count.
    let build_maps: Vec<Multimap> = builds
        .iter()
        .map(|dataset| {
            let mut map = Multimap::new();
            let mut reader = dataset.shard_reader(backend, shard_index)?;
            while let Some(record) = reader.next_record()? {
                let key = rowweld_partition::extract_key(&record, dataset.key_index())?.clone();
                map.entry(key).or_default().push(record);
            }
            Ok(map)
        })
        .collect::<Result<_>>()?;

    debug!(
        shard_index,
        build_sides = build_maps.len(),
        build_rows = build_maps.iter().map(|m| m.values().map(Vec::len).sum::<usize>()).sum::<usize>(),
        "probing shard"
    );

    let mut emitted = 0u64;
    let mut probe_reader = probe.shard_reader(backend, shard_index)?;
    let probe_key_index = probe.key_index();

    'probe: while let Some(probe_record) = probe_reader.next_record()? {
        let key = rowweld_partition::extract_key(&probe_record, probe_key_index)?;

        let mut matches: Vec<&[Record]> = Vec::with_capacity(build_maps.len());
        for map in &build_maps {
            match map.get(key) {
                Some(rows) => matches.push(rows),
                // Inner join: one missing side drops the probe row.
                None => continue 'probe,
            }
        }

        emitted += emit_cross_product(&probe_record, &matches, emit)?;
    }

    Ok(emitted)
}

/// Emits `probe ++ m1 ++ m2 ++ ...` for every combination of build matches,
/// with the last build side cycling fastest.
fn emit_cross_product(
    probe: &Record,
    matches: &[&[Record]],
    emit: &mut dyn FnMut(Record) -> Result<()>,
) -> Result<u64> {
    if matches.is_empty() {
        emit(probe.clone())?;
        return Ok(1);
    }

    let mut cursors = vec![0usize; matches.len()];
    let mut emitted = 0u64;
    loop {
        let mut row = probe.clone();
        for (side, &rows) in matches.iter().enumerate() {
            row.extend_from_slice(&rows[cursors[side]]);
        }
        emit(row)?;
        emitted += 1;

        // Odometer increment over the match lists.
        let mut side = matches.len();
        loop {
            if side == 0 {
                return Ok(emitted);
            }
            side -= 1;
            cursors[side] += 1;
            if cursors[side] < matches[side].len() {
                break;
            }
            cursors[side] = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use rowweld_common::RuntimeConfig;
    use rowweld_format::{open_reader, Format, FormatParams};
    use rowweld_partition::{KeySpec, PartitionedDataset, Partitioner};
    use rowweld_storage::LocalFs;
    use tempfile::TempDir;

    use super::*;

    fn partition_csv(data: &str, root: &Path, num_partitions: usize) -> PartitionedDataset {
        let backend = LocalFs;
        let config = RuntimeConfig::default();
        let mut reader = open_reader(
            Format::Csv,
            Box::new(std::io::Cursor::new(data.to_string())),
            None,
            &FormatParams::new(),
        )
        .unwrap();
        Partitioner::new(&backend, &config)
            .partition(&mut *reader, &KeySpec::default(), root, num_partitions, "test.csv")
            .unwrap();
        PartitionedDataset::open(&backend, root).unwrap()
    }

    fn join_all(datasets: &[PartitionedDataset]) -> Vec<Record> {
        let backend = LocalFs;
        let mut rows = Vec::new();
        for i in 0..datasets[0].num_partitions() {
            rows.extend(join_shard(&backend, datasets, i).unwrap());
        }
        rows
    }

    fn rendered(rows: &[Record]) -> Vec<String> {
        let mut out: Vec<String> = rows
            .iter()
            .map(|r| {
                r.iter()
                    .map(|v| v.render().into_owned())
                    .collect::<Vec<_>>()
                    .join("|")
            })
            .collect();
        out.sort();
        out
    }

    #[test]
    fn matches_nested_loop_inner_join() {
        let root = TempDir::new().unwrap();
        let left = partition_csv("k,a\n1,x\n2,y\n3,z\n", &root.path().join("left"), 3);
        let right = partition_csv("k,b\n2,p\n3,q\n4,r\n", &root.path().join("right"), 3);

        let rows = rendered(&join_all(&[left, right]));
        // Naive nested-loop result over the same inputs, keys 2 and 3.
        assert_eq!(rows, vec!["2|y|2|p", "3|z|3|q"]);
    }

    #[test]
    fn duplicate_keys_fan_out_m_times_p() {
        let root = TempDir::new().unwrap();
        // p = 2 probe rows and m = 3 build rows for key 7.
        let left = partition_csv("k,a\n7,a1\n7,a2\n", &root.path().join("left"), 2);
        let right = partition_csv("k,b\n7,b1\n7,b2\n7,b3\n", &root.path().join("right"), 2);

        let rows = join_all(&[left, right]);
        assert_eq!(rows.len(), 2 * 3);
    }

    #[test]
    fn three_way_join_crosses_all_builds() {
        let root = TempDir::new().unwrap();
        let a = partition_csv("k,a\n1,a1\n", &root.path().join("a"), 2);
        let b = partition_csv("k,b\n1,b1\n1,b2\n", &root.path().join("b"), 2);
        let c = partition_csv("k,c\n1,c1\n1,c2\n", &root.path().join("c"), 2);

        let rows = rendered(&join_all(&[a, b, c]));
        assert_eq!(
            rows,
            vec![
                "1|a1|1|b1|1|c1",
                "1|a1|1|b1|1|c2",
                "1|a1|1|b2|1|c1",
                "1|a1|1|b2|1|c2",
            ]
        );
    }

    #[test]
    fn probe_rows_without_matches_are_dropped() {
        let root = TempDir::new().unwrap();
        let left = partition_csv("k,a\n1,x\n", &root.path().join("left"), 2);
        let right = partition_csv("k,b\n9,y\n", &root.path().join("right"), 2);

        assert!(join_all(&[left, right]).is_empty());
    }

    #[test]
    fn corrupt_shard_fails_with_its_index() {
        let root = TempDir::new().unwrap();
        let left = partition_csv("k,a\n1,x\n2,y\n", &root.path().join("left"), 1);
        let right = partition_csv("k,b\n1,p\n", &root.path().join("right"), 1);

        // Truncate the probe shard mid-frame.
        let shard = left.manifest.shard_path(left.dir(), 0);
        let bytes = std::fs::read(&shard).unwrap();
        std::fs::write(&shard, &bytes[..bytes.len() - 3]).unwrap();

        let err = join_shard(&LocalFs, &[left, right], 0).unwrap_err();
        assert_eq!(err.shard_index(), Some(0));
    }
}
