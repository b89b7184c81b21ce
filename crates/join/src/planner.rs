use std::path::PathBuf;

use rowweld_common::{Result, WeldError};
use rowweld_partition::PartitionedDataset;
use tracing::debug;

/// One unit of join work: the same shard index across every input dataset.
#[derive(Debug, Clone)]
pub struct ShardTask {
    pub shard_index: usize,
    /// Shard path per input, in dataset order.
    pub inputs: Vec<PathBuf>,
}

/// Validates that the datasets are join-compatible and enumerates the shard
/// tasks.
///
/// Compatibility means one thing: an identical partition count everywhere.
/// Hash-function compatibility follows from the shared partitioning scheme;
/// a shard-count mismatch means equal keys may live at different indices, so
/// the whole join is rejected before any shard is touched.
pub fn plan(datasets: &[PartitionedDataset]) -> Result<Vec<ShardTask>> {
    if datasets.is_empty() {
        return Err(WeldError::InvalidConfig(
            "join requires at least one partitioned dataset".to_string(),
        ));
    }

    let num_partitions = datasets[0].num_partitions();
    if datasets.iter().any(|d| d.num_partitions() != num_partitions) {
        let detail = datasets
            .iter()
            .map(|d| format!("{}={}", d.name(), d.num_partitions()))
            .collect::<Vec<_>>()
            .join(", ");
        return Err(WeldError::IncompatibleManifests(format!(
            "datasets were partitioned with different shard counts: {detail}"
        )));
    }

    debug!(num_partitions, datasets = datasets.len(), "join plan ready");
    Ok((0..num_partitions)
        .map(|shard_index| ShardTask {
            shard_index,
            inputs: datasets
                .iter()
                .map(|d| d.manifest.shard_path(d.dir(), shard_index))
                .collect(),
        })
        .collect())
}
