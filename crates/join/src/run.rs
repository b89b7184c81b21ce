use std::io::Write;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use rowweld_common::{Result, RuntimeConfig, WeldError};
use rowweld_format::{open_writer, Format, FormatParams, RowWriter};
use rowweld_partition::PartitionedDataset;
use rowweld_storage::StorageBackend;
use tracing::{error, info};

use crate::joiner::join_shard_with;
use crate::planner::plan;
use crate::select::{parse_select, JoinSchema, Projection};

/// Caller-facing options for one join run.
#[derive(Debug, Clone)]
pub struct JoinOptions {
    /// Output row format.
    pub format: Format,
    /// Output codec options (delimiter, write_header, ...).
    pub params: FormatParams,
    /// SELECT list; `None` keeps the default projection.
    pub select: Option<String>,
    /// Worker threads; `0` falls back to the runtime config.
    pub parallelism: usize,
}

impl Default for JoinOptions {
    fn default() -> Self {
        Self {
            format: Format::Binary,
            params: FormatParams::new(),
            select: None,
            parallelism: 0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct JoinSummary {
    pub rows: u64,
    pub num_partitions: usize,
}

/// Runs a shard-aligned join of `sources` into `output`.
///
/// Validation (manifest compatibility, selection resolution) happens before
/// any shard task is dispatched. Shard tasks then run on a bounded rayon
/// pool, each writing its own fragment under a scratch directory; fragments
/// are concatenated into `output` only once every task has succeeded, so a
/// failed run never publishes partial output.
pub fn join(
    backend: &dyn StorageBackend,
    config: &RuntimeConfig,
    sources: &[PathBuf],
    output: &Path,
    options: &JoinOptions,
) -> Result<JoinSummary> {
    let datasets = sources
        .iter()
        .map(|dir| PartitionedDataset::open(backend, dir))
        .collect::<Result<Vec<_>>>()?;

    let tasks = plan(&datasets)?;
    let schema = JoinSchema::new(&datasets);
    let projection = match &options.select {
        Some(query) => schema.resolve(&parse_select(query)?)?,
        None => schema.default_projection(),
    };

    let threads = if options.parallelism > 0 {
        options.parallelism
    } else {
        config.effective_parallelism()
    };
    info!(
        datasets = datasets.len(),
        num_partitions = tasks.len(),
        threads,
        output = %output.display(),
        "joining partitioned datasets"
    );

    let scratch = tempfile::Builder::new()
        .prefix("rowweld-join-")
        .tempdir()?;
    let fragment_path =
        |index: usize| scratch.path().join(format!("fragment-{index:05}"));

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| WeldError::InvalidConfig(format!("worker pool init failed: {e}")))?;

    let results: Vec<Result<u64>> = pool.install(|| {
        tasks
            .par_iter()
            .map(|task| {
                run_shard_task(
                    backend,
                    &datasets,
                    &projection,
                    task.shard_index,
                    &fragment_path(task.shard_index),
                    options,
                )
            })
            .collect()
    });

    let mut rows = 0u64;
    let mut first_failure = None;
    for (index, result) in results.into_iter().enumerate() {
        match result {
            Ok(n) => rows += n,
            Err(e) => {
                error!(shard_index = index, error = %e, "shard task failed");
                first_failure.get_or_insert(e);
            }
        }
    }
    if let Some(e) = first_failure {
        return Err(e);
    }

    let fragments: Vec<PathBuf> = tasks.iter().map(|t| fragment_path(t.shard_index)).collect();
    assemble(backend, &fragments, output)?;

    info!(rows, output = %output.display(), "join complete");
    Ok(JoinSummary {
        rows,
        num_partitions: tasks.len(),
    })
}

fn run_shard_task(
    backend: &dyn StorageBackend,
    datasets: &[PartitionedDataset],
    projection: &Projection,
    shard_index: usize,
    fragment: &Path,
    options: &JoinOptions,
) -> Result<u64> {
    let attempt = || -> Result<u64> {
        let sink = backend.create(fragment)?;
        let mut writer = open_writer(
            options.format,
            sink,
            &projection.names,
            shard_index,
            &options.params,
        )?;
        let rows = join_shard_with(backend, datasets, shard_index, |row| {
            writer.write(&projection.apply(&row)?)
        })?;
        writer.finish()?;
        Ok(rows)
    };
    attempt().map_err(|e| match e {
        already @ WeldError::Shard { .. } => already,
        other => other.in_shard(shard_index),
    })
}

/// Concatenates per-shard fragments into the final output, in shard index
/// order for reproducibility. Row order within a fragment is whatever the
/// joiner produced.
pub fn assemble(
    backend: &dyn StorageBackend,
    fragments: &[PathBuf],
    output: &Path,
) -> Result<()> {
    let mut out = backend.create(output)?;
    for fragment in fragments {
        let mut reader = backend.open_read(fragment)?;
        std::io::copy(&mut reader, &mut out)?;
    }
    out.flush()?;
    Ok(())
}
