use std::io::Read;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use rowweld_common::{Result, RuntimeConfig};
use rowweld_format::{
    open_reader, parse_fmtparams, sniff_format, Format, FormatParams, RowReader, RowWriter,
};
use rowweld_join::{join, JoinOptions};
use rowweld_partition::{KeySpec, PartitionedDataset, Partitioner};
use rowweld_storage::{LocalFs, Retrying, StorageBackend};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rowweld", version, about = "Partition large datasets and join them shard by shard")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Split a dataset into key-hashed partitions.
    Partition {
        /// Source file, or '-' for stdin.
        input: String,
        /// Directory the partitioned dataset is written to.
        output_dir: PathBuf,
        /// Number of partitions; join inputs must agree on this.
        num_partitions: usize,
        /// Zero-based index of the partition key field.
        #[arg(long, conflicts_with = "keyname")]
        keyindex: Option<usize>,
        /// Name of the partition key field.
        #[arg(long)]
        keyname: Option<String>,
        /// Explicit field names; without them CSV uses its header row.
        #[arg(long, num_args = 1..)]
        fieldnames: Vec<String>,
        /// Input format (csv, json, bin); inferred from the path if omitted.
        #[arg(long)]
        format: Option<Format>,
        /// Reader options as key=value pairs, e.g. delimiter=|
        #[arg(long, num_args = 0..)]
        fmtparams: Vec<String>,
    },
    /// Join partitioned datasets on their partition keys.
    Join {
        /// Output file for the joined dataset.
        output: PathBuf,
        /// Partitioned dataset directories, probe side first.
        #[arg(required = true, num_args = 1..)]
        sources: Vec<PathBuf>,
        /// Output format (csv, json, bin); inferred from the output path if omitted.
        #[arg(long)]
        format: Option<Format>,
        /// Writer options as key=value pairs, e.g. write_header=false
        #[arg(long, num_args = 0..)]
        fmtparams: Vec<String>,
        /// Output fields, e.g. --select name currency or --select "0.iso3 as code"
        #[arg(long, num_args = 1..)]
        select: Vec<String>,
        /// Join worker threads; 0 means one per core.
        #[arg(long, default_value_t = 0)]
        parallelism: usize,
    },
    /// Print a partitioned dataset's manifest, or dump one shard.
    Inspect {
        /// Partitioned dataset directory.
        dataset_dir: PathBuf,
        /// Shard index to dump as JSON lines; omit for a manifest summary.
        #[arg(long)]
        partition: Option<usize>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = RuntimeConfig::default();
    let backend = Retrying::from_config(LocalFs, &config);

    match cli.command {
        Command::Partition {
            input,
            output_dir,
            num_partitions,
            keyindex,
            keyname,
            fieldnames,
            format,
            fmtparams,
        } => {
            let keyspec = match (keyindex, keyname) {
                (Some(i), None) => KeySpec::Index(i),
                (None, Some(name)) => KeySpec::Name(name),
                (None, None) => KeySpec::default(),
                (Some(_), Some(_)) => unreachable!("clap rejects conflicting key flags"),
            };
            let format = match format {
                Some(f) => f,
                None => sniff_format(&input)?,
            };
            let params = parse_fmtparams(&fmtparams)?;
            let field_names = if fieldnames.is_empty() {
                None
            } else {
                Some(fieldnames)
            };

            let mut reader = open_source(&backend, &input, format, field_names, &params)?;
            Partitioner::new(&backend, &config).partition(
                &mut *reader,
                &keyspec,
                &output_dir,
                num_partitions,
                &input,
            )?;
            Ok(())
        }
        Command::Join {
            output,
            sources,
            format,
            fmtparams,
            select,
            parallelism,
        } => {
            let format = match format {
                Some(f) => f,
                None => sniff_format(&output.to_string_lossy()).unwrap_or(Format::Binary),
            };
            let options = JoinOptions {
                format,
                params: parse_fmtparams(&fmtparams)?,
                select: if select.is_empty() {
                    None
                } else {
                    Some(select.join(", "))
                },
                parallelism,
            };
            join(&backend, &config, &sources, &output, &options)?;
            Ok(())
        }
        Command::Inspect {
            dataset_dir,
            partition,
        } => inspect(&backend, &dataset_dir, partition),
    }
}

fn open_source(
    backend: &dyn StorageBackend,
    input: &str,
    format: Format,
    field_names: Option<Vec<String>>,
    params: &FormatParams,
) -> Result<Box<dyn RowReader>> {
    let stream: Box<dyn Read + Send> = if input == "-" {
        Box::new(std::io::stdin())
    } else {
        backend.open_read(Path::new(input))?
    };
    open_reader(format, stream, field_names, params)
}

fn inspect(
    backend: &dyn StorageBackend,
    dataset_dir: &Path,
    partition: Option<usize>,
) -> Result<()> {
    let dataset = PartitionedDataset::open(backend, dataset_dir)?;
    match partition {
        None => {
            let manifest = &dataset.manifest;
            println!("dataset:    {}", dataset_dir.display());
            println!("source:     {}", manifest.source_path);
            println!("partitions: {}", manifest.num_partitions);
            println!(
                "key:        {} (index {})",
                manifest.key_name(),
                manifest.key_index
            );
            println!("fields:     {}", manifest.field_names.join(", "));
            println!("rows:       {}", manifest.total_rows());
            for shard in &manifest.shards {
                println!("  {}  {} rows", shard.file, shard.rows);
            }
            Ok(())
        }
        Some(index) => {
            let mut reader = dataset.shard_reader(backend, index)?;
            let mut writer = rowweld_format::open_writer(
                Format::JsonLines,
                Box::new(std::io::stdout()),
                dataset.field_names(),
                0,
                &FormatParams::new(),
            )?;
            while let Some(record) = reader.next_record()? {
                writer.write(&record)?;
            }
            writer.finish()
        }
    }
}
