//! Record model and row codecs for rowweld.
//!
//! Architecture role:
//! - defines [`Value`]/[`Record`], the row representation shared by every phase
//! - provides the [`RowReader`]/[`RowWriter`] capability pair with one
//!   implementation per format (CSV, JSON lines, binary frames), selected by
//!   configuration rather than runtime type inspection
//!
//! Key modules:
//! - [`record`]
//! - [`params`]
//! - [`csv`], [`jsonl`], [`binrec`]

use std::io::{Read, Write};

use rowweld_common::Result;

pub mod binrec;
pub mod csv;
pub mod jsonl;
pub mod params;
pub mod record;

pub use params::{parse_fmtparams, sniff_format, Format, FormatParams};
pub use record::{Record, Value};

/// Streamable, reset-free reader of records in source order.
///
/// `schema` may be `None` until the codec has seen enough input to know the
/// field names (JSON lines and headerless CSV learn them from the first
/// record).
pub trait RowReader: Send {
    fn schema(&self) -> Option<&[String]>;
    fn next_record(&mut self) -> Result<Option<Record>>;
}

/// Append-only record writer. `finish` flushes; dropping without calling it
/// may lose buffered rows.
pub trait RowWriter: Send {
    fn write(&mut self, record: &Record) -> Result<()>;
    fn finish(&mut self) -> Result<()>;
}

/// Builds a reader for `format` over an already-opened byte stream.
pub fn open_reader(
    format: Format,
    input: Box<dyn Read + Send>,
    field_names: Option<Vec<String>>,
    params: &FormatParams,
) -> Result<Box<dyn RowReader>> {
    Ok(match format {
        Format::Csv => Box::new(csv::CsvRowReader::new(input, field_names, params)?),
        Format::JsonLines => Box::new(jsonl::JsonRowReader::new(input, field_names)),
        Format::Binary => Box::new(binrec::BinRowReader::new(input, field_names)),
    })
}

/// Builds a writer for `format` over an already-opened byte sink.
///
/// `fragment_index` lets formats with file-level framing (the CSV header)
/// behave correctly when per-shard fragments are concatenated afterwards.
pub fn open_writer(
    format: Format,
    output: Box<dyn Write + Send>,
    schema: &[String],
    fragment_index: usize,
    params: &FormatParams,
) -> Result<Box<dyn RowWriter>> {
    Ok(match format {
        Format::Csv => Box::new(csv::CsvRowWriter::new(
            output,
            schema,
            fragment_index,
            params,
        )?),
        Format::JsonLines => Box::new(jsonl::JsonRowWriter::new(output, schema)),
        Format::Binary => Box::new(binrec::BinRowWriter::new(output)),
    })
}
