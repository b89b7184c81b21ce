use std::io::Read;
use std::io::Write;

use ::csv::{ReaderBuilder, StringRecord, WriterBuilder};
use rowweld_common::{Result, WeldError};

use crate::params::{bool_param, byte_param, FormatParams};
use crate::record::{Record, Value};
use crate::{RowReader, RowWriter};

/// Streaming CSV reader.
///
/// Field names come from, in order of precedence: the explicit list handed
/// in by the caller, the header row (unless `header=false`), or synthesized
/// `f0..fN` names derived from the first data row.
pub struct CsvRowReader {
    reader: ::csv::Reader<Box<dyn Read + Send>>,
    schema: Option<Vec<String>>,
    buf: StringRecord,
}

impl CsvRowReader {
    pub fn new(
        input: Box<dyn Read + Send>,
        field_names: Option<Vec<String>>,
        params: &FormatParams,
    ) -> Result<Self> {
        let delimiter = byte_param(params, "delimiter", b',')?;
        let quote = byte_param(params, "quotechar", b'"')?;
        let has_header = bool_param(params, "header", true)?;

        let reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .quote(quote)
            .has_headers(false)
            .flexible(true)
            .from_reader(input);

        let mut out = Self {
            reader,
            schema: field_names,
            buf: StringRecord::new(),
        };

        // The header row is only consumed when it is the source of the
        // schema; explicit field names mean every row is data.
        if out.schema.is_none() && has_header {
            if out.read_raw()? {
                out.schema = Some(out.buf.iter().map(str::to_string).collect());
            }
        }
        Ok(out)
    }

    fn read_raw(&mut self) -> Result<bool> {
        self.reader
            .read_record(&mut self.buf)
            .map_err(|e| WeldError::Format(format!("csv decode failed: {e}")))
    }
}

impl RowReader for CsvRowReader {
    fn schema(&self) -> Option<&[String]> {
        self.schema.as_deref()
    }

    fn next_record(&mut self) -> Result<Option<Record>> {
        if !self.read_raw()? {
            return Ok(None);
        }
        // Every data row must match the schema arity; a ragged row would
        // otherwise shift fields against the manifest downstream.
        if let Some(schema) = &self.schema {
            if self.buf.len() != schema.len() {
                return Err(WeldError::Format(format!(
                    "row has {} fields, schema has {}",
                    self.buf.len(),
                    schema.len()
                )));
            }
        }
        let record: Record = self
            .buf
            .iter()
            .map(|field| Value::Str(field.to_string()))
            .collect();
        if self.schema.is_none() {
            self.schema = Some((0..record.len()).map(|i| format!("f{i}")).collect());
        }
        Ok(Some(record))
    }
}

/// CSV writer; emits a header row only for fragment 0 so concatenated
/// fragments form one well-formed file.
pub struct CsvRowWriter {
    writer: ::csv::Writer<Box<dyn Write + Send>>,
}

impl CsvRowWriter {
    pub fn new(
        output: Box<dyn Write + Send>,
        schema: &[String],
        fragment_index: usize,
        params: &FormatParams,
    ) -> Result<Self> {
        let delimiter = byte_param(params, "delimiter", b',')?;
        let quote = byte_param(params, "quotechar", b'"')?;
        let write_header = bool_param(params, "write_header", true)?;

        let mut writer = WriterBuilder::new()
            .delimiter(delimiter)
            .quote(quote)
            .from_writer(output);

        if write_header && fragment_index == 0 {
            writer
                .write_record(schema)
                .map_err(|e| WeldError::Format(format!("csv header write failed: {e}")))?;
        }
        Ok(Self { writer })
    }
}

impl RowWriter for CsvRowWriter {
    fn write(&mut self, record: &Record) -> Result<()> {
        self.writer
            .write_record(record.iter().map(|v| v.render().into_owned()))
            .map_err(|e| WeldError::Format(format!("csv write failed: {e}")))
    }

    fn finish(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| WeldError::Format(format!("csv flush failed: {e}")))
    }
}
