use std::io::{BufRead, BufReader, Read, Write};

use rowweld_common::{Result, WeldError};

use crate::record::{Record, Value};
use crate::{RowReader, RowWriter};

/// JSON-lines reader: one object per line.
///
/// Without explicit field names the schema is the first record's keys,
/// sorted; later records missing a key yield `Null` for that field, and
/// extra keys are dropped.
pub struct JsonRowReader {
    input: BufReader<Box<dyn Read + Send>>,
    schema: Option<Vec<String>>,
    line: String,
}

impl JsonRowReader {
    pub fn new(input: Box<dyn Read + Send>, field_names: Option<Vec<String>>) -> Self {
        Self {
            input: BufReader::new(input),
            schema: field_names,
            line: String::new(),
        }
    }
}

impl RowReader for JsonRowReader {
    fn schema(&self) -> Option<&[String]> {
        self.schema.as_deref()
    }

    fn next_record(&mut self) -> Result<Option<Record>> {
        loop {
            self.line.clear();
            if self.input.read_line(&mut self.line)? == 0 {
                return Ok(None);
            }
            if !self.line.trim().is_empty() {
                break;
            }
        }

        let parsed: serde_json::Value = serde_json::from_str(self.line.trim_end())
            .map_err(|e| WeldError::Format(format!("json decode failed: {e}")))?;
        let mut object = match parsed {
            serde_json::Value::Object(map) => map,
            other => {
                return Err(WeldError::Format(format!(
                    "expected a json object per line, got {other}"
                )))
            }
        };

        if self.schema.is_none() {
            let mut names: Vec<String> = object.keys().cloned().collect();
            names.sort();
            self.schema = Some(names);
        }

        let schema = self.schema.as_ref().unwrap();
        let record = schema
            .iter()
            .map(|name| {
                object
                    .remove(name)
                    .map(Value::from_json)
                    .unwrap_or(Value::Null)
            })
            .collect();
        Ok(Some(record))
    }
}

/// JSON-lines writer; every fragment is self-describing, so fragments
/// concatenate without any header handling.
pub struct JsonRowWriter {
    output: Box<dyn Write + Send>,
    schema: Vec<String>,
}

impl JsonRowWriter {
    pub fn new(output: Box<dyn Write + Send>, schema: &[String]) -> Self {
        Self {
            output,
            schema: schema.to_vec(),
        }
    }
}

impl RowWriter for JsonRowWriter {
    fn write(&mut self, record: &Record) -> Result<()> {
        if record.len() != self.schema.len() {
            return Err(WeldError::Format(format!(
                "record has {} fields, schema has {}",
                record.len(),
                self.schema.len()
            )));
        }
        let object: serde_json::Map<String, serde_json::Value> = self
            .schema
            .iter()
            .zip(record)
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect();
        serde_json::to_writer(&mut self.output, &object)
            .map_err(|e| WeldError::Format(format!("json encode failed: {e}")))?;
        self.output.write_all(b"\n")?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.output.flush()?;
        Ok(())
    }
}
