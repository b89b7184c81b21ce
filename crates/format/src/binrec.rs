use std::io::{Read, Write};

use rowweld_common::{Result, WeldError};

use crate::record::Record;
use crate::{RowReader, RowWriter};

/// Upper bound on a single frame; anything larger is a corrupt length prefix.
const MAX_FRAME_BYTES: u32 = 256 * 1024 * 1024;

/// Length-prefixed binary record reader.
///
/// This is the shard storage format: a u32 little-endian payload length
/// followed by the bincode-encoded record. Frames carry no schema; field
/// names live in the dataset manifest.
pub struct BinRowReader {
    input: Box<dyn Read + Send>,
    schema: Option<Vec<String>>,
}

impl BinRowReader {
    pub fn new(input: Box<dyn Read + Send>, field_names: Option<Vec<String>>) -> Self {
        Self {
            input,
            schema: field_names,
        }
    }
}

impl RowReader for BinRowReader {
    fn schema(&self) -> Option<&[String]> {
        self.schema.as_deref()
    }

    fn next_record(&mut self) -> Result<Option<Record>> {
        let mut len_buf = [0u8; 4];
        let mut filled = 0;
        while filled < len_buf.len() {
            match self.input.read(&mut len_buf[filled..])? {
                0 if filled == 0 => return Ok(None),
                0 => {
                    return Err(WeldError::Format(
                        "truncated frame header at end of shard".to_string(),
                    ))
                }
                n => filled += n,
            }
        }

        let len = u32::from_le_bytes(len_buf);
        if len > MAX_FRAME_BYTES {
            return Err(WeldError::Format(format!(
                "frame length {len} exceeds limit, shard is corrupt"
            )));
        }
        let mut payload = vec![0u8; len as usize];
        self.input
            .read_exact(&mut payload)
            .map_err(|e| WeldError::Format(format!("truncated frame payload: {e}")))?;
        bincode::deserialize(&payload)
            .map(Some)
            .map_err(|e| WeldError::Format(format!("record decode failed: {e}")))
    }
}

/// Length-prefixed binary record writer.
pub struct BinRowWriter {
    output: Box<dyn Write + Send>,
}

impl BinRowWriter {
    pub fn new(output: Box<dyn Write + Send>) -> Self {
        Self { output }
    }
}

impl RowWriter for BinRowWriter {
    fn write(&mut self, record: &Record) -> Result<()> {
        let payload = bincode::serialize(record)
            .map_err(|e| WeldError::Format(format!("record encode failed: {e}")))?;
        self.output
            .write_all(&(payload.len() as u32).to_le_bytes())?;
        self.output.write_all(&payload)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.output.flush()?;
        Ok(())
    }
}
