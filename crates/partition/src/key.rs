use rowweld_common::{Result, WeldError};
use rowweld_format::{Record, Value};
use twox_hash::XxHash3_64;

/// Identifies the join-key field of a dataset, by position or by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySpec {
    Index(usize),
    Name(String),
}

impl Default for KeySpec {
    /// "First field" unless the caller says otherwise.
    fn default() -> Self {
        KeySpec::Index(0)
    }
}

impl KeySpec {
    /// Resolves the spec against a schema. Fails if the index is out of
    /// range or the name is absent; must resolve to exactly one field.
    pub fn resolve(&self, field_names: &[String]) -> Result<usize> {
        match self {
            KeySpec::Index(i) => {
                if *i < field_names.len() {
                    Ok(*i)
                } else {
                    Err(WeldError::KeySpec(format!(
                        "key index {i} out of range for {} fields",
                        field_names.len()
                    )))
                }
            }
            KeySpec::Name(name) => field_names
                .iter()
                .position(|f| f == name)
                .ok_or_else(|| {
                    WeldError::KeySpec(format!(
                        "key field '{name}' not in schema {field_names:?}"
                    ))
                }),
        }
    }
}

/// Pulls the key value out of a record. Pure function of its inputs, so
/// repeated extraction for the same record is stable across processes.
pub fn extract_key(record: &Record, key_index: usize) -> Result<&Value> {
    record.get(key_index).ok_or_else(|| {
        WeldError::KeySpec(format!(
            "key index {key_index} out of range for record with {} fields",
            record.len()
        ))
    })
}

/// Maps a key value to a shard index.
///
/// XXH3-64 over the value's canonical byte encoding, mod N. Both sides of a
/// join rely on this exact function having been used at partition time;
/// changing it invalidates every existing manifest.
pub fn bucket_for(key: &Value, num_partitions: usize) -> usize {
    debug_assert!(num_partitions > 0);
    let hash = XxHash3_64::oneshot(&key.canonical_bytes());
    (hash % num_partitions as u64) as usize
}
