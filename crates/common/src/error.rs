use thiserror::Error;

/// Canonical rowweld error taxonomy used across crates.
///
/// Classification guidance:
/// - [`WeldError::KeySpec`]: bad key index/name, reported before any I/O starts
/// - [`WeldError::IncompatibleManifests`]: join inputs that were not partitioned alike
/// - [`WeldError::UnknownField`]: a selection referencing no joined field, checked
///   before any shard task runs
/// - [`WeldError::Shard`]: failure isolated to one shard's task, carries the index
/// - [`WeldError::Format`]: record decode/encode failures
/// - [`WeldError::InvalidConfig`]: path/option/CLI contract violations
/// - [`WeldError::Io`]: raw filesystem IO failures from std APIs
#[derive(Debug, Error)]
pub enum WeldError {
    /// Key spec references a field index out of range or a name absent
    /// from the dataset schema.
    #[error("invalid key spec: {0}")]
    KeySpec(String),

    /// Join inputs report different partition counts; records with equal
    /// keys could land in different shard indices, so no join is attempted.
    #[error("incompatible manifests: {0}")]
    IncompatibleManifests(String),

    /// A selected output field does not exist in any joined schema.
    #[error("unknown field: {0}")]
    UnknownField(String),

    /// Failure scoped to a single shard's task. Sibling shard tasks are
    /// unaffected, but the overall operation fails once any shard does.
    #[error("shard {index}: {source}")]
    Shard {
        index: usize,
        #[source]
        source: Box<WeldError>,
    },

    /// Invalid or inconsistent configuration/manifest state.
    ///
    /// Examples:
    /// - zero partition count
    /// - manifest shard list not matching its partition count
    /// - unparseable format params
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Record-level encode/decode failures (CSV, JSON lines, binary frames).
    #[error("format error: {0}")]
    Format(String),

    /// Transparent std IO failures.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl WeldError {
    /// Wraps the error with the shard index it occurred in.
    pub fn in_shard(self, index: usize) -> WeldError {
        WeldError::Shard {
            index,
            source: Box::new(self),
        }
    }

    /// Returns the shard index attached to this error, if any.
    pub fn shard_index(&self) -> Option<usize> {
        match self {
            WeldError::Shard { index, .. } => Some(*index),
            _ => None,
        }
    }
}

/// Standard rowweld result alias.
pub type Result<T> = std::result::Result<T, WeldError>;

#[cfg(test)]
mod tests {
    use super::WeldError;

    #[test]
    fn shard_wrapping_keeps_index_and_cause() {
        let err = WeldError::Format("truncated frame".to_string()).in_shard(3);
        assert_eq!(err.shard_index(), Some(3));
        assert_eq!(err.to_string(), "shard 3: format error: truncated frame");
    }

    #[test]
    fn non_shard_errors_have_no_index() {
        let err = WeldError::InvalidConfig("bad".to_string());
        assert_eq!(err.shard_index(), None);
    }
}
