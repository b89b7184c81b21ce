use serde::{Deserialize, Serialize};

/// Runtime knobs shared by the partition and join phases.
///
/// Constructed once (typically by the CLI) and passed by reference; nothing
/// in the core reads ambient/global configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Worker threads for the join phase. `0` means one per available core.
    pub join_parallelism: usize,
    /// Attempts for transient storage open/create failures.
    pub io_retry_attempts: usize,
    /// Fixed backoff between retry attempts, in milliseconds.
    pub io_retry_backoff_ms: u64,
    /// Emit a progress log line every this many records during partitioning.
    pub progress_log_every: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            join_parallelism: 0,
            io_retry_attempts: 3,
            io_retry_backoff_ms: 250,
            progress_log_every: 1_000_000,
        }
    }
}

impl RuntimeConfig {
    /// Resolves `join_parallelism` to a concrete thread count.
    pub fn effective_parallelism(&self) -> usize {
        if self.join_parallelism > 0 {
            return self.join_parallelism;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}
