use std::io::{Read, Write};
use std::path::Path;
use std::thread;
use std::time::Duration;

use rowweld_common::{Result, RuntimeConfig, WeldError};
use tracing::warn;

use crate::backend::StorageBackend;

/// Wraps a backend with fixed-backoff retries for transient I/O failures.
///
/// Only raw I/O errors are retried; validation and format errors pass
/// through untouched on the first attempt.
pub struct Retrying<B> {
    inner: B,
    attempts: usize,
    backoff: Duration,
}

impl<B: StorageBackend> Retrying<B> {
    pub fn new(inner: B, attempts: usize, backoff: Duration) -> Self {
        Self {
            inner,
            attempts: attempts.max(1),
            backoff,
        }
    }

    pub fn from_config(inner: B, config: &RuntimeConfig) -> Self {
        Self::new(
            inner,
            config.io_retry_attempts,
            Duration::from_millis(config.io_retry_backoff_ms),
        )
    }

    fn with_retry<T>(&self, op: &str, path: &Path, mut f: impl FnMut(&B) -> Result<T>) -> Result<T> {
        let mut last = None;
        for attempt in 1..=self.attempts {
            match f(&self.inner) {
                Ok(v) => return Ok(v),
                Err(WeldError::Io(e)) => {
                    warn!(
                        op,
                        path = %path.display(),
                        attempt,
                        attempts = self.attempts,
                        error = %e,
                        "transient storage failure"
                    );
                    last = Some(WeldError::Io(e));
                    if attempt < self.attempts {
                        thread::sleep(self.backoff);
                    }
                }
                Err(other) => return Err(other),
            }
        }
        Err(last.expect("at least one attempt"))
    }
}

impl<B: StorageBackend> StorageBackend for Retrying<B> {
    fn open_read(&self, path: &Path) -> Result<Box<dyn Read + Send>> {
        self.with_retry("open_read", path, |b| b.open_read(path))
    }

    fn create(&self, path: &Path) -> Result<Box<dyn Write + Send>> {
        self.with_retry("create", path, |b| b.create(path))
    }

    fn publish(&self, temp: &Path, dest: &Path) -> Result<()> {
        self.with_retry("publish", dest, |b| b.publish(temp, dest))
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        self.with_retry("create_dir_all", path, |b| b.create_dir_all(path))
    }

    fn remove(&self, path: &Path) -> Result<()> {
        self.with_retry("remove", path, |b| b.remove(path))
    }
}
