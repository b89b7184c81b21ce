//! Storage backend abstraction for rowweld.
//!
//! The partition and join engines do all I/O through [`StorageBackend`]:
//! streaming read, append-only write, and atomic publish. [`LocalFs`] is the
//! local-filesystem implementation; [`Retrying`] layers fixed-backoff retries
//! over any backend for transient failures.

pub mod backend;
pub mod retry;

pub use backend::{LocalFs, StorageBackend};
pub use retry::Retrying;
