//! Shared configuration and error contracts for rowweld crates.
//!
//! Architecture role:
//! - defines the runtime configuration passed across layers
//! - provides the common [`WeldError`] / [`Result`] contracts
//!
//! Key modules:
//! - [`config`]
//! - [`error`]

pub mod config;
pub mod error;

pub use config::RuntimeConfig;
pub use error::{Result, WeldError};
