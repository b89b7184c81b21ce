//! Key-hashed dataset partitioning for rowweld.
//!
//! Architecture role:
//! - resolves key specs and maps key values to shard indices ([`key`])
//! - streams a dataset once into N shard files and publishes the manifest
//!   atomically ([`writer`])
//! - defines the durable manifest format ([`layout`]) and read access to a
//!   published dataset ([`reader`])
//!
//! Two datasets are joinable only if they were partitioned with the same
//! shard count and [`key::bucket_for`]; the join crate enforces the former
//! and this crate guarantees the latter stays stable.

pub mod key;
pub mod layout;
pub mod reader;
pub mod writer;

pub use key::{bucket_for, extract_key, KeySpec};
pub use layout::{Manifest, ShardMeta, MANIFEST_FILE, MANIFEST_FORMAT_VERSION};
pub use reader::PartitionedDataset;
pub use writer::Partitioner;
