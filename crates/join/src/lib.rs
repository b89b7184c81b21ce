//! Shard-aligned equi-join engine for rowweld.
//!
//! Architecture role:
//! - validates join compatibility and enumerates per-shard tasks ([`planner`])
//! - hash-joins one shard index across all inputs, probe versus build
//!   multimaps ([`joiner`])
//! - parses and resolves output field selections ([`select`])
//! - runs shard tasks on a bounded worker pool and concatenates their
//!   fragments in shard order ([`run`])
//!
//! The join phase is embarrassingly parallel: every task touches only its
//! own shard index across all inputs and writes only its own fragment.
//! Manifests are read-only after publication, so no locking is involved.

pub mod joiner;
pub mod planner;
pub mod run;
pub mod select;

pub use joiner::{join_shard, join_shard_with};
pub use planner::{plan, ShardTask};
pub use run::{assemble, join, JoinOptions, JoinSummary};
pub use select::{parse_select, JoinSchema, Projection, SelectClause};
