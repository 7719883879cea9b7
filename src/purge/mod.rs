//! The purge engine: duration filtering, age probing, and the two-phase
//! deletion workflow with partial-failure accounting.

pub mod checkpoint;
pub mod duration;
pub mod engine;
pub mod probe;
pub mod stats;

pub use checkpoint::{PurgeCheckpoint, SnapshotOutcome};
pub use engine::PurgeExecutor;
pub use probe::{AgeProbe, ProbeReport, RepositoryInfo};
pub use stats::PurgeStats;
