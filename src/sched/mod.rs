// src/sched/mod.rs

//! Run planning and per-run scheduling state.
//!
//! - [`scheduler`] turns a requested task set into a [`run::PipelineRun`]
//!   (dependency closure in deterministic topological order).
//! - [`run`] is the per-run state machine: ready selection under a
//!   parallelism budget, outcome recording, failure cascade, run report.
//! - [`freshness`] holds input fingerprinting and the fingerprint stores
//!   behind incremental skipping.

pub mod freshness;
pub mod run;
pub mod scheduler;

pub use freshness::{
    aggregate_fingerprint, compute_file_hash, FileFingerprintStore, FingerprintStore,
    MemoryFingerprintStore, FINGERPRINT_FILE,
};
pub use run::{PipelineRun, RunReport};
pub use scheduler::Scheduler;
