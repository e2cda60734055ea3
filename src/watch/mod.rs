// src/watch/mod.rs

//! File watching and change coalescing.
//!
//! This module is responsible for:
//! - Compiling per-task `inputs` / `exclude` glob patterns into watch rules.
//! - Wiring up a cross-platform filesystem watcher (`notify`).
//! - Debouncing event bursts into a single change batch carrying the union
//!   of triggered task names.
//!
//! It does **not** know about task dependencies; it only turns filesystem
//! changes into task-level change batches for the pipeline to schedule.

pub mod debounce;
pub mod rules;
pub mod watcher;

pub use debounce::spawn_debouncer;
pub use rules::{build_globset, RuleSet, WatchRule};
pub use watcher::{spawn_watcher, WatcherHandle};
