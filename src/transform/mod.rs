// src/transform/mod.rs

//! The transform-step contract and the shipped implementations.
//!
//! Transforms are the pluggable edge of the system: the scheduler never
//! interprets file content, it only hands a resolved input set and a
//! destination directory to a [`Transform`] and records success or failure.
//! A transform must be idempotent: re-running on identical inputs yields
//! byte-identical output.
//!
//! - [`shell`] runs an external command (site generators, minifiers, ...).
//! - [`copy`] mirrors matched files into the task's output directory.
//! - [`scripts`] links a script module graph through the incremental
//!   bundler.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

pub mod copy;
pub mod scripts;
pub mod shell;

pub use copy::CopyTransform;
pub use scripts::{BundleTransform, ScriptCompiler};
pub use shell::ShellTransform;

/// Output locations produced by one transform invocation.
#[derive(Debug, Clone, Default)]
pub struct TransformOutput {
    pub written: Vec<PathBuf>,
}

pub type TransformFuture<'a> =
    Pin<Box<dyn Future<Output = anyhow::Result<TransformOutput>> + Send + 'a>>;

/// Contract between the scheduler and an external transform step.
pub trait Transform: Send + Sync {
    /// Apply the transform to the resolved `inputs`, producing files under
    /// `dest`. Errors isolate to the owning task's subtree; they never abort
    /// the process.
    fn apply(&self, inputs: Vec<PathBuf>, dest: PathBuf) -> TransformFuture<'_>;
}
