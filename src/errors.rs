// src/errors.rs

//! Crate-wide error taxonomy.
//!
//! Configuration problems (duplicates, cycles, malformed globs, unknown
//! references) are fatal at startup. Transform and compile failures are
//! scoped to one task / one bundle attempt and never take the process down.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("duplicate task '{0}'")]
    DuplicateTask(String),

    #[error("cycle detected in task graph involving '{0}'")]
    GraphCycle(String),

    #[error("unknown task '{0}'")]
    UnknownTask(String),

    #[error("transform failed for task '{task}': {message}")]
    Transform { task: String, message: String },

    #[error("compile error in module '{module}': {message}")]
    Compile { module: String, message: String },

    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
