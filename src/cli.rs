// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for `sitepipe`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "sitepipe",
    version,
    about = "Build and watch a static-content project with dependency-aware tasks.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Sitepipe.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Sitepipe.toml", global = true)]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SITEPIPE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the resolved task graph, but don't execute.
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub mode: Mode,
}

/// Operating mode.
#[derive(Debug, Clone, Subcommand)]
pub enum Mode {
    /// Run the build graph once; exit 0 only if every requested task succeeded.
    Build {
        /// Run every task even when its declared inputs are unchanged.
        #[arg(long)]
        force: bool,
    },
    /// Build once, then stay resident rebuilding on source changes.
    Watch,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
