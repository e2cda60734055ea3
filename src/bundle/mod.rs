// src/bundle/mod.rs

//! Incremental script bundling.
//!
//! The bundler links an entry module and its transitive import graph into
//! one output file, re-using cached compiled output for unchanged modules.
//!
//! - [`module`] defines module identities and the `ModuleCompiler`
//!   collaborator contract; the bundler itself never parses file content.
//! - [`cache`] holds compiled output, dependency sets and fingerprints per
//!   module, plus the reverse-dependency index used for invalidation.
//! - [`bundler`] walks the graph, recompiles exactly the invalidated set and
//!   links the bundle in deterministic order.

pub mod bundler;
pub mod cache;
pub mod module;

pub use bundler::{BundleArtifact, Bundler};
pub use cache::BundleCache;
pub use module::{CompiledUnit, ModuleCompiler, ModuleId};
