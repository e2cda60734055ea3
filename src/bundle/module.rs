// src/bundle/module.rs

//! Module identities and the compiler collaborator contract.

/// Identity of a module: its path relative to the source root, with forward
/// slashes (e.g. `"assets/scripts/util.js"`).
pub type ModuleId = String;

/// Result of compiling a single module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledUnit {
    /// Compiled text emitted into the bundle for this module.
    pub output: String,
    /// Identities of modules imported directly by this one, in source order.
    pub imports: Vec<ModuleId>,
}

/// External collaborator that understands the module format.
///
/// The bundler hands it raw source text and gets back compiled output plus
/// the direct import list; everything graph- and cache-shaped stays in the
/// bundler. Implementations must be deterministic: identical source yields
/// an identical unit.
pub trait ModuleCompiler: Send + Sync {
    fn compile(&self, id: &ModuleId, source: &str) -> anyhow::Result<CompiledUnit>;
}
