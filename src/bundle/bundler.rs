// src/bundle/bundler.rs

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};

use crate::bundle::cache::{BundleCache, CacheEntry};
use crate::bundle::module::{CompiledUnit, ModuleCompiler, ModuleId};
use crate::errors::{PipelineError, Result};
use crate::fsutil::atomic_write;

/// Result of one successful bundle build.
#[derive(Debug, Clone)]
pub struct BundleArtifact {
    pub path: PathBuf,
    /// Modules reachable from the entry in this build.
    pub modules: usize,
    /// Modules compiled in this build.
    pub recompiled: usize,
    /// Modules served from cache in this build.
    pub reused: usize,
}

/// Links an entry module and its transitive import graph into one output
/// file, re-using cached output for unchanged modules.
///
/// Builds are synchronous and mutate the cache; callers serialize them (see
/// [`crate::transform::BundleTransform`]). A failed build mutates neither
/// the cache nor the output file, so the previous good bundle survives any
/// compile error.
pub struct Bundler {
    source_root: PathBuf,
    entry: ModuleId,
    out_path: PathBuf,
    compiler: Arc<dyn ModuleCompiler>,
    cache: BundleCache,
    /// Hash of the last successfully linked bundle; identical relinks skip
    /// the write entirely.
    last_linked: Option<String>,
}

impl std::fmt::Debug for Bundler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bundler")
            .field("entry", &self.entry)
            .field("out_path", &self.out_path)
            .field("cached_modules", &self.cache.len())
            .finish_non_exhaustive()
    }
}

impl Bundler {
    pub fn new(
        source_root: impl Into<PathBuf>,
        entry: impl Into<ModuleId>,
        out_path: impl Into<PathBuf>,
        compiler: Arc<dyn ModuleCompiler>,
    ) -> Self {
        Self {
            source_root: source_root.into(),
            entry: entry.into(),
            out_path: out_path.into(),
            compiler,
            cache: BundleCache::new(),
            last_linked: None,
        }
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn cache(&self) -> &BundleCache {
        &self.cache
    }

    /// Walk the module graph from the entry, recompile exactly what changed
    /// (plus its transitive importers), link and write the bundle.
    pub fn build(&mut self) -> Result<BundleArtifact> {
        let mut walk = Walk::default();
        self.visit(self.entry.clone(), &mut walk)?;

        // Invalidation: a changed module takes every importer of it with it,
        // transitively, restricted to what is actually reachable this build.
        let invalidated: HashSet<ModuleId> = self
            .cache
            .invalidation_closure(&walk.changed)
            .into_iter()
            .filter(|id| walk.visited.contains(id))
            .collect();

        // Recompile invalidated importers whose own source did not change.
        // Their fingerprint is unchanged, only their output must be rebuilt
        // against the new dependency set.
        for id in &walk.order {
            if invalidated.contains(id) && !walk.fresh.contains_key(id) {
                let source = walk
                    .sources
                    .get(id)
                    .ok_or_else(|| compile_error(id, "module source missing from walk"))?;
                let fingerprint = blake3::hash(source.as_bytes()).to_hex().to_string();
                let unit = self
                    .compiler
                    .compile(id, source)
                    .map_err(|err| compile_error(id, &format!("{err:#}")))?;
                walk.fresh.insert(id.clone(), (unit, fingerprint));
            }
        }

        // Commit: everything compiled this round replaces its cache entry;
        // the rest is reused as-is.
        let recompiled = walk.fresh.len();
        let mut reused = 0usize;
        for id in &walk.order {
            if let Some((unit, fingerprint)) = walk.fresh.remove(id) {
                self.cache.insert(
                    id.clone(),
                    CacheEntry {
                        output: unit.output,
                        deps: unit.imports,
                        fingerprint,
                    },
                );
                self.cache.record_miss();
            } else {
                self.cache.record_hit();
                reused += 1;
            }
        }

        // Link: depth-first, first-import-first. Dependencies always
        // precede their importers, the entry comes last.
        let mut bundle = String::new();
        for id in &walk.order {
            let entry = self
                .cache
                .get(id)
                .ok_or_else(|| compile_error(id, "module missing from cache after commit"))?;
            bundle.push_str("// --- module: ");
            bundle.push_str(id);
            bundle.push_str(" ---\n");
            bundle.push_str(&entry.output);
            if !entry.output.ends_with('\n') {
                bundle.push('\n');
            }
        }

        let bundle_hash = blake3::hash(bundle.as_bytes()).to_hex().to_string();
        if self.last_linked.as_deref() != Some(bundle_hash.as_str()) {
            atomic_write(&self.out_path, bundle.as_bytes())?;
            self.last_linked = Some(bundle_hash);
            info!(
                path = ?self.out_path,
                modules = walk.order.len(),
                recompiled,
                reused,
                "bundle linked"
            );
        } else {
            debug!(path = ?self.out_path, "bundle unchanged; skipping write");
        }

        Ok(BundleArtifact {
            path: self.out_path.clone(),
            modules: walk.order.len(),
            recompiled,
            reused,
        })
    }

    /// Depth-first discovery from `id`: read + fingerprint the source, reuse
    /// cached dependency lists when the fingerprint matches, compile eagerly
    /// otherwise (a changed module's imports are only known after compiling
    /// it). Emits `id` after its imports, which is the link order.
    fn visit(&self, id: ModuleId, walk: &mut Walk) -> Result<()> {
        if !walk.visited.insert(id.clone()) {
            return Ok(());
        }

        let path = self.source_root.join(&id);
        let source = fs::read_to_string(&path)
            .map_err(|err| compile_error(&id, &format!("cannot read module: {err}")))?;
        let fingerprint = blake3::hash(source.as_bytes()).to_hex().to_string();

        let deps: Vec<ModuleId> = match self.cache.get(&id) {
            Some(entry) if entry.fingerprint == fingerprint => entry.deps.clone(),
            _ => {
                debug!(module = %id, "module new or changed; compiling");
                walk.changed.insert(id.clone());
                let unit = self
                    .compiler
                    .compile(&id, &source)
                    .map_err(|err| compile_error(&id, &format!("{err:#}")))?;
                let deps = unit.imports.clone();
                walk.fresh.insert(id.clone(), (unit, fingerprint));
                deps
            }
        };

        walk.sources.insert(id.clone(), source);

        for dep in deps {
            self.visit(dep, walk)?;
        }

        walk.order.push(id);
        Ok(())
    }
}

/// Scratch state for one build's graph walk.
#[derive(Default)]
struct Walk {
    visited: HashSet<ModuleId>,
    /// Post-order: dependencies before importers, entry last.
    order: Vec<ModuleId>,
    /// Modules whose fingerprint differs from the cache (or are new).
    changed: HashSet<ModuleId>,
    /// Source text per visited module, for invalidation recompiles.
    sources: HashMap<ModuleId, String>,
    /// Units compiled this build, keyed by module, with their fingerprints.
    fresh: HashMap<ModuleId, (CompiledUnit, String)>,
}

fn compile_error(module: &str, message: &str) -> PipelineError {
    PipelineError::Compile {
        module: module.to_string(),
        message: message.to_string(),
    }
}
