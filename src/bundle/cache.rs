// src/bundle/cache.rs

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::bundle::module::ModuleId;

/// One cached module: compiled output, direct dependencies and the content
/// fingerprint of the source it was compiled from.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub output: String,
    pub deps: Vec<ModuleId>,
    pub fingerprint: String,
}

/// The bundler's persistent (per-process) module cache.
///
/// Owned exclusively by one [`crate::bundle::Bundler`]; invalidated per
/// module, never wholesale. The reverse-dependency index maps a module to
/// the set of modules importing it, which is what makes per-module
/// invalidation transitive.
#[derive(Debug, Default)]
pub struct BundleCache {
    entries: HashMap<ModuleId, CacheEntry>,
    /// module -> set of modules importing it.
    importers: HashMap<ModuleId, HashSet<ModuleId>>,
    hits: u64,
    misses: u64,
}

impl BundleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&CacheEntry> {
        self.entries.get(id)
    }

    pub fn fingerprint_of(&self, id: &str) -> Option<&str> {
        self.entries.get(id).map(|e| e.fingerprint.as_str())
    }

    /// Compiled output of a cached module, if any. Exposed so callers (and
    /// tests) can observe that unrelated entries are untouched.
    pub fn output_of(&self, id: &str) -> Option<&str> {
        self.entries.get(id).map(|e| e.output.as_str())
    }

    /// Cumulative count of modules served from cache across builds.
    pub fn hits(&self) -> u64 {
        self.hits
    }

    /// Cumulative count of modules compiled across builds.
    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub(crate) fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub(crate) fn record_miss(&mut self) {
        self.misses += 1;
    }

    /// Insert or replace a module entry, keeping the reverse-dependency
    /// index in sync.
    pub(crate) fn insert(&mut self, id: ModuleId, entry: CacheEntry) {
        if let Some(old) = self.entries.get(&id) {
            for dep in &old.deps {
                if let Some(set) = self.importers.get_mut(dep) {
                    set.remove(&id);
                }
            }
        }
        for dep in &entry.deps {
            self.importers
                .entry(dep.clone())
                .or_default()
                .insert(id.clone());
        }
        debug!(module = %id, deps = entry.deps.len(), "cached compiled module");
        self.entries.insert(id, entry);
    }

    /// The changed modules plus, transitively, every module importing one
    /// of them. This is the exact set a rebuild recompiles.
    pub fn invalidation_closure(&self, changed: &HashSet<ModuleId>) -> HashSet<ModuleId> {
        let mut invalidated: HashSet<ModuleId> = HashSet::new();
        let mut stack: Vec<ModuleId> = changed.iter().cloned().collect();

        while let Some(id) = stack.pop() {
            if !invalidated.insert(id.clone()) {
                continue;
            }
            if let Some(importers) = self.importers.get(&id) {
                stack.extend(importers.iter().cloned());
            }
        }

        invalidated
    }
}
