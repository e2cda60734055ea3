// src/transform/scripts.rs

//! Script bundling as a transform step.
//!
//! [`ScriptCompiler`] is the default [`ModuleCompiler`]: it scans relative
//! `import` / `require` specifiers with regex and passes source through
//! untouched. [`BundleTransform`] adapts a [`Bundler`] to the transform
//! contract, serializing builds so the module cache stays consistent when
//! overlapping edits trigger while a compile is in flight.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail, Context};
use regex::Regex;
use tracing::info;

use crate::bundle::{Bundler, CompiledUnit, ModuleCompiler, ModuleId};
use crate::transform::{Transform, TransformFuture, TransformOutput};

/// Regex-based import scanner for ES / CommonJS style modules.
///
/// Only relative specifiers (`./`, `../`) become module edges; bare package
/// imports are left alone. Extensionless specifiers get `.js` appended.
pub struct ScriptCompiler {
    import_re: Regex,
    require_re: Regex,
}

impl ScriptCompiler {
    pub fn new() -> Self {
        // Both patterns are fixed literals; construction cannot fail.
        let import_re =
            Regex::new(r#"^\s*import\s+(?:[\w$\{\},\*\s]+\s+from\s+)?["']([^"']+)["']"#)
                .expect("static import regex");
        let require_re =
            Regex::new(r#"require\(\s*["']([^"']+)["']\s*\)"#).expect("static require regex");
        Self {
            import_re,
            require_re,
        }
    }
}

impl Default for ScriptCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleCompiler for ScriptCompiler {
    fn compile(&self, id: &ModuleId, source: &str) -> anyhow::Result<CompiledUnit> {
        let mut imports = Vec::new();

        for line in source.lines() {
            let captured = self
                .import_re
                .captures(line)
                .or_else(|| self.require_re.captures(line));
            if let Some(caps) = captured {
                let spec = &caps[1];
                if spec.starts_with("./") || spec.starts_with("../") {
                    let resolved = resolve_relative(id, spec)?;
                    if !imports.contains(&resolved) {
                        imports.push(resolved);
                    }
                }
            }
        }

        Ok(CompiledUnit {
            output: source.to_string(),
            imports,
        })
    }
}

/// Resolve a relative specifier against the importing module's directory.
fn resolve_relative(importer: &str, spec: &str) -> anyhow::Result<ModuleId> {
    let mut segments: Vec<&str> = importer.split('/').collect();
    segments.pop(); // drop the importer's file name

    for part in spec.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    bail!("import '{spec}' escapes the source root");
                }
            }
            other => segments.push(other),
        }
    }

    let mut resolved = segments.join("/");
    let file = resolved.rsplit('/').next().unwrap_or(&resolved);
    if !file.contains('.') {
        resolved.push_str(".js");
    }
    Ok(resolved)
}

/// Adapts an incremental [`Bundler`] to the [`Transform`] contract.
///
/// The bundler lives behind a mutex: a trigger arriving while a compile is
/// in flight queues on the lock, and because every build re-checks
/// fingerprints, queued triggers coalesce into cheap no-op relinks.
pub struct BundleTransform {
    bundler: Arc<Mutex<Bundler>>,
}

impl BundleTransform {
    pub fn new(bundler: Bundler) -> Self {
        Self {
            bundler: Arc::new(Mutex::new(bundler)),
        }
    }

    /// Shared handle to the underlying bundler, for inspection in tests and
    /// diagnostics.
    pub fn bundler(&self) -> Arc<Mutex<Bundler>> {
        Arc::clone(&self.bundler)
    }
}

impl Transform for BundleTransform {
    fn apply(&self, _inputs: Vec<PathBuf>, _dest: PathBuf) -> TransformFuture<'_> {
        let bundler = Arc::clone(&self.bundler);

        Box::pin(async move {
            let artifact = tokio::task::spawn_blocking(move || {
                let mut guard = bundler
                    .lock()
                    .map_err(|_| anyhow!("bundler mutex poisoned"))?;
                guard.build().map_err(anyhow::Error::from)
            })
            .await
            .context("bundle task panicked")??;

            info!(
                modules = artifact.modules,
                recompiled = artifact.recompiled,
                reused = artifact.reused,
                "bundle transform finished"
            );

            Ok(TransformOutput {
                written: vec![artifact.path],
            })
        })
    }
}
