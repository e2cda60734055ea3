// src/transform/copy.rs

//! File-copy transform for binary asset classes (fonts, images).

use std::path::PathBuf;

use anyhow::Context;
use tracing::debug;

use crate::fsutil::atomic_copy;
use crate::transform::{Transform, TransformFuture, TransformOutput};

/// Mirrors matched inputs into the task's output directory.
///
/// Each input's path relative to the source root, minus the optional `base`
/// prefix, is reproduced under `dest`, so `assets/fonts/a/b.woff2` with
/// `base = "assets/fonts"` lands at `<dest>/a/b.woff2`.
pub struct CopyTransform {
    source_root: PathBuf,
    base: Option<PathBuf>,
}

impl CopyTransform {
    pub fn new(source_root: impl Into<PathBuf>, base: Option<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
            base,
        }
    }
}

impl Transform for CopyTransform {
    fn apply(&self, inputs: Vec<PathBuf>, dest: PathBuf) -> TransformFuture<'_> {
        let source_root = self.source_root.clone();
        let base = self.base.clone();

        Box::pin(async move {
            let output = tokio::task::spawn_blocking(move || {
                let mut written = Vec::with_capacity(inputs.len());

                for input in &inputs {
                    let rel = input
                        .strip_prefix(&source_root)
                        .with_context(|| format!("input {:?} outside source root", input))?;
                    let rel = match &base {
                        Some(base) => rel.strip_prefix(base).unwrap_or(rel),
                        None => rel,
                    };
                    let target = dest.join(rel);
                    atomic_copy(input, &target)?;
                    debug!(from = ?input, to = ?target, "copied asset");
                    written.push(target);
                }

                anyhow::Ok(TransformOutput { written })
            })
            .await
            .context("copy task panicked")??;

            Ok(output)
        })
    }
}
