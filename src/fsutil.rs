// src/fsutil.rs

//! Small filesystem helpers shared by transforms, the executor and the
//! bundler.
//!
//! Output files are never written in place: contents go to a staging file in
//! the destination directory and are renamed over the target, so a crashed
//! or cancelled task can't leave a half-written artifact behind.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use globset::GlobSet;

/// Write `contents` to `path` atomically (staging file + rename).
pub fn atomic_write(path: &Path, contents: &[u8]) -> Result<()> {
    let staging = staging_path(path)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating dir {:?}", parent))?;
    }
    fs::write(&staging, contents).with_context(|| format!("staging write to {:?}", staging))?;
    fs::rename(&staging, path)
        .with_context(|| format!("renaming {:?} into place at {:?}", staging, path))?;
    Ok(())
}

/// Copy `src` to `dst` atomically (staging file + rename).
pub fn atomic_copy(src: &Path, dst: &Path) -> Result<()> {
    let staging = staging_path(dst)?;
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating dir {:?}", parent))?;
    }
    fs::copy(src, &staging).with_context(|| format!("copying {:?} to {:?}", src, staging))?;
    fs::rename(&staging, dst)
        .with_context(|| format!("renaming {:?} into place at {:?}", staging, dst))?;
    Ok(())
}

fn staging_path(path: &Path) -> Result<PathBuf> {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        bail!("cannot stage write for path {:?}", path);
    };
    Ok(path.with_file_name(format!(".{name}.tmp")))
}

/// Collect all files under `root` matching `include` and not `exclude`,
/// sorted for deterministic downstream hashing and copying.
///
/// Paths are matched relative to `root` with forward slashes.
pub fn collect_matching_files(
    root: &Path,
    include: &GlobSet,
    exclude: Option<&GlobSet>,
) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            // The source tree may mutate underneath us mid-walk.
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
            Err(err) => return Err(err).with_context(|| format!("reading dir {:?}", dir)),
        };
        for entry in entries {
            let path = entry?.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.is_file() {
                if let Ok(rel) = path.strip_prefix(root) {
                    let rel_str = rel.to_string_lossy().replace('\\', "/");
                    if include.is_match(&rel_str)
                        && !exclude.map(|e| e.is_match(&rel_str)).unwrap_or(false)
                    {
                        files.push(path);
                    }
                }
            }
        }
    }

    files.sort();
    Ok(files)
}
