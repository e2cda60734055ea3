// src/sched/freshness.rs

//! Input fingerprinting for incremental skipping.
//!
//! A task's fingerprint is a blake3 hash over the (sorted) contents of every
//! file matching its input globs. If the fingerprint equals the one recorded
//! at the task's last successful run, the task is provably fresh and may be
//! skipped without invoking its transform.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use blake3::Hasher;
use tracing::{debug, info};

use crate::dag::TaskName;

/// Relative path (from the project root) to the fingerprint file used by
/// [`FileFingerprintStore`].
pub const FINGERPRINT_FILE: &str = ".sitepipe/fingerprints";

fn fingerprint_file_path(root: &Path) -> PathBuf {
    root.join(FINGERPRINT_FILE)
}

/// Compute the hash of a single file.
pub fn compute_file_hash(path: &Path) -> Result<String> {
    let mut hasher = Hasher::new();
    let mut file =
        File::open(path).with_context(|| format!("opening file for hashing: {:?}", path))?;
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// Compute a deterministic fingerprint over the contents of the given files.
///
/// Order of `paths` does not matter; they are sorted before hashing so the
/// result is stable across directory iteration order.
pub fn aggregate_fingerprint<I, P>(paths: I) -> Result<String>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let mut paths_vec: Vec<PathBuf> = paths
        .into_iter()
        .map(|p| p.as_ref().to_path_buf())
        .collect();
    paths_vec.sort();

    let mut hasher = Hasher::new();
    for path in paths_vec {
        if path.is_file() {
            let file_hash = compute_file_hash(&path)?;
            hasher.update(file_hash.as_bytes());
        }
    }

    let fingerprint = hasher.finalize().to_hex().to_string();
    debug!(fingerprint = %fingerprint, "computed aggregate input fingerprint");
    Ok(fingerprint)
}

/// Abstract storage for per-task input fingerprints.
pub trait FingerprintStore: Send + Sync {
    fn load(&self, task: &str) -> Result<Option<String>>;
    fn save(&mut self, task: &str, fingerprint: &str) -> Result<()>;
    /// Remove fingerprints for tasks not in the `active_tasks` list.
    fn prune(&mut self, active_tasks: &[&str]) -> Result<()>;
}

/// Stores fingerprints in `<root>/.sitepipe/fingerprints`, one
/// `<task> <hash>` pair per line, so freshness survives restarts.
pub struct FileFingerprintStore {
    root: PathBuf,
}

impl FileFingerprintStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

impl FingerprintStore for FileFingerprintStore {
    fn load(&self, task: &str) -> Result<Option<String>> {
        let map = load_all(&self.root)?;
        Ok(map.get(task).cloned())
    }

    fn save(&mut self, task: &str, fingerprint: &str) -> Result<()> {
        let mut map = load_all(&self.root)?;
        map.insert(task.to_string(), fingerprint.to_string());
        save_all(&self.root, &map)?;
        debug!(task = %task, "stored task fingerprint (file)");
        Ok(())
    }

    fn prune(&mut self, active_tasks: &[&str]) -> Result<()> {
        let mut map = load_all(&self.root)?;
        let initial_len = map.len();
        map.retain(|k, _| active_tasks.contains(&k.as_str()));

        if map.len() < initial_len {
            save_all(&self.root, &map)?;
            info!(
                removed = initial_len - map.len(),
                "pruned stale task fingerprints (file)"
            );
        }
        Ok(())
    }
}

/// Stores fingerprints in memory only; every process restart rebuilds from
/// scratch.
#[derive(Default)]
pub struct MemoryFingerprintStore {
    map: HashMap<String, String>,
}

impl MemoryFingerprintStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FingerprintStore for MemoryFingerprintStore {
    fn load(&self, task: &str) -> Result<Option<String>> {
        Ok(self.map.get(task).cloned())
    }

    fn save(&mut self, task: &str, fingerprint: &str) -> Result<()> {
        self.map.insert(task.to_string(), fingerprint.to_string());
        debug!(task = %task, "stored task fingerprint (memory)");
        Ok(())
    }

    fn prune(&mut self, active_tasks: &[&str]) -> Result<()> {
        self.map.retain(|k, _| active_tasks.contains(&k.as_str()));
        Ok(())
    }
}

fn load_all(root: &Path) -> Result<HashMap<TaskName, String>> {
    let path = fingerprint_file_path(root);

    if !path.exists() {
        return Ok(HashMap::new());
    }

    let file =
        File::open(&path).with_context(|| format!("opening fingerprint file at {:?}", path))?;
    let reader = BufReader::new(file);

    let mut map = HashMap::new();

    for line_res in reader.lines() {
        let line = line_res?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some((name, hash)) = trimmed.split_once(char::is_whitespace) {
            map.insert(name.to_string(), hash.trim().to_string());
        }
    }

    Ok(map)
}

fn save_all(root: &Path, map: &HashMap<TaskName, String>) -> Result<()> {
    let path = fingerprint_file_path(root);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating fingerprint directory at {:?}", parent))?;
    }

    let file =
        File::create(&path).with_context(|| format!("creating fingerprint file at {:?}", path))?;
    let mut writer = BufWriter::new(file);

    for (name, hash) in map.iter() {
        writeln!(writer, "{} {}", name, hash)?;
    }

    writer.flush()?;
    Ok(())
}
