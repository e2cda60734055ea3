// src/watch/watcher.rs

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::errors::Result;
use crate::pipeline::ChangeBatch;
use crate::watch::debounce::{spawn_debouncer, Trigger};
use crate::watch::rules::RuleSet;

/// Handle for the filesystem watcher.
///
/// Keeps the underlying `RecommendedWatcher` alive; [`WatcherHandle::stop`]
/// tears down both forwarding and debouncing so no pending timer fires after
/// shutdown.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
    forward: JoinHandle<()>,
    debounce: JoinHandle<()>,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

impl WatcherHandle {
    /// Stop watching. In-flight debounce windows are cancelled, not flushed.
    pub fn stop(self) {
        self.forward.abort();
        self.debounce.abort();
        // `_inner` drops here, which stops the OS-level watches.
    }
}

/// Spawn a filesystem watcher observing `root` recursively.
///
/// Every create/modify/delete event path is relativized against `root` and
/// matched against `rules`; matched task names flow through the debouncer
/// and come out of `batch_tx` as coalesced [`ChangeBatch`]es.
///
/// Failing to establish the root watch is fatal and returned here; per-event
/// errors after that are reported and monitoring continues.
pub fn spawn_watcher(
    root: impl Into<PathBuf>,
    rules: RuleSet,
    batch_tx: mpsc::Sender<ChangeBatch>,
    window: Duration,
) -> Result<WatcherHandle> {
    let root = root.into();
    // Canonicalize once so event paths relativize against a stable base.
    let root = root.canonicalize().unwrap_or_else(|_| root.clone());

    // Channel from the blocking notify callback into the async world.
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                let _ = event_tx.send(event);
            }
            Err(err) => {
                // No tracing context inside the notify callback; fall back
                // to stderr and keep watching whatever still works.
                eprintln!("sitepipe: file watch error: {err}");
            }
        },
        Config::default(),
    )?;

    watcher.watch(&root, RecursiveMode::Recursive)?;

    info!("file watcher started on {:?}", root);

    let (trigger_tx, trigger_rx) = mpsc::unbounded_channel::<Trigger>();
    let debounce = spawn_debouncer(window, trigger_rx, batch_tx);

    let forward = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            for path in event.paths {
                let Some(rel) = relative_str(&root, &path) else {
                    debug!(?path, "event path outside watch root; ignoring");
                    continue;
                };

                let tasks = rules.tasks_for(&rel);
                if tasks.is_empty() {
                    continue;
                }

                debug!(path = %rel, ?tasks, "watch match -> triggering tasks");

                if trigger_tx.send(Trigger { tasks, path: rel }).is_err() {
                    return;
                }
            }
        }
        debug!("watcher event loop finished");
    });

    Ok(WatcherHandle {
        _inner: watcher,
        forward,
        debounce,
    })
}

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// Falls back to canonicalizing both sides, which papers over symlinked
/// prefixes (notably `/private/var` on macOS).
fn relative_str(root: &Path, path: &Path) -> Option<String> {
    if let Ok(rel) = path.strip_prefix(root) {
        return Some(rel.to_string_lossy().replace('\\', "/"));
    }

    if let (Ok(root_canon), Ok(path_canon)) = (root.canonicalize(), path.canonicalize()) {
        if let Ok(rel) = path_canon.strip_prefix(&root_canon) {
            return Some(rel.to_string_lossy().replace('\\', "/"));
        }
    }

    None
}
