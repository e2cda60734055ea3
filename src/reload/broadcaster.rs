// src/reload/broadcaster.rs

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info};

/// How much of the page a client should refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReloadScope {
    /// Reload the whole page.
    Full,
    /// Only swap stylesheets in place; no navigation.
    Styles,
}

/// One reload message pushed to every connected preview client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReloadSignal {
    pub scope: ReloadScope,
    /// Changed output paths, relative to the output root where possible.
    pub paths: Vec<String>,
}

/// Fans reload signals out to connected clients.
///
/// Emission is fire-and-forget: with no subscribers the signal is dropped.
/// The caller (the pipeline) invokes [`ReloadBroadcaster::notify`] exactly
/// once per settled run, so clients never see per-task reload storms from
/// one logical change.
#[derive(Debug, Clone)]
pub struct ReloadBroadcaster {
    tx: broadcast::Sender<ReloadSignal>,
    /// Output root, used to relativize the paths carried by signals.
    out_root: PathBuf,
}

/// Plenty for reload traffic; a lagging client just skips stale signals.
const CHANNEL_CAPACITY: usize = 64;

impl ReloadBroadcaster {
    pub fn new(out_root: impl Into<PathBuf>) -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            tx,
            out_root: out_root.into(),
        }
    }

    /// Subscribe a new preview client. Dropping the receiver disconnects it.
    pub fn subscribe(&self) -> broadcast::Receiver<ReloadSignal> {
        self.tx.subscribe()
    }

    /// Number of currently connected clients.
    pub fn client_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Push one reload signal for a batch of output changes.
    ///
    /// No-op when the batch is empty: a run that only skipped tasks changes
    /// nothing a client could see.
    pub fn notify(&self, affected: &[PathBuf]) {
        if affected.is_empty() {
            return;
        }

        let scope = scope_for(affected);
        let paths = affected
            .iter()
            .map(|p| {
                p.strip_prefix(&self.out_root)
                    .unwrap_or(p)
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect::<Vec<_>>();

        info!(
            ?scope,
            changes = paths.len(),
            clients = self.client_count(),
            "broadcasting reload signal"
        );

        // No subscribers is fine; the next client to connect sees the next run.
        let _ = self.tx.send(ReloadSignal { scope, paths });
    }
}

/// A batch that touched only stylesheets refreshes styles in place; anything
/// else forces a full page reload.
fn scope_for(affected: &[PathBuf]) -> ReloadScope {
    let styles_only = affected
        .iter()
        .all(|p| extension_is(p, "css") || extension_is(p, "map"));
    if styles_only {
        debug!("style-only change batch; scoping reload to styles");
        ReloadScope::Styles
    } else {
        ReloadScope::Full
    }
}

fn extension_is(path: &Path, ext: &str) -> bool {
    path.extension()
        .map(|e| e.eq_ignore_ascii_case(ext))
        .unwrap_or(false)
}
