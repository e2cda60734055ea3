// src/watch/debounce.rs

//! Debounce coalescing for watch triggers.
//!
//! Editors routinely emit several filesystem events per save. The debouncer
//! opens a window on the first trigger and folds everything arriving inside
//! it into a single [`ChangeBatch`] carrying the union of triggered task
//! names, so one logical edit schedules exactly one rebuild.

use std::collections::BTreeSet;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::dag::TaskName;
use crate::pipeline::ChangeBatch;

/// One matched filesystem event: the tasks it triggers and the path that
/// caused it (relative to the watch root, for diagnostics).
#[derive(Debug, Clone)]
pub struct Trigger {
    pub tasks: BTreeSet<TaskName>,
    pub path: String,
}

/// Spawn the debounce loop.
///
/// Consumes raw [`Trigger`]s and emits coalesced [`ChangeBatch`]es after
/// `window` of quiet following the first trigger. The loop ends when the
/// trigger channel closes or the batch receiver goes away; aborting the
/// returned handle cancels any in-flight window, so no timer fires after
/// shutdown.
pub fn spawn_debouncer(
    window: Duration,
    mut trigger_rx: mpsc::UnboundedReceiver<Trigger>,
    batch_tx: mpsc::Sender<ChangeBatch>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(first) = trigger_rx.recv().await {
            let mut tasks = first.tasks;
            let mut paths = vec![first.path];

            let deadline = tokio::time::sleep(window);
            tokio::pin!(deadline);

            loop {
                tokio::select! {
                    _ = &mut deadline => break,
                    more = trigger_rx.recv() => match more {
                        Some(trigger) => {
                            tasks.extend(trigger.tasks);
                            paths.push(trigger.path);
                        }
                        None => break,
                    }
                }
            }

            paths.sort();
            paths.dedup();

            debug!(
                ?tasks,
                events = paths.len(),
                "debounce window closed; emitting change batch"
            );

            if batch_tx.send(ChangeBatch { tasks, paths }).await.is_err() {
                break;
            }
        }

        debug!("debounce loop finished");
    })
}
