use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use tokio::sync::mpsc;

use sitepipe::dag::{ScheduledTask, TaskOutcome};
use sitepipe::errors::Result;
use sitepipe::pipeline::{TaskExecutor, TaskSettled};
use sitepipe::transform::{Transform, TransformFuture, TransformOutput};

/// A transform that does nothing and succeeds with no outputs.
pub struct NoopTransform;

impl Transform for NoopTransform {
    fn apply(&self, _inputs: Vec<PathBuf>, _dest: PathBuf) -> TransformFuture<'_> {
        Box::pin(async { Ok(TransformOutput::default()) })
    }
}

/// A transform that records each invocation under a label and either
/// succeeds (optionally reporting `written` outputs) or fails with a fixed
/// message.
pub struct FakeTransform {
    label: String,
    log: Arc<Mutex<Vec<String>>>,
    written: Vec<PathBuf>,
    fail_with: Option<String>,
}

impl FakeTransform {
    pub fn ok(label: &str, log: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            label: label.to_string(),
            log,
            written: vec![],
            fail_with: None,
        }
    }

    pub fn with_written(mut self, written: Vec<PathBuf>) -> Self {
        self.written = written;
        self
    }

    pub fn failing(label: &str, log: Arc<Mutex<Vec<String>>>, message: &str) -> Self {
        Self {
            label: label.to_string(),
            log,
            written: vec![],
            fail_with: Some(message.to_string()),
        }
    }
}

impl Transform for FakeTransform {
    fn apply(&self, _inputs: Vec<PathBuf>, _dest: PathBuf) -> TransformFuture<'_> {
        let label = self.label.clone();
        let log = Arc::clone(&self.log);
        let written = self.written.clone();
        let fail_with = self.fail_with.clone();

        Box::pin(async move {
            log.lock().expect("fake transform log poisoned").push(label);
            match fail_with {
                Some(message) => Err(anyhow!(message)),
                None => Ok(TransformOutput { written }),
            }
        })
    }
}

/// A fake executor that:
/// - records which tasks were "run", in dispatch order
/// - immediately settles each task, succeeding unless the task was marked
///   as failing via [`FakeExecutor::fail_task`].
pub struct FakeExecutor {
    settle_tx: mpsc::Sender<TaskSettled>,
    executed: Arc<Mutex<Vec<String>>>,
    failures: HashMap<String, String>,
}

impl FakeExecutor {
    pub fn new(settle_tx: mpsc::Sender<TaskSettled>, executed: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            settle_tx,
            executed,
            failures: HashMap::new(),
        }
    }

    pub fn fail_task(mut self, name: &str, message: &str) -> Self {
        self.failures.insert(name.to_string(), message.to_string());
        self
    }
}

impl TaskExecutor for FakeExecutor {
    fn dispatch(
        &mut self,
        tasks: Vec<ScheduledTask>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.settle_tx.clone();
        let executed = Arc::clone(&self.executed);
        let failures = self.failures.clone();

        Box::pin(async move {
            for t in tasks {
                {
                    let mut guard = executed.lock().expect("executed log poisoned");
                    guard.push(t.name.clone());
                }

                let outcome = match failures.get(&t.name) {
                    Some(message) => TaskOutcome::Failed {
                        message: message.clone(),
                    },
                    None => TaskOutcome::Succeeded { written: vec![] },
                };

                tx.send(TaskSettled {
                    task: t.name.clone(),
                    run_id: t.run_id,
                    outcome,
                })
                .await
                .map_err(anyhow::Error::from)?;
            }
            Ok(())
        })
    }
}
