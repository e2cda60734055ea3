// src/transform/shell.rs

//! Shell-command transform.
//!
//! Used for steps sitepipe deliberately does not implement itself: site
//! generators, style compilers, minifiers. The command runs from the project
//! root with stdout/stderr drained into the log at debug level.

use std::path::PathBuf;
use std::process::Stdio;

use anyhow::{bail, Context};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::transform::{Transform, TransformFuture, TransformOutput};

pub struct ShellTransform {
    command: String,
    /// Working directory for the command (the project root).
    cwd: PathBuf,
}

impl ShellTransform {
    pub fn new(command: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            cwd: cwd.into(),
        }
    }
}

impl Transform for ShellTransform {
    fn apply(&self, _inputs: Vec<PathBuf>, dest: PathBuf) -> TransformFuture<'_> {
        Box::pin(async move {
            info!(cmd = %self.command, "running shell transform");

            tokio::fs::create_dir_all(&dest)
                .await
                .with_context(|| format!("creating output dir {:?}", dest))?;

            // Build a shell command appropriate for the platform.
            let mut cmd = if cfg!(windows) {
                let mut c = Command::new("cmd");
                c.arg("/C").arg(&self.command);
                c
            } else {
                let mut c = Command::new("sh");
                c.arg("-c").arg(&self.command);
                c
            };

            cmd.current_dir(&self.cwd)
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true);

            let mut child = cmd
                .spawn()
                .with_context(|| format!("spawning command '{}'", self.command))?;

            // Always consume both pipes so buffers don't fill.
            if let Some(stdout) = child.stdout.take() {
                tokio::spawn(async move {
                    let mut lines = BufReader::new(stdout).lines();
                    while let Ok(Some(line)) = lines.next_line().await {
                        debug!("stdout: {}", line);
                    }
                });
            }
            if let Some(stderr) = child.stderr.take() {
                tokio::spawn(async move {
                    let mut lines = BufReader::new(stderr).lines();
                    while let Ok(Some(line)) = lines.next_line().await {
                        debug!("stderr: {}", line);
                    }
                });
            }

            let status = child
                .wait()
                .await
                .with_context(|| format!("waiting for command '{}'", self.command))?;

            if !status.success() {
                let code = status.code().unwrap_or(-1);
                bail!("command exited with status {code}");
            }

            // The command owns its output directory; report it as the
            // produced location.
            Ok(TransformOutput {
                written: vec![dest],
            })
        })
    }
}
