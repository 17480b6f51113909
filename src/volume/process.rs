//! Subprocess Executor
//!
//! Runs external tools on the tokio runtime so a slow backend command only
//! suspends the provisioning task that issued it.

use crate::domain::ports::{ProcessExecutor, ProcessOutput};
use crate::error::{Error, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

/// [`ProcessExecutor`] backed by `tokio::process`
#[derive(Debug, Clone, Default)]
pub struct TokioProcessExecutor;

impl TokioProcessExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessExecutor for TokioProcessExecutor {
    async fn run(&self, path: &str, args: &[String]) -> Result<ProcessOutput> {
        debug!("Running {} {}", path, args.join(" "));

        let output = Command::new(path)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::backend(path, format!("failed to spawn: {}", e)))?;

        Ok(ProcessOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            // Killed by a signal
            exit_code: output.status.code().unwrap_or(-1),
        })
    }
}
