//! Gluster CLI Adapter
//!
//! Wraps the `gluster` command-line tool. Knows which backend responses are
//! benign (a volume that is already there, already started, or simply absent)
//! and lets everything else propagate unmodified.

use crate::domain::ports::{ProcessExecutorRef, Volume};
use crate::error::{Error, Result};
use crate::volume::listing::{parse_volume_info, VolumeListing};
use tracing::{debug, info, warn};

const MISSING_VOLUME_SUFFIX: &str = "does not exist";
const ALREADY_EXISTS: &str = "already exists";
const ALREADY_STARTED: &str = "already started";

/// Client for the gluster CLI
pub struct GlusterCli {
    path: String,
    executor: ProcessExecutorRef,
}

impl GlusterCli {
    pub fn new(path: impl Into<String>, executor: ProcessExecutorRef) -> Self {
        Self {
            path: path.into(),
            executor,
        }
    }

    /// Run the CLI; non-zero exit is a [`Error::BackendCommand`] carrying stderr
    pub async fn call(&self, args: &[String]) -> Result<String> {
        let output = self.executor.run(&self.path, args).await?;

        if !output.success() {
            let reason = if output.stderr.trim().is_empty() {
                output.stdout.trim()
            } else {
                output.stderr.trim()
            };
            return Err(Error::backend(command_name(args), reason));
        }

        Ok(output.stdout)
    }

    /// All volumes known to the backend
    pub async fn volumes(&self) -> Result<VolumeListing> {
        let out = self.call(&args(&["volume", "info"])).await?;
        Ok(parse_volume_info(&out))
    }

    /// One volume, or `None` if the backend says it does not exist
    pub async fn volume(&self, name: &str) -> Result<Option<Volume>> {
        match self.call(&args(&["volume", "info", name])).await {
            Ok(out) => {
                let mut volumes = parse_volume_info(&out);
                let volume = volumes.shift_remove(name);
                if volume.is_none() {
                    debug!("Listing for {} did not mention it", name);
                }
                Ok(volume)
            }
            Err(Error::BackendCommand { reason, .. }) if is_missing_volume(&reason) => {
                debug!("Volume {} does not exist", name);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Issue `volume create` with a prepared argument list
    pub async fn create_volume(&self, create_args: &[String]) -> Result<()> {
        info!("[gluster] {}", create_args.join(" "));

        match self.call(create_args).await {
            Ok(_) => Ok(()),
            Err(Error::BackendCommand { reason, .. }) if reason.contains(ALREADY_EXISTS) => {
                warn!("Volume create reported existing volume: {}", reason);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Issue `volume start`
    pub async fn start_volume(&self, name: &str) -> Result<()> {
        info!("[gluster] volume start {}", name);

        match self.call(&args(&["volume", "start", name])).await {
            Ok(_) => Ok(()),
            Err(Error::BackendCommand { reason, .. }) if reason.contains(ALREADY_STARTED) => {
                warn!("Volume {} was already started", name);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

fn args(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

fn command_name(args: &[String]) -> String {
    args.iter().take(2).cloned().collect::<Vec<_>>().join(" ")
}

fn is_missing_volume(reason: &str) -> bool {
    reason.trim_end().ends_with(MISSING_VOLUME_SUFFIX)
}
