//! Directory Fan-out Worker
//!
//! Runs on every cluster member before a volume is created and makes sure
//! each local mount has the volume's brick directory.

use crate::config::GlusterConfig;
use crate::domain::ports::{DirectoryReport, JobHandler};
use crate::volume::layout::{brick_path, validate_volume_name};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Job name the provisioner dispatches to cluster members
pub const CREATE_DIRECTORIES_JOB: &str = "create_directories";

/// Payload of a [`CREATE_DIRECTORIES_JOB`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDirectories {
    pub name: String,
}

/// Creates brick directories on the local member
pub struct DirectoryWorker {
    mounts: Vec<PathBuf>,
}

impl DirectoryWorker {
    pub fn new(config: &GlusterConfig) -> Self {
        Self {
            mounts: config.mounts.clone(),
        }
    }

    /// Create `<mount>/xylem-<name>` on every mount
    ///
    /// Never fails: errors other than "already exists" are reported in the
    /// returned [`DirectoryReport`].
    pub async fn create_directories(&self, name: &str) -> DirectoryReport {
        if let Err(e) = validate_volume_name(name) {
            return DirectoryReport::failed(e.to_string());
        }

        for mount in &self.mounts {
            let path = brick_path(mount, name);
            match tokio::fs::create_dir_all(&path).await {
                Ok(()) => debug!("Brick directory ready: {}", path.display()),
                Err(e) if e.kind() == ErrorKind::AlreadyExists && is_dir(&path).await => {
                    debug!("Brick directory already exists: {}", path.display())
                }
                Err(e) => {
                    warn!("Cannot create {}: {}", path.display(), e);
                    return DirectoryReport::failed(format!("{}: {}", path.display(), e));
                }
            }
        }

        DirectoryReport::ok()
    }
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
}

#[async_trait]
impl JobHandler for DirectoryWorker {
    async fn handle_job(&self, job: &str, payload: serde_json::Value) -> serde_json::Value {
        let report = if job != CREATE_DIRECTORIES_JOB {
            DirectoryReport::failed(format!("unknown job: {}", job))
        } else {
            match serde_json::from_value::<CreateDirectories>(payload) {
                Ok(args) => self.create_directories(&args.name).await,
                Err(e) => DirectoryReport::failed(format!("invalid payload: {}", e)),
            }
        };

        serde_json::to_value(report)
            .unwrap_or_else(|e| serde_json::json!({ "error": e.to_string() }))
    }
}
