//! Main Orchestrator - Command Router
//!
//! Owns the provisioners and routes the three inbound commands to them:
//! - `create_volume` to the volume provisioner
//! - `create_directories` to the local fan-out worker
//! - `create_database` to the database provisioner
//!
//! Every command is timed and counted, and its result shaped into the reply
//! payload callers expect.

use crate::config::{DispatchConfig, DispatchTransport, XylemConfig};
use crate::controlplane::dispatch::{HttpDispatcher, LocalDispatcher};
use crate::database::{DatabaseProvisioner, PgCatalogConnector, PgRegistry};
use crate::domain::ports::{DatabaseDescriptor, DirectoryReport, JobDispatcherRef, Volume};
use crate::error::{Error, Result};
use crate::metrics::{Metrics, OUTCOME_OK};
use crate::volume::{DirectoryWorker, GlusterCli, TokioProcessExecutor, VolumeProvisioner};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

// =============================================================================
// Commands
// =============================================================================

/// An inbound provisioning command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    CreateVolume { name: String },
    CreateDirectories { name: String },
    CreateDatabase { name: String },
}

impl Command {
    /// Build a command from its wire name and resource name
    pub fn from_parts(command: &str, name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        match command {
            "create_volume" => Ok(Command::CreateVolume { name }),
            "create_directories" => Ok(Command::CreateDirectories { name }),
            "create_database" => Ok(Command::CreateDatabase { name }),
            other => Err(Error::UnknownCommand(other.to_string())),
        }
    }

    /// Wire name
    pub fn name(&self) -> &'static str {
        match self {
            Command::CreateVolume { .. } => "create_volume",
            Command::CreateDirectories { .. } => "create_directories",
            Command::CreateDatabase { .. } => "create_database",
        }
    }

    /// Resource the command is about
    pub fn resource(&self) -> &str {
        match self {
            Command::CreateVolume { name }
            | Command::CreateDirectories { name }
            | Command::CreateDatabase { name } => name,
        }
    }
}

/// Result of a successful command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutput {
    Volume(Volume),
    Directories(DirectoryReport),
    Database(DatabaseDescriptor),
}

impl CommandOutput {
    /// Reply payload
    pub fn to_reply(&self) -> Value {
        match self {
            CommandOutput::Volume(v) => json!({
                "name": v.name,
                "id": v.id,
                "running": v.running,
                "bricks": v.bricks,
                "error": null,
            }),
            CommandOutput::Directories(report) => json!({ "error": report.error }),
            CommandOutput::Database(db) => json!({
                "name": db.name,
                "host": db.host,
                "username": db.username,
                "password": db.password,
                "error": null,
            }),
        }
    }
}

/// Reply payload for a failed command
pub fn error_reply(err: &Error) -> Value {
    json!({ "error": err.to_string(), "kind": err.kind() })
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Routes commands to the configured provisioners
pub struct Orchestrator {
    volumes: Option<VolumeProvisioner>,
    databases: Option<DatabaseProvisioner>,
    worker: Option<Arc<DirectoryWorker>>,
    metrics: Metrics,
    ready: AtomicBool,
}

impl Orchestrator {
    /// Create an orchestrator from already-built provisioners
    pub fn new(
        volumes: Option<VolumeProvisioner>,
        databases: Option<DatabaseProvisioner>,
        worker: Option<Arc<DirectoryWorker>>,
    ) -> Result<Arc<Self>> {
        Ok(Arc::new(Self {
            volumes,
            databases,
            worker,
            metrics: Metrics::new()?,
            ready: AtomicBool::new(false),
        }))
    }

    /// Wire the production adapters for every configured section
    pub fn from_config(config: &XylemConfig) -> Result<Arc<Self>> {
        let (volumes, worker) = match &config.gluster {
            Some(gluster) => {
                let worker = Arc::new(DirectoryWorker::new(gluster));
                let dispatcher = build_dispatcher(&config.dispatch, &worker)?;
                let executor = Arc::new(TokioProcessExecutor::new());
                let cli = GlusterCli::new(gluster.path.clone(), executor);
                let provisioner = VolumeProvisioner::new(gluster.clone(), cli, dispatcher)
                    .with_fanout_timeout(config.dispatch.fanout_timeout());
                info!(
                    "Volume provisioning enabled: {} nodes, {} mounts",
                    gluster.nodes.len(),
                    gluster.mounts.len()
                );
                (Some(provisioner), Some(worker))
            }
            None => (None, None),
        };

        let databases = config.postgres.as_ref().map(|postgres| {
            info!(
                "Database provisioning enabled: {} servers",
                postgres.servers.len()
            );
            DatabaseProvisioner::new(
                postgres,
                Arc::new(PgRegistry::new(&postgres.registry)),
                Arc::new(PgCatalogConnector::new()),
            )
        });

        Self::new(volumes, databases, worker)
    }

    /// Prepare backing stores; must complete before commands are served
    pub async fn initialize(&self) -> Result<()> {
        info!("Initializing orchestrator");

        if let Some(databases) = &self.databases {
            databases.initialize().await?;
            info!("Database registry ready");
        }

        self.ready.store(true, Ordering::Release);
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Run one command
    pub async fn handle(&self, command: Command) -> Result<CommandOutput> {
        let started = Instant::now();
        debug!("Handling {} {}", command.name(), command.resource());

        let result = self.route(&command).await;

        let outcome = match &result {
            Ok(_) => OUTCOME_OK.to_string(),
            Err(e) => {
                warn!("{} {} failed: {}", command.name(), command.resource(), e);
                e.kind().to_string()
            }
        };
        self.metrics.observe(command.name(), &outcome, started.elapsed());

        result
    }

    async fn route(&self, command: &Command) -> Result<CommandOutput> {
        match command {
            Command::CreateVolume { name } => {
                let volumes = self.volumes.as_ref().ok_or_else(|| not_configured("gluster"))?;
                volumes.ensure_volume(name).await.map(CommandOutput::Volume)
            }
            Command::CreateDirectories { name } => {
                let worker = self.worker.as_ref().ok_or_else(|| not_configured("gluster"))?;
                Ok(CommandOutput::Directories(worker.create_directories(name).await))
            }
            Command::CreateDatabase { name } => {
                let databases = self
                    .databases
                    .as_ref()
                    .ok_or_else(|| not_configured("postgres"))?;
                databases.ensure_database(name).await.map(CommandOutput::Database)
            }
        }
    }
}

fn build_dispatcher(
    config: &DispatchConfig,
    worker: &Arc<DirectoryWorker>,
) -> Result<JobDispatcherRef> {
    let members = config.members.iter().cloned();
    match config.transport {
        DispatchTransport::Local => Ok(Arc::new(LocalDispatcher::new(members, worker.clone()))),
        DispatchTransport::Http => {
            info!("Fan-out to {} peers over HTTP", config.members.len());
            Ok(Arc::new(HttpDispatcher::new(members)?))
        }
    }
}

fn not_configured(resource: &str) -> Error {
    Error::NotConfigured {
        resource: resource.to_string(),
    }
}
