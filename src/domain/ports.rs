//! Domain Ports - Core trait definitions for the provisioners
//!
//! These traits define the boundaries between the provisioning logic and the
//! systems it drives: the storage backend CLI, the job-dispatch transport,
//! the registry table and the tenant database servers. Adapters implement
//! them; tests substitute in-memory fakes.

use crate::config::DatabaseServer;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// Volume Types
// =============================================================================

/// A distributed volume as observed in a backend listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    /// Volume name
    pub name: String,
    /// Opaque backend-assigned id
    pub id: String,
    /// Whether the volume is started
    pub running: bool,
    /// Bricks as `node:path`, in listing order
    pub bricks: Vec<String>,
}

impl Volume {
    /// An observed volume with no attributes parsed yet
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: String::new(),
            running: false,
            bricks: Vec::new(),
        }
    }
}

/// Outcome of a directory fan-out job on one cluster member
///
/// Failures are reported in-band so the dispatcher can tell real failures
/// from transport problems.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryReport {
    pub error: Option<String>,
}

impl DirectoryReport {
    pub fn ok() -> Self {
        Self { error: None }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            error: Some(reason.into()),
        }
    }
}

// =============================================================================
// Database Types
// =============================================================================

/// A row of the registry table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseRecord {
    pub name: String,
    pub host: String,
    pub username: String,
    /// IV-prefixed, base64-encoded ciphertext
    pub password: String,
}

/// Connection details handed back to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseDescriptor {
    pub name: String,
    pub host: String,
    pub username: String,
    pub password: String,
}

// =============================================================================
// Process Executor Port
// =============================================================================

/// Captured result of a subprocess
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Port for running external programs
#[async_trait]
pub trait ProcessExecutor: Send + Sync {
    /// Run `path` with `args` and capture its output
    async fn run(&self, path: &str, args: &[String]) -> Result<ProcessOutput>;
}

// =============================================================================
// Job Dispatch Port
// =============================================================================

/// Identifier of a cluster member, supplied by the transport
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClusterMember(pub String);

impl ClusterMember {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ClusterMember {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ClusterMember {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ClusterMember {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Handle to a job fanned out to one or more members
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobHandle {
    pub id: String,
    pub job: String,
}

/// Port for the job-dispatch transport
#[async_trait]
pub trait JobDispatcher: Send + Sync {
    /// Current cluster members able to run jobs
    async fn members(&self) -> Result<Vec<ClusterMember>>;

    /// Queue `job` with `payload` on every member in `targets`
    async fn dispatch(
        &self,
        job: &str,
        payload: serde_json::Value,
        targets: &[ClusterMember],
    ) -> Result<JobHandle>;

    /// Wait for one member's result
    ///
    /// Returns [`crate::Error::FanoutTimeout`] if nothing arrives in `timeout`.
    async fn await_result(
        &self,
        handle: &JobHandle,
        member: &ClusterMember,
        timeout: Duration,
    ) -> Result<serde_json::Value>;
}

/// Port for the member-side body of a dispatched job
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Run `job`; failures are encoded in the returned payload
    async fn handle_job(&self, job: &str, payload: serde_json::Value) -> serde_json::Value;
}

// =============================================================================
// Database Ports
// =============================================================================

/// Port for the registry of provisioned databases
#[async_trait]
pub trait DatabaseRegistry: Send + Sync {
    /// Create the registry table if it does not exist
    async fn bootstrap(&self) -> Result<()>;

    /// Look up a record by database name
    async fn find(&self, name: &str) -> Result<Option<DatabaseRecord>>;

    /// Insert a new record
    ///
    /// Returns [`crate::Error::RegistryConflict`] if the name is taken.
    async fn insert(&self, record: &DatabaseRecord) -> Result<()>;
}

/// Port for opening admin sessions on tenant database servers
#[async_trait]
pub trait CatalogConnector: Send + Sync {
    async fn connect(&self, server: &DatabaseServer) -> Result<Box<dyn CatalogSession>>;
}

/// An admin session on one database server
#[async_trait]
pub trait CatalogSession: Send {
    /// Whether a database literally named `name` exists
    async fn database_exists(&mut self, name: &str) -> Result<bool>;

    async fn create_user(&mut self, username: &str, password: &str) -> Result<()>;

    /// Create `name` owned by `owner`
    ///
    /// Returns [`crate::Error::Conflict`] if the database already exists.
    async fn create_database(&mut self, name: &str, owner: &str) -> Result<()>;

    async fn drop_user(&mut self, username: &str) -> Result<()>;

    async fn drop_database(&mut self, name: &str) -> Result<()>;

    /// Release the session
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Policy choosing which server hosts a new database
pub trait ServerSelector: Send + Sync {
    fn select<'a>(&self, servers: &'a [DatabaseServer]) -> Option<&'a DatabaseServer>;
}

// =============================================================================
// Type Aliases for Arc'd Traits
// =============================================================================

pub type ProcessExecutorRef = Arc<dyn ProcessExecutor>;
pub type JobDispatcherRef = Arc<dyn JobDispatcher>;
pub type JobHandlerRef = Arc<dyn JobHandler>;
pub type DatabaseRegistryRef = Arc<dyn DatabaseRegistry>;
pub type CatalogConnectorRef = Arc<dyn CatalogConnector>;
pub type ServerSelectorRef = Arc<dyn ServerSelector>;
