//! Service Configuration
//!
//! Xylem is configured from a single YAML file. Each provisioner has its own
//! optional section; a command whose section is missing is rejected at
//! request time rather than at startup so nodes can run a subset of the
//! provisioners.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

// =============================================================================
// Top-level Configuration
// =============================================================================

/// Root of the configuration file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct XylemConfig {
    /// Job-dispatch settings
    #[serde(default)]
    pub dispatch: DispatchConfig,
    /// Shared volume provisioning
    #[serde(default)]
    pub gluster: Option<GlusterConfig>,
    /// Database provisioning
    #[serde(default)]
    pub postgres: Option<PostgresConfig>,
    /// Marathon group sync
    #[serde(default)]
    pub marathon: Option<MarathonConfig>,
}

impl XylemConfig {
    /// Load and validate a configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&raw)
    }

    /// Parse and validate configuration from YAML text
    pub fn from_yaml(raw: &str) -> Result<Self> {
        let config: XylemConfig = serde_yaml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.dispatch.fanout_timeout_secs == 0 {
            return Err(Error::Configuration(
                "dispatch.fanout_timeout_secs must be greater than zero".into(),
            ));
        }
        self.dispatch.validate()?;

        if let Some(gluster) = &self.gluster {
            if gluster.nodes.is_empty() {
                return Err(Error::Configuration("gluster.nodes must not be empty".into()));
            }
            if gluster.mounts.is_empty() {
                return Err(Error::Configuration("gluster.mounts must not be empty".into()));
            }
        }

        if let Some(postgres) = &self.postgres {
            if postgres.key.is_empty() {
                return Err(Error::Configuration("postgres.key must not be empty".into()));
            }
            if postgres.servers.is_empty() {
                return Err(Error::Configuration("postgres.servers must not be empty".into()));
            }
        }

        Ok(())
    }
}

// =============================================================================
// Dispatch Configuration
// =============================================================================

/// How fan-out jobs reach cluster members
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchTransport {
    /// Run jobs in this process; only valid for a single member
    #[default]
    Local,
    /// Post jobs to each member's REST API; members are base URLs
    Http,
}

/// Configuration for the job-dispatch transport
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub transport: DispatchTransport,
    /// Cluster members that run fan-out jobs
    pub members: Vec<String>,
    /// Per-member wait bound for fan-out results
    pub fanout_timeout_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            transport: DispatchTransport::Local,
            members: vec!["local".to_string()],
            fanout_timeout_secs: 60,
        }
    }
}

impl DispatchConfig {
    pub fn fanout_timeout(&self) -> Duration {
        Duration::from_secs(self.fanout_timeout_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.members.is_empty() {
            return Err(Error::Configuration("dispatch.members must not be empty".into()));
        }

        match self.transport {
            DispatchTransport::Local if self.members.len() > 1 => Err(Error::Configuration(
                "the local transport only reaches this host; use transport: http \
                 with peer URLs for more than one member"
                    .into(),
            )),
            DispatchTransport::Local => Ok(()),
            DispatchTransport::Http => {
                for member in &self.members {
                    let url = reqwest::Url::parse(member).map_err(|e| {
                        Error::Configuration(format!("Invalid peer URL {}: {}", member, e))
                    })?;
                    if !matches!(url.scheme(), "http" | "https") {
                        return Err(Error::Configuration(format!(
                            "Peer URL {} must use http or https",
                            member
                        )));
                    }
                }
                Ok(())
            }
        }
    }
}

// =============================================================================
// Gluster Configuration
// =============================================================================

/// Configuration for GlusterFS volume provisioning
#[derive(Debug, Clone, Deserialize)]
pub struct GlusterConfig {
    /// Path to the gluster CLI
    #[serde(default = "default_gluster_path")]
    pub path: String,
    /// Peers contributing bricks to every volume
    pub nodes: Vec<String>,
    /// Local mount points holding brick directories
    #[serde(default = "default_gluster_mounts")]
    pub mounts: Vec<PathBuf>,
    /// Replica count passed to `volume create`
    #[serde(default)]
    pub replica: Option<u32>,
    /// Stripe count passed to `volume create`
    #[serde(default)]
    pub stripe: Option<u32>,
}

fn default_gluster_path() -> String {
    "/usr/sbin/gluster".to_string()
}

fn default_gluster_mounts() -> Vec<PathBuf> {
    vec![PathBuf::from("/data")]
}

impl Default for GlusterConfig {
    fn default() -> Self {
        Self {
            path: default_gluster_path(),
            nodes: Vec::new(),
            mounts: default_gluster_mounts(),
            replica: None,
            stripe: None,
        }
    }
}

// =============================================================================
// Postgres Configuration
// =============================================================================

/// Configuration for database provisioning
#[derive(Clone, Deserialize)]
pub struct PostgresConfig {
    /// Secret the credential cipher key is derived from
    pub key: String,
    /// Pool of servers new databases are placed on
    pub servers: Vec<DatabaseServer>,
    /// Where the registry table lives
    #[serde(default)]
    pub registry: RegistryDbConfig,
}

impl std::fmt::Debug for PostgresConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresConfig")
            .field("key", &"<redacted>")
            .field("servers", &self.servers)
            .field("registry", &self.registry)
            .finish()
    }
}

/// A tenant database server and its admin credentials
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct DatabaseServer {
    /// Name reported to clients and stored in the registry
    pub hostname: String,
    /// Address to connect to, if different from `hostname`
    #[serde(default)]
    pub connect_addr: Option<String>,
    #[serde(default = "default_pg_port")]
    pub port: u16,
    #[serde(default = "default_pg_username")]
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
}

impl DatabaseServer {
    /// A server reached at `hostname` with default admin credentials
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            connect_addr: None,
            port: default_pg_port(),
            username: default_pg_username(),
            password: None,
        }
    }

    /// Address used to open connections
    pub fn connect_host(&self) -> &str {
        self.connect_addr.as_deref().unwrap_or(&self.hostname)
    }
}

impl std::fmt::Debug for DatabaseServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseServer")
            .field("hostname", &self.hostname)
            .field("connect_addr", &self.connect_addr)
            .field("port", &self.port)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Connection parameters for the registry database
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct RegistryDbConfig {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl Default for RegistryDbConfig {
    fn default() -> Self {
        Self {
            name: "xylem".to_string(),
            host: "localhost".to_string(),
            port: default_pg_port(),
            username: default_pg_username(),
            password: String::new(),
        }
    }
}

impl std::fmt::Debug for RegistryDbConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryDbConfig")
            .field("name", &self.name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

fn default_pg_port() -> u16 {
    5432
}

fn default_pg_username() -> String {
    "postgres".to_string()
}

// =============================================================================
// Marathon Configuration
// =============================================================================

/// Configuration for pushing app groups to Marathon
#[derive(Debug, Clone, Deserialize)]
pub struct MarathonConfig {
    #[serde(default = "default_marathon_host")]
    pub host: String,
    #[serde(default = "default_marathon_port")]
    pub port: u16,
    /// Group definition files; glob patterns are expanded on every run
    pub group_json_files: Vec<String>,
    /// Seconds between pushes
    #[serde(default = "default_marathon_interval")]
    pub interval_secs: u64,
}

fn default_marathon_host() -> String {
    "localhost".to_string()
}

fn default_marathon_port() -> u16 {
    8080
}

fn default_marathon_interval() -> u64 {
    60
}

impl MarathonConfig {
    /// Base URL of the Marathon API
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}
