//! Xylem - Storage and Database Provisioning for Container Workloads
//!
//! Provisions per-tenant GlusterFS volumes and PostgreSQL databases on
//! behalf of a job-dispatch framework. Both workflows are idempotent: asking
//! for a resource that already exists returns its current descriptor.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                 REST API  (/v1/commands/{command})                   │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │                 Orchestrator (command router, metrics)               │
//! │   create_volume          create_directories        create_database   │
//! │        │                        │                        │           │
//! │  ┌─────┴────────────┐   ┌───────┴────────┐   ┌───────────┴────────┐  │
//! │  │ Volume           │──▶│ Directory      │   │ Database           │  │
//! │  │ Provisioner      │   │ Worker         │   │ Provisioner        │  │
//! │  └─────┬────────────┘   └────────────────┘   └──┬──────────┬──────┘  │
//! │        │ fan-out via JobDispatcher              │          │         │
//! ├────────┼────────────────────────────────────────┼──────────┼─────────┤
//! │   gluster CLI                            registry table  tenant      │
//! │   (ProcessExecutor)                      (sqlx)          servers     │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`volume`]: Gluster volume provisioning and the brick directory worker
//! - [`database`]: PostgreSQL database provisioning and credential storage
//! - [`controlplane`]: Command router, local job dispatcher and REST API
//! - [`sync`]: Marathon group sync
//! - [`domain`]: Core domain types and ports
//! - [`config`]: YAML configuration
//! - [`error`]: Error types and handling

pub mod config;
pub mod controlplane;
pub mod database;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod sync;
pub mod volume;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use config::XylemConfig;

pub use controlplane::{
    ApiServer, ApiServerConfig, Command, CommandOutput, LocalDispatcher, Orchestrator,
};

pub use database::{CredentialCipher, DatabaseProvisioner};

pub use domain::ports::{
    ClusterMember, DatabaseDescriptor, DirectoryReport, JobDispatcher, ProcessExecutor, Volume,
};

pub use error::{Error, ErrorKind, Result};

pub use sync::MarathonSync;

pub use volume::{parse_volume_info, DirectoryWorker, VolumeProvisioner};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
