//! Shared Volume Provisioning
//!
//! GlusterFS volumes whose bricks live under `<mount>/xylem-<name>` on every
//! configured node.

pub mod gluster;
pub mod layout;
pub mod listing;
pub mod process;
pub mod provisioner;
pub mod worker;

pub use gluster::GlusterCli;
pub use layout::{brick_path, brick_targets, create_args, validate_volume_name};
pub use listing::{parse_volume_info, VolumeListing};
pub use process::TokioProcessExecutor;
pub use provisioner::{VolumeProvisioner, DEFAULT_FANOUT_TIMEOUT};
pub use worker::{CreateDirectories, DirectoryWorker, CREATE_DIRECTORIES_JOB};
