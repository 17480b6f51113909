//! Brick Layout
//!
//! Brick paths are a pure function of the configuration and the volume name,
//! so the fan-out worker, the provisioner and tests all predict the same
//! layout without asking the backend.

use crate::config::GlusterConfig;
use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};

/// Prefix of every per-volume brick directory
pub const BRICK_DIR_PREFIX: &str = "xylem-";

/// Longest accepted volume name
pub const MAX_VOLUME_NAME_LEN: usize = 64;

static VOLUME_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").unwrap());

/// Reject names that are unsafe as a path component
pub fn validate_volume_name(name: &str) -> Result<()> {
    if name.len() > MAX_VOLUME_NAME_LEN || !VOLUME_NAME.is_match(name) {
        return Err(Error::Validation(
            "Volume name must be alphanumeric (dashes and underscores allowed)".into(),
        ));
    }
    Ok(())
}

/// Directory holding `name`'s brick under `mount`
pub fn brick_path(mount: &Path, name: &str) -> PathBuf {
    mount.join(format!("{}{}", BRICK_DIR_PREFIX, name))
}

/// `node:path` targets, mounts outermost, nodes innermost
pub fn brick_targets(config: &GlusterConfig, name: &str) -> Vec<String> {
    let mut bricks = Vec::with_capacity(config.mounts.len() * config.nodes.len());
    for mount in &config.mounts {
        let path = brick_path(mount, name);
        for node in &config.nodes {
            bricks.push(format!("{}:{}", node, path.display()));
        }
    }
    bricks
}

/// Argument list for `gluster volume create`
pub fn create_args(config: &GlusterConfig, name: &str) -> Vec<String> {
    let mut args = vec!["volume".to_string(), "create".to_string(), name.to_string()];

    if let Some(stripe) = config.stripe {
        args.push("stripe".to_string());
        args.push(stripe.to_string());
    }

    if let Some(replica) = config.replica {
        args.push("replica".to_string());
        args.push(replica.to_string());
    }

    args.extend(brick_targets(config, name));
    args.push("force".to_string());
    args
}
