//! Credential Generation and Name Rules

use crate::error::{Error, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use once_cell::sync::Lazy;
use rand::RngCore;
use regex::Regex;
use sha2::{Digest, Sha256};

/// Length of generated passwords
pub const PASSWORD_LEN: usize = 24;

/// PostgreSQL truncates identifiers beyond this
pub const MAX_DATABASE_NAME_LEN: usize = 63;

static DATABASE_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]+$").unwrap());

/// Reject anything but plain alphanumeric names
pub fn validate_database_name(name: &str) -> Result<()> {
    if name.len() > MAX_DATABASE_NAME_LEN || !DATABASE_NAME.is_match(name) {
        return Err(Error::Validation("Database name must be alphanumeric".into()));
    }
    Ok(())
}

/// Fresh role name from the clock plus a random suffix
pub fn generate_username() -> String {
    format!(
        "xylem{:x}{:08x}",
        chrono::Utc::now().timestamp_millis(),
        rand::random::<u32>()
    )
}

/// Fresh password: base64 of a hash of random bytes, truncated
pub fn generate_password() -> String {
    let mut seed = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut seed);

    let mut encoded = STANDARD.encode(Sha256::digest(seed));
    encoded.truncate(PASSWORD_LEN);
    encoded
}
