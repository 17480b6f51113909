//! Periodic Configuration Push
//!
//! Background jobs that keep third-party orchestrators in line with files
//! on this host.

pub mod marathon;

pub use marathon::{MarathonSync, SyncReport};
