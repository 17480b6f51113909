//! API Module
//!
//! REST API for the provisioning commands, health and metrics.

pub mod rest;
pub mod server;

pub use rest::*;
pub use server::*;
