//! Control Plane Module
//!
//! The command router, the job dispatchers and the REST API that
//! fronts them.

pub mod api;
pub mod dispatch;
pub mod orchestrator;

pub use api::*;
pub use dispatch::{HttpDispatcher, LocalDispatcher};
pub use orchestrator::*;
