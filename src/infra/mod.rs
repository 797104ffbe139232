//! Infrastructure adapters: edge purging, telemetry bootstrap.

pub mod edge;
pub mod error;
pub mod telemetry;

pub use edge::{CdnPurger, EdgeCache};
pub use error::InfraError;
