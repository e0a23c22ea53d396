//! Ensemble Core: error type and gateway configuration shared by every crate.

pub mod config;
pub mod error;

pub use config::{EndpointSeed, GatewayConfig};
pub use error::{Error, Result};
