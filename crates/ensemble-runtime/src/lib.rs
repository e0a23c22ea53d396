//! Ensemble runtime: fans datasets out to remote classifiers and reduces
//! their answers to a single decision.
//!
//! The [`ModelRegistry`] is the source of truth for endpoints. The
//! [`Orchestrator`] dispatches predict/train calls concurrently, the
//! [`VotingEngine`] reduces outcomes, and the [`HealthMonitor`] keeps a
//! per-endpoint status map in step with the registry.

pub mod dataset;
pub mod health;
pub mod orchestrator;
pub mod registry;
pub mod test_utils;
pub mod transport;
pub mod types;
pub mod voting;

pub use dataset::{parse_sensor_files, Dataset, Discharge, SensorFile, Signal};
pub use health::HealthMonitor;
pub use orchestrator::Orchestrator;
pub use registry::ModelRegistry;
pub use transport::{HttpTransport, ModelTransport};
pub use types::*;
pub use voting::{vote, VotingEngine};
