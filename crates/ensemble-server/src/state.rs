//! Shared application state.

use std::sync::Arc;

use ensemble_core::{GatewayConfig, Result};
use ensemble_realtime::{Broadcaster, HistoryBuffer};
use ensemble_runtime::{HealthMonitor, ModelRegistry, ModelTransport, Orchestrator};

/// Shared application state accessible from all route handlers.
pub struct AppState {
    pub config: GatewayConfig,
    pub registry: Arc<ModelRegistry>,
    pub orchestrator: Arc<Orchestrator>,
    pub health: Arc<HealthMonitor>,
    pub history: Arc<HistoryBuffer>,
    pub broadcaster: Arc<Broadcaster>,
}

impl AppState {
    /// Build state with the registry seeded from configuration.
    pub fn new(config: GatewayConfig, transport: Arc<dyn ModelTransport>) -> Result<Self> {
        let registry = Arc::new(ModelRegistry::from_seeds(&config.seed_models)?);
        Ok(Self::with_registry(config, registry, transport))
    }

    pub fn with_registry(
        config: GatewayConfig,
        registry: Arc<ModelRegistry>,
        transport: Arc<dyn ModelTransport>,
    ) -> Self {
        let orchestrator = Arc::new(Orchestrator::new(
            registry.clone(),
            transport.clone(),
            config.model_timeout,
            config.training_timeout,
        ));
        // Probes share the predict timeout
        let health = Arc::new(HealthMonitor::new(
            registry.clone(),
            transport,
            config.model_timeout,
        ));
        let history = Arc::new(HistoryBuffer::new(config.history_capacity));
        let broadcaster = Arc::new(Broadcaster::new(
            orchestrator.clone(),
            health.clone(),
            history.clone(),
        ));

        Self {
            config,
            registry,
            orchestrator,
            health,
            history,
            broadcaster,
        }
    }
}
