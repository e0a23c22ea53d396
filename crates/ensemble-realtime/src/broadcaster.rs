//! Observer set and command handling for the realtime channel.
//!
//! Each observer is an id plus an unbounded outbound queue. Sends never block
//! on a slow observer. A queue whose receiver has gone away is pruned the next
//! time a broadcast touches it.

use std::collections::HashMap;
use std::sync::Arc;

use ensemble_core::Result;
use ensemble_runtime::{Dataset, HealthMonitor, HealthReport, ModelRegistry, Orchestration, Orchestrator};
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::events::{ClientCommand, PredictionRecord, ServerEvent};
use crate::history::HistoryBuffer;

pub type ObserverId = Uuid;

pub struct Broadcaster {
    orchestrator: Arc<Orchestrator>,
    health: Arc<HealthMonitor>,
    history: Arc<HistoryBuffer>,
    observers: RwLock<HashMap<ObserverId, mpsc::UnboundedSender<ServerEvent>>>,
}

impl Broadcaster {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        health: Arc<HealthMonitor>,
        history: Arc<HistoryBuffer>,
    ) -> Self {
        Self {
            orchestrator,
            health,
            history,
            observers: RwLock::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        self.orchestrator.registry()
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    pub fn health(&self) -> &Arc<HealthMonitor> {
        &self.health
    }

    pub fn history(&self) -> &Arc<HistoryBuffer> {
        &self.history
    }

    // ---------------------------------------------------------------
    // Observer set
    // ---------------------------------------------------------------

    /// Register a new observer. Its queue already holds the current status
    /// map and prediction history.
    ///
    /// The snapshot is taken under the observer write lock, so any broadcast
    /// that misses it is queued after it.
    pub fn connect(&self) -> (ObserverId, mpsc::UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();

        let count = {
            let mut observers = self.observers.write();
            let _ = tx.send(ServerEvent::HealthUpdate(self.health.statuses()));
            let _ = tx.send(ServerEvent::PredictionHistory(self.history.snapshot()));
            observers.insert(id, tx);
            observers.len()
        };
        info!("Observer {} connected ({} active)", id, count);
        (id, rx)
    }

    pub fn disconnect(&self, id: &ObserverId) {
        if self.observers.write().remove(id).is_some() {
            info!("Observer {} disconnected", id);
        }
    }

    pub fn observer_count(&self) -> usize {
        self.observers.read().len()
    }

    /// Send to every observer, pruning closed queues.
    pub fn broadcast(&self, event: ServerEvent) {
        let closed: Vec<ObserverId> = {
            let observers = self.observers.read();
            observers
                .iter()
                .filter(|(_, tx)| tx.send(event.clone()).is_err())
                .map(|(id, _)| *id)
                .collect()
        };

        if !closed.is_empty() {
            let mut observers = self.observers.write();
            for id in &closed {
                observers.remove(id);
            }
            debug!("Pruned {} closed observers", closed.len());
        }
        debug!("Broadcast {} event", event.name());
    }

    /// Send to one observer. Returns false when it is gone.
    pub fn send_to(&self, id: &ObserverId, event: ServerEvent) -> bool {
        let sent = self
            .observers
            .read()
            .get(id)
            .map(|tx| tx.send(event).is_ok())
            .unwrap_or(false);
        if !sent {
            self.disconnect(id);
        }
        sent
    }

    // ---------------------------------------------------------------
    // Shared actions
    // ---------------------------------------------------------------

    /// Run a prediction, record it and announce it to every observer.
    pub async fn predict(&self, dataset: &Dataset) -> Result<Orchestration> {
        let outcome = self.orchestrator.orchestrate(dataset).await?;

        let record = PredictionRecord::new(outcome.clone());
        self.history.push(record.clone());
        self.broadcast(ServerEvent::NewPrediction(record));
        Ok(outcome)
    }

    /// Run one health cycle and push the status map to every observer.
    pub async fn refresh_health(&self) -> HealthReport {
        let report = self.health.check_all().await;
        self.broadcast(ServerEvent::HealthUpdate(self.health.statuses()));
        report
    }

    /// Announce the registry's enabled flags to every observer.
    pub fn publish_config(&self) {
        self.broadcast(ServerEvent::ConfigUpdate {
            models: self.registry().enabled_states(),
        });
    }

    // ---------------------------------------------------------------
    // Inbound commands
    // ---------------------------------------------------------------

    /// Handle one command from `id`. Failures go back to that observer only.
    pub async fn handle(&self, id: ObserverId, command: ClientCommand) {
        if let Err(e) = self.execute(&id, command).await {
            warn!("Observer {} command failed: {}", id, e);
            self.send_to(
                &id,
                ServerEvent::Error {
                    message: e.to_string(),
                },
            );
        }
    }

    async fn execute(&self, id: &ObserverId, command: ClientCommand) -> Result<()> {
        match command {
            ClientCommand::RequestHealth => {
                self.health.check_all().await;
                self.send_to(id, ServerEvent::HealthUpdate(self.health.statuses()));
            }
            ClientCommand::RunPrediction(body) => {
                let dataset = Dataset::from_value(body)?;
                dataset.validate()?;
                let outcome = self.predict(&dataset).await?;
                self.send_to(id, ServerEvent::PredictionResult(outcome));
            }
            ClientCommand::ToggleModel(request) => {
                self.registry().set_enabled(&request.key, request.enabled)?;
                self.publish_config();
                let message = format!(
                    "Model {} {}",
                    request.key,
                    if request.enabled { "enabled" } else { "disabled" }
                );
                self.send_to(id, ServerEvent::Success { message });
            }
        }
        Ok(())
    }
}
