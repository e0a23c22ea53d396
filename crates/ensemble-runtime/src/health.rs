//! Health monitor: probes endpoints and keeps the status map in step with
//! the registry.
//!
//! Cycles may overlap (the periodic loop and on-demand requests). Each cycle
//! is numbered when it starts and a cycle older than the last one applied
//! never overwrites the map.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::registry::ModelRegistry;
use crate::transport::ModelTransport;
use crate::types::{HealthReport, HealthState, ModelEndpoint, ModelHealth, ModelStatus, StatusMap};

pub struct HealthMonitor {
    registry: Arc<ModelRegistry>,
    transport: Arc<dyn ModelTransport>,
    timeout: Duration,
    cycles: AtomicU64,
    statuses: RwLock<StatusTable>,
}

struct StatusTable {
    map: StatusMap,
    /// Number of the newest cycle written into `map`.
    applied: u64,
}

impl HealthMonitor {
    pub fn new(
        registry: Arc<ModelRegistry>,
        transport: Arc<dyn ModelTransport>,
        timeout: Duration,
    ) -> Self {
        let statuses = registry
            .keys()
            .into_iter()
            .map(|k| (k, ModelStatus::unknown()))
            .collect();
        Self {
            registry,
            transport,
            timeout,
            cycles: AtomicU64::new(0),
            statuses: RwLock::new(StatusTable {
                map: statuses,
                applied: 0,
            }),
        }
    }

    /// Snapshot of the status map.
    pub fn statuses(&self) -> StatusMap {
        self.statuses.read().map.clone()
    }

    /// Drop statuses of removed endpoints and seed new ones as `unknown`.
    pub fn resync(&self) {
        let keys = self.registry.key_set();
        let mut table = self.statuses.write();
        table.map.retain(|k, _| keys.contains(k));
        for key in keys {
            table.map.entry(key).or_insert_with(ModelStatus::unknown);
        }
    }

    /// Probe one endpoint. Disabled endpoints are reported without a call.
    pub async fn probe(&self, endpoint: &ModelEndpoint) -> ModelHealth {
        if !endpoint.enabled {
            return ModelHealth {
                model: endpoint.key.clone(),
                status: HealthState::Disabled,
                available: false,
                details: None,
                error: None,
            };
        }

        let call = self.transport.get_json(&endpoint.health_url, self.timeout);
        let outcome = match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(_) => Err(format!("timeout of {}ms exceeded", self.timeout.as_millis())),
        };

        match outcome {
            Ok(details) => ModelHealth {
                model: endpoint.key.clone(),
                status: HealthState::Online,
                available: true,
                details: Some(details),
                error: None,
            },
            Err(error) => {
                warn!("Health check failed for {}: {}", endpoint.key, error);
                ModelHealth {
                    model: endpoint.key.clone(),
                    status: HealthState::Offline,
                    available: false,
                    details: None,
                    error: Some(error),
                }
            }
        }
    }

    /// Run one health cycle over every registered endpoint.
    pub async fn check_all(&self) -> HealthReport {
        self.resync();
        let cycle = self.cycles.fetch_add(1, Ordering::SeqCst) + 1;

        let endpoints = self.registry.get_all();
        debug!("Checking health of {} models", endpoints.len());
        let models = join_all(endpoints.iter().map(|e| self.probe(e))).await;

        let now = Utc::now();
        {
            let mut table = self.statuses.write();
            if cycle < table.applied {
                debug!("Discarding health cycle {} (cycle {} already applied)", cycle, table.applied);
            } else {
                table.applied = cycle;
                for health in &models {
                    // An endpoint removed mid-cycle stays removed
                    if let Some(status) = table.map.get_mut(&health.model) {
                        status.status = health.status;
                        status.last_check = Some(now);
                    }
                }
            }
        }

        let available_models = models.iter().filter(|m| m.available).count();
        info!(
            "Health check complete: {}/{} models available",
            available_models,
            models.len()
        );

        HealthReport {
            timestamp: now,
            models,
            available_models,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MockReply, MockTransport};
    use crate::types::EndpointUrls;
    use serde_json::json;

    fn urls(name: &str) -> EndpointUrls {
        EndpointUrls {
            predict_url: format!("http://{}/predict", name),
            train_url: format!("http://{}/train", name),
            health_url: format!("http://{}/health", name),
        }
    }

    fn setup(names: &[&str], transport: Arc<MockTransport>) -> (Arc<ModelRegistry>, HealthMonitor) {
        setup_with_timeout(names, transport, Duration::from_millis(100))
    }

    fn setup_with_timeout(
        names: &[&str],
        transport: Arc<MockTransport>,
        timeout: Duration,
    ) -> (Arc<ModelRegistry>, HealthMonitor) {
        let registry = Arc::new(ModelRegistry::new());
        for name in names {
            registry.add(name, urls(name)).unwrap();
        }
        let monitor = HealthMonitor::new(registry.clone(), transport, timeout);
        (registry, monitor)
    }

    #[tokio::test]
    async fn test_initial_statuses_are_unknown() {
        let (_, monitor) = setup(&["svm", "lstm"], Arc::new(MockTransport::new()));
        let statuses = monitor.statuses();
        assert_eq!(statuses.len(), 2);
        assert!(statuses.values().all(|s| s.status == HealthState::Unknown));
        assert!(statuses.values().all(|s| s.last_check.is_none()));
    }

    #[tokio::test]
    async fn test_online_and_offline() {
        let transport = Arc::new(
            MockTransport::new()
                .with("http://svm/health", MockReply::Json(json!({"status": "ok"})))
                .with("http://lstm/health", MockReply::Hang)
                .with("http://xgboost/health", MockReply::Fail("connect ECONNREFUSED".into())),
        );
        let (_, monitor) = setup(&["svm", "lstm", "xgboost"], transport);

        let report = monitor.check_all().await;
        assert_eq!(report.available_models, 1);
        assert!(!report.is_degraded());

        assert_eq!(report.models[0].status, HealthState::Online);
        assert_eq!(report.models[0].details, Some(json!({"status": "ok"})));
        assert_eq!(report.models[1].status, HealthState::Offline);
        assert_eq!(report.models[1].error.as_deref(), Some("timeout of 100ms exceeded"));
        assert_eq!(report.models[2].status, HealthState::Offline);

        let statuses = monitor.statuses();
        assert_eq!(statuses["svm"].status, HealthState::Online);
        assert_eq!(statuses["lstm"].status, HealthState::Offline);
        assert_eq!(statuses["lstm"].last_check, Some(report.timestamp));
    }

    #[tokio::test]
    async fn test_disabled_is_not_probed() {
        let transport = Arc::new(
            MockTransport::new().with("http://svm/health", MockReply::Json(json!({}))),
        );
        let (registry, monitor) = setup(&["svm"], transport.clone());
        registry.set_enabled("svm", false).unwrap();

        let report = monitor.check_all().await;
        assert_eq!(report.models[0].status, HealthState::Disabled);
        assert!(report.is_degraded());
        assert_eq!(monitor.statuses()["svm"].status, HealthState::Disabled);
        assert!(transport.calls().is_empty());

        // Re-enabled endpoints go back through a real probe
        registry.set_enabled("svm", true).unwrap();
        let report = monitor.check_all().await;
        assert_eq!(report.models[0].status, HealthState::Online);
        assert_eq!(transport.call_count("http://svm/health"), 1);
    }

    #[tokio::test]
    async fn test_status_map_follows_registry() {
        let transport = Arc::new(MockTransport::new());
        let (registry, monitor) = setup(&["svm", "lstm"], transport);

        registry.remove("lstm").unwrap();
        registry.add("Random Forest", urls("rf")).unwrap();
        monitor.resync();

        let statuses = monitor.statuses();
        assert!(!statuses.contains_key("lstm"));
        assert_eq!(statuses["random_forest"].status, HealthState::Unknown);

        let report = monitor.check_all().await;
        let keys: Vec<_> = report.models.iter().map(|m| m.model.as_str()).collect();
        assert_eq!(keys, vec!["svm", "random_forest"]);
        assert_eq!(monitor.statuses().len(), 2);
    }

    #[tokio::test]
    async fn test_checks_run_concurrently() {
        let delay = Duration::from_millis(150);
        let transport = Arc::new(
            MockTransport::new()
                .with("http://a/health", MockReply::Delayed(delay, json!({"status": "ok"})))
                .with("http://b/health", MockReply::Delayed(delay, json!({"status": "ok"})))
                .with("http://c/health", MockReply::Delayed(delay, json!({"status": "ok"}))),
        );
        let (_, monitor) = setup_with_timeout(&["a", "b", "c"], transport, Duration::from_secs(1));

        let start = std::time::Instant::now();
        let report = monitor.check_all().await;
        assert!(start.elapsed() < delay * 3);
        assert_eq!(report.available_models, 3);
    }

    #[tokio::test]
    async fn test_older_cycle_does_not_overwrite_newer() {
        let transport = Arc::new(MockTransport::new().with(
            "http://svm/health",
            MockReply::Delayed(Duration::from_millis(200), json!({"status": "ok"})),
        ));
        let (_, monitor) =
            setup_with_timeout(&["svm"], transport.clone(), Duration::from_secs(1));

        let slow = monitor.check_all();
        let fast = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            transport.set("http://svm/health", MockReply::Fail("connect ECONNREFUSED".into()));
            monitor.check_all().await
        };
        let (slow_report, fast_report) = tokio::join!(slow, fast);

        // Each cycle reports what it saw; only the newer one is kept
        assert_eq!(slow_report.models[0].status, HealthState::Online);
        assert_eq!(fast_report.models[0].status, HealthState::Offline);
        let statuses = monitor.statuses();
        assert_eq!(statuses["svm"].status, HealthState::Offline);
        assert_eq!(statuses["svm"].last_check, Some(fast_report.timestamp));
    }

    #[tokio::test]
    async fn test_report_serialization() {
        let transport = Arc::new(
            MockTransport::new().with("http://svm/health", MockReply::Json(json!({"up": true}))),
        );
        let (_, monitor) = setup(&["svm", "lstm"], transport);

        let value = serde_json::to_value(monitor.check_all().await).unwrap();
        assert!(value["timestamp"].is_string());
        assert_eq!(value["availableModels"], 1);
        assert_eq!(value["models"][0]["status"], "online");
        assert!(value["models"][0].get("error").is_none());
        assert_eq!(value["models"][1]["status"], "offline");
        assert!(value["models"][1]["error"].is_string());
    }
}
