//! Orchestrator: fans a dataset out to every enabled model and votes.

use std::sync::Arc;
use std::time::Duration;

use ensemble_core::{Error, Result};
use futures::future::join_all;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::dataset::Dataset;
use crate::registry::ModelRegistry;
use crate::transport::ModelTransport;
use crate::types::{ModelOutcome, Orchestration, OutcomeStatus, TrainingSummary, UrlKind};
use crate::voting::VotingEngine;

/// Dispatches predict and train calls across the registry's enabled models.
pub struct Orchestrator {
    registry: Arc<ModelRegistry>,
    transport: Arc<dyn ModelTransport>,
    voting: VotingEngine,
    model_timeout: Duration,
    training_timeout: Duration,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<ModelRegistry>,
        transport: Arc<dyn ModelTransport>,
        model_timeout: Duration,
        training_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            transport,
            voting: VotingEngine::default(),
            model_timeout,
            training_timeout,
        }
    }

    /// Replace the voting policy.
    pub fn with_voting(mut self, voting: VotingEngine) -> Self {
        self.voting = voting;
        self
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    pub fn model_timeout(&self) -> Duration {
        self.model_timeout
    }

    /// Send a prediction request to one model. Never fails: every problem
    /// becomes an error outcome.
    pub async fn call_model(&self, key: &str, payload: &Value) -> ModelOutcome {
        self.dispatch(key, payload, UrlKind::Predict).await
    }

    /// Send training data to one model. Never fails, like [`Self::call_model`].
    pub async fn train_model(&self, key: &str, payload: &Value) -> ModelOutcome {
        self.dispatch(key, payload, UrlKind::Train).await
    }

    /// Predict with every enabled model and reduce the answers by vote.
    pub async fn orchestrate(&self, dataset: &Dataset) -> Result<Orchestration> {
        info!("Starting orchestration process");
        let (keys, payload) = self.prepare(dataset, "prediction")?;

        let models = join_all(keys.iter().map(|key| self.call_model(key, &payload))).await;
        let voting = self.voting.vote(&models);

        info!("Voting result: {}", voting.message);
        Ok(Orchestration { models, voting })
    }

    /// Send training data to every enabled model.
    pub async fn train_models(&self, dataset: &Dataset) -> Result<TrainingSummary> {
        info!("Starting training process for all models");
        let (keys, payload) = self.prepare(dataset, "training")?;

        let details = join_all(keys.iter().map(|key| self.train_model(key, &payload))).await;
        let successful = details
            .iter()
            .filter(|o| o.status == OutcomeStatus::Success)
            .count();
        let failed = details.len() - successful;

        info!(
            "Training completed: {} successful, {} failed",
            successful, failed
        );
        Ok(TrainingSummary {
            successful,
            failed,
            details,
        })
    }

    /// Shape check, enabled-key resolution and payload encoding shared by
    /// both fan-outs.
    fn prepare(&self, dataset: &Dataset, purpose: &str) -> Result<(Vec<String>, Value)> {
        if dataset.is_empty() {
            error!("Invalid dataset: no entries in {}", dataset.kind());
            return Err(Error::InvalidFormat(format!(
                "expected at least one entry in {}",
                dataset.kind()
            )));
        }
        info!("Processing {} with {} {}", purpose, dataset.len(), dataset.kind());

        let keys = self.registry.list_enabled();
        if keys.is_empty() {
            error!("No models are enabled");
            return Err(Error::NoModelsAvailable(purpose.to_string()));
        }
        info!("Enabled models for {}: {}", purpose, keys.join(", "));

        Ok((keys, dataset.to_payload()?))
    }

    async fn dispatch(&self, key: &str, payload: &Value, kind: UrlKind) -> ModelOutcome {
        // Re-read: the endpoint may have been removed or disabled since the
        // key list was resolved.
        let endpoint = match self.registry.get(key) {
            Ok(e) if e.enabled => e,
            _ => {
                warn!("Model {} is not enabled or does not exist", key);
                return ModelOutcome::failure(key, format!("Model {} is not available", key));
            }
        };

        let timeout = match kind {
            UrlKind::Train => self.training_timeout,
            _ => self.model_timeout,
        };
        let url = endpoint.url(kind);
        info!("Sending {} request to {} model at {}", kind, key, url);

        let call = self.transport.post_json(url, payload, timeout);
        match tokio::time::timeout(timeout, call).await {
            Ok(Ok(result)) => {
                info!("Received {} response from {} model", kind, key);
                ModelOutcome::success(key, result)
            }
            Ok(Err(e)) => {
                error!("Error calling {} model ({}): {}", key, kind, e);
                ModelOutcome::failure(key, upstream_message(e))
            }
            Err(_) => {
                error!("Model {} timed out after {}ms ({})", key, timeout.as_millis(), kind);
                ModelOutcome::failure(key, format!("timeout of {}ms exceeded", timeout.as_millis()))
            }
        }
    }
}

fn upstream_message(err: Error) -> String {
    match err {
        Error::Upstream(message) => message,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MockReply, MockTransport};
    use crate::types::{ClassLabel, EndpointUrls};
    use serde_json::json;

    fn urls(name: &str) -> EndpointUrls {
        EndpointUrls {
            predict_url: format!("http://{}/predict", name),
            train_url: format!("http://{}/train", name),
            health_url: format!("http://{}/health", name),
        }
    }

    fn registry(names: &[&str]) -> Arc<ModelRegistry> {
        let registry = ModelRegistry::new();
        for name in names {
            registry.add(name, urls(name)).unwrap();
        }
        Arc::new(registry)
    }

    fn orchestrator(registry: Arc<ModelRegistry>, transport: Arc<MockTransport>) -> Orchestrator {
        Orchestrator::new(
            registry,
            transport,
            Duration::from_millis(200),
            Duration::from_millis(400),
        )
    }

    fn dataset() -> Dataset {
        Dataset::from_value(json!({
            "discharges": [{
                "id": "D-1",
                "times": [0.0, 1.0],
                "signals": [{"fileName": "a.txt", "values": [1.0, 2.0]}]
            }]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_majority_of_three() {
        let transport = Arc::new(
            MockTransport::new()
                .with("http://svm/predict", MockReply::Json(json!({"prediction": 1, "confidence": 0.9})))
                .with("http://lstm/predict", MockReply::Json(json!({"prediction": 1, "confidence": 0.9})))
                .with("http://xgboost/predict", MockReply::Json(json!({"prediction": 0, "confidence": 0.5}))),
        );
        let orch = orchestrator(registry(&["svm", "lstm", "xgboost"]), transport);

        let result = orch.orchestrate(&dataset()).await.unwrap();
        assert_eq!(result.voting.decision, Some(ClassLabel::Int(1)));
        assert!((result.voting.confidence - 0.9).abs() < 1e-12);
        assert_eq!(result.voting.votes[&ClassLabel::Int(0)], 1);
        assert_eq!(result.voting.votes[&ClassLabel::Int(1)], 2);

        let names: Vec<_> = result.models.iter().map(|m| m.model_name.as_str()).collect();
        assert_eq!(names, vec!["svm", "lstm", "xgboost"]);
    }

    #[tokio::test]
    async fn test_split_vote_is_a_tie() {
        let transport = Arc::new(
            MockTransport::new()
                .with("http://svm/predict", MockReply::Json(json!({"prediction": 1})))
                .with("http://lstm/predict", MockReply::Json(json!({"prediction": 0}))),
        );
        let orch = orchestrator(registry(&["svm", "lstm"]), transport);

        let result = orch.orchestrate(&dataset()).await.unwrap();
        assert_eq!(result.voting.decision, None);
        assert_eq!(result.voting.confidence, 0.0);
    }

    #[tokio::test]
    async fn test_no_enabled_models() {
        let reg = registry(&["svm"]);
        reg.set_enabled("svm", false).unwrap();
        let orch = orchestrator(reg, Arc::new(MockTransport::new()));

        let err = orch.orchestrate(&dataset()).await.unwrap_err();
        assert!(matches!(err, Error::NoModelsAvailable(_)));

        let empty = orchestrator(registry(&[]), Arc::new(MockTransport::new()));
        assert!(matches!(
            empty.train_models(&dataset()).await,
            Err(Error::NoModelsAvailable(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_dataset_rejected() {
        let orch = orchestrator(registry(&["svm"]), Arc::new(MockTransport::new()));
        let empty = Dataset::from_value(json!({"discharges": []})).unwrap();
        assert!(matches!(
            orch.orchestrate(&empty).await,
            Err(Error::InvalidFormat(_))
        ));
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let transport = Arc::new(
            MockTransport::new()
                .with("http://svm/predict", MockReply::Json(json!({"prediction": 0, "confidence": 0.7})))
                .with("http://lstm/predict", MockReply::Fail("Request failed with status code 500".into()))
                .with("http://xgboost/predict", MockReply::Hang),
        );
        let orch = orchestrator(registry(&["svm", "lstm", "xgboost"]), transport);

        let result = orch.orchestrate(&dataset()).await.unwrap();
        assert_eq!(result.models.len(), 3);
        assert!(result.models[0].is_success());
        assert_eq!(
            result.models[1].error.as_deref(),
            Some("Request failed with status code 500")
        );
        assert_eq!(result.models[2].error.as_deref(), Some("timeout of 200ms exceeded"));

        assert_eq!(result.voting.decision, Some(ClassLabel::Int(0)));
        assert_eq!(result.voting.total_votes, 1);
        assert_eq!(result.voting.total_models, 3);
    }

    #[tokio::test]
    async fn test_calls_run_concurrently() {
        let delay = Duration::from_millis(150);
        let transport = Arc::new(
            MockTransport::new()
                .with("http://a/predict", MockReply::Delayed(delay, json!({"prediction": 1})))
                .with("http://b/predict", MockReply::Delayed(delay, json!({"prediction": 1})))
                .with("http://c/predict", MockReply::Delayed(delay, json!({"prediction": 1}))),
        );
        let orch = orchestrator(registry(&["a", "b", "c"]), transport);

        let start = std::time::Instant::now();
        let result = orch.orchestrate(&dataset()).await.unwrap();
        assert!(start.elapsed() < delay * 3);
        assert_eq!(result.voting.total_votes, 3);
    }

    #[tokio::test]
    async fn test_disabled_between_resolve_and_call() {
        let reg = registry(&["svm"]);
        let transport = Arc::new(MockTransport::new());
        let orch = orchestrator(reg.clone(), transport.clone());

        reg.set_enabled("svm", false).unwrap();
        let outcome = orch.call_model("svm", &json!({})).await;
        assert_eq!(outcome.status, OutcomeStatus::Error);
        assert_eq!(outcome.error.as_deref(), Some("Model svm is not available"));

        let outcome = orch.call_model("ghost", &json!({})).await;
        assert_eq!(outcome.status, OutcomeStatus::Error);
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_train_models_summary() {
        let transport = Arc::new(
            MockTransport::new()
                .with("http://svm/train", MockReply::Json(json!({"status": "training started"})))
                .with("http://lstm/train", MockReply::Fail("socket hang up".into())),
        );
        let orch = orchestrator(registry(&["svm", "lstm"]), transport.clone());

        let summary = orch.train_models(&dataset()).await.unwrap();
        assert_eq!(summary.successful, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.details.len(), 2);
        assert_eq!(transport.call_count("http://svm/train"), 1);
        assert_eq!(transport.call_count("http://svm/predict"), 0);
    }

    #[tokio::test]
    async fn test_dispatch_sees_committed_mutation() {
        let reg = registry(&["svm"]);
        let transport = Arc::new(
            MockTransport::new()
                .with("http://new-svm/predict", MockReply::Json(json!({"prediction": 1}))),
        );
        let orch = orchestrator(reg.clone(), transport.clone());

        reg.set_url("svm", UrlKind::Predict, "http://new-svm/predict").unwrap();
        let result = orch.orchestrate(&dataset()).await.unwrap();
        assert_eq!(result.voting.decision, Some(ClassLabel::Int(1)));
        assert_eq!(transport.calls(), vec!["http://new-svm/predict"]);
    }
}
