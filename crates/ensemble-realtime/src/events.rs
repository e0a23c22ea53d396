//! Observer channel messages.
//!
//! Both directions use the same envelope, `{"event": <name>, "data": <payload>}`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use ensemble_runtime::{ClassLabel, EnabledState, Orchestration, StatusMap};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One completed prediction, as kept in history.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PredictionRecord {
    pub timestamp: DateTime<Utc>,
    /// Winning class, `null` on a tie.
    pub result: Option<ClassLabel>,
    pub confidence: f64,
    pub votes: BTreeMap<ClassLabel, usize>,
    pub details: Orchestration,
}

impl PredictionRecord {
    pub fn new(details: Orchestration) -> Self {
        Self {
            timestamp: Utc::now(),
            result: details.voting.decision.clone(),
            confidence: details.voting.confidence,
            votes: details.voting.votes.clone(),
            details,
        }
    }
}

/// Server → observer.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    HealthUpdate(StatusMap),
    PredictionHistory(Vec<PredictionRecord>),
    NewPrediction(PredictionRecord),
    PredictionResult(Orchestration),
    ConfigUpdate { models: Vec<EnabledState> },
    Success { message: String },
    Error { message: String },
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::HealthUpdate(_) => "health-update",
            ServerEvent::PredictionHistory(_) => "prediction-history",
            ServerEvent::NewPrediction(_) => "new-prediction",
            ServerEvent::PredictionResult(_) => "prediction-result",
            ServerEvent::ConfigUpdate { .. } => "config-update",
            ServerEvent::Success { .. } => "success",
            ServerEvent::Error { .. } => "error",
        }
    }
}

/// Payload of `toggle-model`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ToggleRequest {
    #[serde(alias = "modelName", alias = "name")]
    pub key: String,
    pub enabled: bool,
}

/// Observer → server.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientCommand {
    RequestHealth,
    /// Raw dataset; shape errors are reported back to the sender.
    RunPrediction(Value),
    ToggleModel(ToggleRequest),
}

#[cfg(test)]
mod tests {
    use super::*;
    use ensemble_runtime::{vote, ModelOutcome};
    use serde_json::json;

    fn orchestration() -> Orchestration {
        let models = vec![
            ModelOutcome::success("svm", json!({"prediction": 1, "confidence": 0.8})),
            ModelOutcome::success("lstm", json!({"prediction": 1, "confidence": 0.6})),
        ];
        let voting = vote(&models);
        Orchestration { models, voting }
    }

    #[test]
    fn test_record_copies_voting_summary() {
        let record = PredictionRecord::new(orchestration());
        assert_eq!(record.result, Some(ClassLabel::Int(1)));
        assert!((record.confidence - 0.7).abs() < 1e-12);
        assert_eq!(record.votes[&ClassLabel::Int(1)], 2);
    }

    #[test]
    fn test_server_event_envelope() {
        let event = ServerEvent::Success {
            message: "Model svm enabled".into(),
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"event": "success", "data": {"message": "Model svm enabled"}})
        );

        let event = ServerEvent::ConfigUpdate {
            models: vec![EnabledState {
                name: "svm".into(),
                enabled: false,
            }],
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "config-update");
        assert_eq!(value["data"]["models"][0], json!({"name": "svm", "enabled": false}));
    }

    #[test]
    fn test_new_prediction_payload() {
        let event = ServerEvent::NewPrediction(PredictionRecord::new(orchestration()));
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], event.name());
        assert_eq!(value["data"]["result"], 1);
        assert_eq!(value["data"]["votes"]["1"], 2);
        assert_eq!(value["data"]["details"]["voting"]["totalVotes"], 2);
        assert!(value["data"]["timestamp"].is_string());
    }

    #[test]
    fn test_client_commands() {
        let cmd: ClientCommand = serde_json::from_value(json!({"event": "request-health"})).unwrap();
        assert_eq!(cmd, ClientCommand::RequestHealth);

        let cmd: ClientCommand = serde_json::from_value(json!({
            "event": "toggle-model",
            "data": {"modelName": "svm", "enabled": false}
        }))
        .unwrap();
        assert_eq!(
            cmd,
            ClientCommand::ToggleModel(ToggleRequest {
                key: "svm".into(),
                enabled: false
            })
        );

        let cmd: ClientCommand = serde_json::from_value(json!({
            "event": "run-prediction",
            "data": {"discharges": []}
        }))
        .unwrap();
        assert!(matches!(cmd, ClientCommand::RunPrediction(v) if v["discharges"].is_array()));

        assert!(serde_json::from_value::<ClientCommand>(json!({"event": "shutdown"})).is_err());
    }
}
