//! Runtime types.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A remotely hosted classifier managed by the registry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ModelEndpoint {
    /// Unique key derived from the display name.
    pub key: String,
    pub display_name: String,
    pub predict_url: String,
    pub train_url: String,
    pub health_url: String,
    pub enabled: bool,
}

impl ModelEndpoint {
    pub fn url(&self, kind: UrlKind) -> &str {
        match kind {
            UrlKind::Predict => &self.predict_url,
            UrlKind::Train => &self.train_url,
            UrlKind::Health => &self.health_url,
        }
    }
}

/// The three network addresses every endpoint carries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EndpointUrls {
    pub predict_url: String,
    pub train_url: String,
    pub health_url: String,
}

/// Which of an endpoint's addresses to touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrlKind {
    #[default]
    Predict,
    Train,
    Health,
}

impl fmt::Display for UrlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UrlKind::Predict => write!(f, "predict"),
            UrlKind::Train => write!(f, "train"),
            UrlKind::Health => write!(f, "health"),
        }
    }
}

/// Name plus enabled flag, the payload of a `config-update` event.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct EnabledState {
    pub name: String,
    pub enabled: bool,
}

// ---------------------------------------------------------------
// Outcomes and voting
// ---------------------------------------------------------------

/// A discrete class emitted by a classifier.
///
/// Integer-valued predictions (`1`, `1.0`, `"1"`, `true`) all normalize to
/// [`ClassLabel::Int`], so the same class is never split across two tallies.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(untagged)]
pub enum ClassLabel {
    Int(i64),
    Text(String),
}

impl ClassLabel {
    /// Interpret a JSON prediction field. Returns `None` for null, objects,
    /// arrays and non-integral numbers.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(ClassLabel::Int(i))
                } else {
                    // 2^63 itself is not representable; `as` would saturate
                    n.as_f64()
                        .filter(|f| f.is_finite() && f.fract() == 0.0)
                        .filter(|f| *f >= i64::MIN as f64 && *f < i64::MAX as f64)
                        .map(|f| ClassLabel::Int(f as i64))
                }
            }
            Value::Bool(b) => Some(ClassLabel::Int(i64::from(*b))),
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else if let Ok(i) = trimmed.parse::<i64>() {
                    Some(ClassLabel::Int(i))
                } else {
                    Some(ClassLabel::Text(trimmed.to_string()))
                }
            }
            _ => None,
        }
    }
}

impl From<i64> for ClassLabel {
    fn from(value: i64) -> Self {
        ClassLabel::Int(value)
    }
}

impl fmt::Display for ClassLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassLabel::Int(i) => write!(f, "{}", i),
            ClassLabel::Text(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Success,
    Error,
}

/// Result of one remote call made during a dispatch cycle.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModelOutcome {
    pub model_name: String,
    pub status: OutcomeStatus,
    /// Raw payload returned by the endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ModelOutcome {
    pub fn success(model_name: impl Into<String>, result: Value) -> Self {
        Self {
            model_name: model_name.into(),
            status: OutcomeStatus::Success,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(model_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            status: OutcomeStatus::Error,
            result: None,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }

    /// The predicted class, if the call succeeded and carried one.
    pub fn prediction(&self) -> Option<ClassLabel> {
        if !self.is_success() {
            return None;
        }
        self.result
            .as_ref()
            .and_then(|r| r.get("prediction"))
            .and_then(ClassLabel::from_value)
    }

    /// Reported confidence, defaulting to 1.0 when absent or not numeric.
    pub fn confidence(&self) -> f64 {
        self.result
            .as_ref()
            .and_then(|r| r.get("confidence"))
            .and_then(Value::as_f64)
            .filter(|c| c.is_finite())
            .unwrap_or(1.0)
    }
}

/// Reduction of a set of outcomes to one decision.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VotingResult {
    pub votes: BTreeMap<ClassLabel, usize>,
    /// Outcomes that carried a valid prediction.
    pub total_votes: usize,
    /// Outcomes considered, valid or not.
    pub total_models: usize,
    /// Winning class; `None` on a tie or when nothing voted.
    pub decision: Option<ClassLabel>,
    pub confidence: f64,
    pub message: String,
}

/// Output of one `orchestrate` call.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Orchestration {
    pub models: Vec<ModelOutcome>,
    pub voting: VotingResult,
}

/// Output of one `train_models` call.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TrainingSummary {
    pub successful: usize,
    pub failed: usize,
    pub details: Vec<ModelOutcome>,
}

// ---------------------------------------------------------------
// Health
// ---------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Unknown,
    Online,
    Offline,
    Disabled,
}

/// Last known health of an endpoint.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModelStatus {
    pub status: HealthState,
    pub last_check: Option<DateTime<Utc>>,
}

impl ModelStatus {
    pub fn unknown() -> Self {
        Self {
            status: HealthState::Unknown,
            last_check: None,
        }
    }
}

/// Status map keyed by endpoint key.
pub type StatusMap = BTreeMap<String, ModelStatus>;

/// Probe result for a single endpoint.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ModelHealth {
    pub model: String,
    pub status: HealthState,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate result of one health cycle.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub timestamp: DateTime<Utc>,
    pub models: Vec<ModelHealth>,
    pub available_models: usize,
}

impl HealthReport {
    /// True when no endpoint answered its probe.
    pub fn is_degraded(&self) -> bool {
        self.available_models == 0
    }
}
