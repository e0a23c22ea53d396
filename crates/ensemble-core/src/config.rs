//! Gateway configuration, resolved from the environment.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default request timeout for predict and health calls.
pub const DEFAULT_MODEL_TIMEOUT_MS: u64 = 10_000;
/// Default request timeout for training calls.
pub const DEFAULT_TRAINING_TIMEOUT_MS: u64 = 60_000;
/// Default period of the background health loop.
pub const DEFAULT_HEALTH_INTERVAL_MS: u64 = 5_000;
/// Number of prediction records kept in memory.
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// Initial endpoint definition loaded at startup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EndpointSeed {
    pub display_name: String,
    pub predict_url: String,
    pub train_url: String,
    pub health_url: String,
}

/// Top-level gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// HTTP server port.
    pub port: u16,
    /// Deployment environment label (`development`, `production`, ...).
    pub env: String,
    /// Fallback log filter when `RUST_LOG` is unset.
    pub log_level: String,
    #[serde(with = "millis")]
    pub model_timeout: Duration,
    #[serde(with = "millis")]
    pub training_timeout: Duration,
    #[serde(with = "millis")]
    pub health_interval: Duration,
    pub history_capacity: usize,
    /// Maximum accepted request body, in bytes.
    pub body_limit: usize,
    /// Endpoints registered at startup, in order.
    pub seed_models: Vec<EndpointSeed>,
}

impl GatewayConfig {
    /// Create configuration from environment and defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolve configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = parse_var(&lookup, "PORT", 3000u16)?;
        let model_timeout = parse_var(&lookup, "MODEL_TIMEOUT", DEFAULT_MODEL_TIMEOUT_MS)?;
        let training_timeout =
            parse_var(&lookup, "TRAINING_TIMEOUT", DEFAULT_TRAINING_TIMEOUT_MS)?;
        let health_interval =
            parse_var(&lookup, "HEALTH_INTERVAL", DEFAULT_HEALTH_INTERVAL_MS)?;
        let history_capacity =
            parse_var(&lookup, "HISTORY_CAPACITY", DEFAULT_HISTORY_CAPACITY)?;
        let body_limit_mb = parse_var(&lookup, "BODY_LIMIT_MB", 50usize)?;

        if health_interval == 0 {
            return Err(Error::Config("HEALTH_INTERVAL must be greater than 0".into()));
        }
        if history_capacity == 0 {
            return Err(Error::Config("HISTORY_CAPACITY must be greater than 0".into()));
        }
        let body_limit = body_limit_mb
            .checked_mul(1024 * 1024)
            .ok_or_else(|| Error::Config(format!("BODY_LIMIT_MB is too large: {}", body_limit_mb)))?;

        let seed_models = [("SVM", "svm", 8001), ("LSTM", "lstm", 8002), ("XGBoost", "xgboost", 8003)]
            .into_iter()
            .map(|(display, prefix, port)| {
                let var = |suffix: &str| format!("{}_{}", prefix.to_uppercase(), suffix);
                let base = format!("http://localhost:{}", port);
                EndpointSeed {
                    display_name: display.to_string(),
                    predict_url: lookup(&var("MODEL_URL"))
                        .unwrap_or_else(|| format!("{}/predict", base)),
                    train_url: lookup(&var("TRAINING_URL"))
                        .unwrap_or_else(|| format!("{}/train", base)),
                    health_url: lookup(&var("HEALTH_URL"))
                        .unwrap_or_else(|| format!("{}/health", base)),
                }
            })
            .collect();

        Ok(Self {
            port,
            env: lookup("APP_ENV").unwrap_or_else(|| "development".into()),
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".into()),
            model_timeout: Duration::from_millis(model_timeout),
            training_timeout: Duration::from_millis(training_timeout),
            health_interval: Duration::from_millis(health_interval),
            history_capacity,
            body_limit,
            seed_models,
        })
    }
}

fn parse_var<F, T>(lookup: &F, name: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{} has invalid value '{}'", name, raw))),
        None => Ok(default),
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
