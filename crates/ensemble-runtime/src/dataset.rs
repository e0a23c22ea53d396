//! Measurement datasets accepted by the gateway.
//!
//! Two shapes are understood, selected by the top-level key:
//! `{"discharges": [...]}` (per-discharge signal sets) and the legacy
//! `{"data": [[f64; 7], ...]}` point matrix.
//!
//! Fields the gateway does not model (labels, lengths, metadata) are kept
//! and forwarded to the model endpoints untouched.

use std::collections::HashMap;

use ensemble_core::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Sensors per row in the legacy point-matrix shape.
pub const SENSOR_COUNT: usize = 7;

/// One sensor trace within a discharge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Signal {
    pub file_name: String,
    /// Own time axis, used only when the discharge has no shared one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub times: Option<Vec<f64>>,
    pub values: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anomaly_time: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Signal {
    /// Parse a whitespace-separated `time value` text file.
    ///
    /// Lines with fewer than two columns or unparsable numbers are skipped.
    pub fn from_text(file_name: &str, content: &str, anomaly_time: Option<f64>) -> Self {
        let mut times = Vec::new();
        let mut values = Vec::new();

        for line in content.trim().lines() {
            let mut parts = line.split_whitespace();
            let (Some(t), Some(v)) = (parts.next(), parts.next()) else {
                continue;
            };
            if let (Ok(t), Ok(v)) = (t.parse::<f64>(), v.parse::<f64>()) {
                if t.is_finite() && v.is_finite() {
                    times.push(t);
                    values.push(v);
                }
            }
        }

        Self {
            file_name: file_name.to_string(),
            times: Some(times),
            values,
            anomaly_time,
            extra: Map::new(),
        }
    }
}

/// One experiment: an identifier, an optional shared time axis and its signals.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Discharge {
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub times: Option<Vec<f64>>,
    pub signals: Vec<Signal>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Dataset submitted for prediction or training.
///
/// `extra` holds the top-level keys other than the collection itself.
#[derive(Debug, Clone, PartialEq)]
pub enum Dataset {
    Discharges {
        discharges: Vec<Discharge>,
        extra: Map<String, Value>,
    },
    Points {
        data: Vec<Vec<f64>>,
        extra: Map<String, Value>,
    },
}

impl Dataset {
    /// Decode a request body, reporting shape problems as `InvalidFormat`.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(mut extra) = value else {
            return Err(Error::InvalidFormat("expected a JSON object".into()));
        };

        if let Some(discharges) = extra.remove("discharges") {
            if !discharges.is_array() {
                return Err(Error::InvalidFormat(
                    "expected an object with a \"discharges\" array".into(),
                ));
            }
            let discharges: Vec<Discharge> = serde_json::from_value(discharges)
                .map_err(|e| Error::InvalidFormat(format!("malformed discharges: {}", e)))?;
            return Ok(Dataset::Discharges { discharges, extra });
        }

        if let Some(data) = extra.remove("data") {
            let data: Vec<Vec<f64>> = serde_json::from_value(data).map_err(|e| {
                Error::InvalidFormat(format!("\"data\" must be an array of numeric rows: {}", e))
            })?;
            return Ok(Dataset::Points { data, extra });
        }

        Err(Error::InvalidFormat(
            "expected an object with a \"discharges\" array".into(),
        ))
    }

    /// Number of entries in the dataset's collection.
    pub fn len(&self) -> usize {
        match self {
            Dataset::Discharges { discharges, .. } => discharges.len(),
            Dataset::Points { data, .. } => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Name of the collection, for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Dataset::Discharges { .. } => "discharges",
            Dataset::Points { .. } => "data points",
        }
    }

    /// Deep validation: axis lengths, finiteness, row widths.
    pub fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(Error::InvalidFormat(format!(
                "at least one entry is required in {}",
                self.kind()
            )));
        }

        match self {
            Dataset::Discharges { discharges, .. } => {
                for discharge in discharges {
                    validate_discharge(discharge)?;
                }
            }
            Dataset::Points { data, .. } => {
                for (i, row) in data.iter().enumerate() {
                    if row.len() != SENSOR_COUNT {
                        return Err(Error::InvalidFormat(format!(
                            "row {} has {} values, expected exactly {} (one per sensor)",
                            i,
                            row.len(),
                            SENSOR_COUNT
                        )));
                    }
                    if row.iter().any(|v| !v.is_finite()) {
                        return Err(Error::InvalidFormat(format!(
                            "row {} contains non-numeric values",
                            i
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// JSON body forwarded to model endpoints: the request as received.
    pub fn to_payload(&self) -> Result<Value> {
        let (key, collection, extra) = match self {
            Dataset::Discharges { discharges, extra } => {
                ("discharges", serde_json::to_value(discharges)?, extra)
            }
            Dataset::Points { data, extra } => ("data", serde_json::to_value(data)?, extra),
        };
        let mut body = extra.clone();
        body.insert(key.to_string(), collection);
        Ok(Value::Object(body))
    }
}

fn validate_discharge(discharge: &Discharge) -> Result<()> {
    if discharge.signals.is_empty() {
        return Err(Error::InvalidFormat(format!(
            "discharge {} has no signals",
            discharge.id
        )));
    }
    if let Some(times) = &discharge.times {
        if times.iter().any(|t| !t.is_finite()) {
            return Err(Error::InvalidFormat(format!(
                "discharge {} has non-finite times",
                discharge.id
            )));
        }
    }

    for signal in &discharge.signals {
        if signal.file_name.trim().is_empty() {
            return Err(Error::InvalidFormat(format!(
                "discharge {} has a signal without fileName",
                discharge.id
            )));
        }
        if signal.values.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidFormat(format!(
                "signal {} contains non-numeric values",
                signal.file_name
            )));
        }

        let axis = discharge.times.as_ref().or(signal.times.as_ref());
        if let Some(axis) = axis {
            if discharge.times.is_none() && axis.iter().any(|t| !t.is_finite()) {
                return Err(Error::InvalidFormat(format!(
                    "signal {} has non-finite times",
                    signal.file_name
                )));
            }
            if axis.len() != signal.values.len() {
                return Err(Error::InvalidFormat(format!(
                    "signal {}: times length ({}) and values length ({}) differ",
                    signal.file_name,
                    axis.len(),
                    signal.values.len()
                )));
            }
        } else {
            return Err(Error::InvalidFormat(format!(
                "signal {} has no time axis",
                signal.file_name
            )));
        }
    }
    Ok(())
}

/// Raw uploaded sensor file.
#[derive(Debug, Clone, Deserialize)]
pub struct SensorFile {
    pub name: String,
    pub content: String,
}

/// Parse a batch of sensor text files into signals.
///
/// `anomaly_times` maps file names to the time at which the anomaly occurs.
pub fn parse_sensor_files(
    files: &[SensorFile],
    anomaly_times: &HashMap<String, f64>,
) -> Vec<Signal> {
    files
        .iter()
        .map(|file| {
            let anomaly = anomaly_times.get(&file.name).copied();
            Signal::from_text(&file.name, &file.content, anomaly)
        })
        .collect()
}
