//! Incident records as produced by the preprocessing step.

use incidex_core::{AppError, AppResult};
use serde_json::{Map, Value};
use std::path::Path;

/// Field carrying the source spreadsheet's serial number.
const SERIAL_FIELD: &str = "sl_no";

/// One incident from the municipal log: a stable id plus named fields.
#[derive(Debug, Clone, PartialEq)]
pub struct IncidentRecord {
    pub id: i64,
    pub fields: Map<String, Value>,
}

impl IncidentRecord {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            fields: Map::new(),
        }
    }

    /// Builder-style field setter.
    pub fn with_field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    /// Build a record from a JSON object, using `sl_no` as the id when it is
    /// integral and `position` otherwise.
    pub fn from_json(position: usize, value: Value) -> AppResult<Self> {
        let fields = match value {
            Value::Object(fields) => fields,
            other => {
                return Err(AppError::ResourceLoad(format!(
                    "malformed record at position {}: expected an object, got {}",
                    position,
                    json_type(&other)
                )))
            }
        };

        let id = fields
            .get(SERIAL_FIELD)
            .and_then(integral)
            .unwrap_or(position as i64);

        Ok(Self { id, fields })
    }

    /// Present value of a field as display text.
    ///
    /// Missing keys, JSON null and blank strings are all absent.
    pub fn text(&self, name: &str) -> Option<String> {
        match self.fields.get(name)? {
            Value::Null => None,
            Value::String(s) if s.trim().is_empty() => None,
            Value::String(s) => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            other => Some(other.to_string()),
        }
    }
}

/// Load the preprocessed records file (a JSON array of objects).
pub fn load_records(path: &Path) -> AppResult<Vec<IncidentRecord>> {
    if !path.exists() {
        return Err(AppError::ResourceLoad(format!(
            "missing records file {:?}",
            path
        )));
    }

    let contents = std::fs::read_to_string(path)?;
    let values: Vec<Value> = serde_json::from_str(&contents).map_err(|e| {
        AppError::ResourceLoad(format!("malformed records file {:?}: {}", path, e))
    })?;

    let records = values
        .into_iter()
        .enumerate()
        .map(|(position, value)| IncidentRecord::from_json(position, value))
        .collect::<AppResult<Vec<_>>>()?;

    tracing::info!("Loaded {} incident records from {:?}", records.len(), path);

    Ok(records)
}

fn integral(value: &Value) -> Option<i64> {
    if let Some(n) = value.as_i64() {
        return Some(n);
    }
    // Spreadsheet exports often carry serials as floats (e.g. 17.0).
    value
        .as_f64()
        .filter(|f| f.fract() == 0.0 && f.is_finite())
        .map(|f| f as i64)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
