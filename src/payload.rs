use serde_json::{Map, Value};

use crate::error::{DispatchError, Result};

/// Borrowed view of a job payload: a JSON object whose fields are read by
/// the route registry and the normalizer. Unknown fields are ignored.
///
/// A JSON `null` is treated the same as a missing field.
#[derive(Debug, Clone, Copy)]
pub struct JobPayload<'a> {
    fields: &'a Map<String, Value>,
}

impl<'a> JobPayload<'a> {
    pub fn from_value(value: &'a Value) -> Result<Self> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(DispatchError::invalid(
                "payload",
                format!("expected a JSON object, got {}", json_type(other)),
            )),
        }
    }

    /// Strip the hosting platform's job wrapper (`{"id": .., "input": {..}}`)
    /// when present. Anything else is already a payload.
    pub fn unwrap_job(job: &Value) -> &Value {
        match job.get("input") {
            Some(inner) if inner.is_object() => inner,
            _ => job,
        }
    }

    pub fn get(&self, key: &str) -> Option<&'a Value> {
        self.fields.get(key).filter(|value| !value.is_null())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn str_field(&self, key: &'static str) -> Result<Option<&'a str>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(DispatchError::invalid(
                key,
                format!("expected a string, got {}", json_type(other)),
            )),
        }
    }

    pub fn bool_field(&self, key: &'static str) -> Result<Option<bool>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(DispatchError::invalid(
                key,
                format!("expected a boolean, got {}", json_type(other)),
            )),
        }
    }

    /// Read a number. Numeric strings such as `"1.25"` are accepted too.
    pub fn number_field(&self, key: &'static str) -> Result<Option<f64>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Number(n)) => n
                .as_f64()
                .map(Some)
                .ok_or_else(|| DispatchError::invalid(key, format!("{n} is not representable"))),
            Some(Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .map(Some)
                .map_err(|_| DispatchError::invalid(key, format!("'{s}' is not a number"))),
            Some(other) => Err(DispatchError::invalid(
                key,
                format!("expected a number, got {}", json_type(other)),
            )),
        }
    }
}

pub(crate) fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
