use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};

/// Serializes an array or object column.
pub fn to_json<T: Serialize + ?Sized>(value: &T, field: &str) -> Result<String> {
    serde_json::to_string(value).with_context(|| format!("failed to serialize {field}"))
}

pub fn from_json<T: DeserializeOwned>(raw: &str, field: &str) -> Result<T> {
    serde_json::from_str(raw).with_context(|| format!("failed to parse {field}"))
}

/// Parses a mode stored as its wire name, e.g. `"hybrid"`.
pub fn parse_mode<T: DeserializeOwned>(raw: &str, field: &str) -> Result<T> {
    serde_json::from_value(serde_json::Value::String(raw.to_string()))
        .with_context(|| format!("unknown {field} '{raw}'"))
}

/// `None` for ids that have not been assigned yet.
pub fn assigned_id(id: i64) -> Option<i64> {
    (id > 0).then_some(id)
}
