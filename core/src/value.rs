use serde::{Deserialize, Serialize};
use tracing::warn;

/// A dynamically typed snapshot of a tracked value, captured on operation
/// records for the audit trail and for default rollback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    /// Structured values (domain aggregates) snapshot through serde.
    Json(serde_json::Value),
    /// Snapshot failed; the mutation itself was unaffected.
    Null,
}

impl Value {
    /// Capture a serializable value for an audit record. Capture failure must
    /// never block the mutation, so it degrades to [`Value::Null`].
    pub fn snapshot<T: Serialize>(value: &T) -> Value {
        match serde_json::to_value(value) {
            Ok(json) => Value::Json(json),
            Err(e) => {
                warn!("failed to snapshot value for audit: {e}");
                Value::Null
            }
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::String(s) => write!(f, "{s}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Json(json) => write!(f, "{json}"),
            Value::Null => write!(f, "null"),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self { Value::String(value.to_owned()) }
}

impl From<String> for Value {
    fn from(value: String) -> Self { Value::String(value) }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self { Value::Integer(value) }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self { Value::Float(value) }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self { Value::Boolean(value) }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self { Value::Json(value) }
}

/// Anything a tracked container can hold. The snapshot feeds `old_value` /
/// `new_value` on recorded operations; equality drives remove-by-value and
/// conflict checks during rollback.
pub trait TrackedValue: Clone + PartialEq + std::fmt::Debug + Send + Sync + 'static {
    fn to_value(&self) -> Value;
}

impl TrackedValue for String {
    fn to_value(&self) -> Value { Value::String(self.clone()) }
}

impl TrackedValue for i64 {
    fn to_value(&self) -> Value { Value::Integer(*self) }
}

impl TrackedValue for f64 {
    fn to_value(&self) -> Value { Value::Float(*self) }
}

impl TrackedValue for bool {
    fn to_value(&self) -> Value { Value::Boolean(*self) }
}

impl TrackedValue for serde_json::Value {
    fn to_value(&self) -> Value { Value::Json(self.clone()) }
}
