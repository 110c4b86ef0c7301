use serde_json::Value;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Key/value store shared by every stage of one pipeline run.
///
/// A run creates exactly one instance and stages execute strictly one at a
/// time, so the lock only guards against misuse, never real contention.
#[derive(Debug, Default)]
pub struct PipelineState {
    values: RwLock<HashMap<String, Value>>,
}

impl PipelineState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.values.read().unwrap_or_else(PoisonError::into_inner).get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.read().unwrap_or_else(PoisonError::into_inner).contains_key(key)
    }

    /// Overwrite the value stored at `key`.
    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.values.write().unwrap_or_else(PoisonError::into_inner).insert(key.into(), value);
    }

    /// Push `item` onto the array stored at `key` and return the new length.
    ///
    /// A missing key starts a new array. A scalar already stored at `key` is
    /// kept as the first element so nothing previously written is lost.
    pub fn append(&self, key: &str, item: Value) -> usize {
        let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
        let slot = values.entry(key.to_string()).or_insert(Value::Null);
        let mut items = match std::mem::take(slot) {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            Value::String(s) if s.trim().is_empty() => Vec::new(),
            other => vec![other],
        };
        items.push(item);
        let len = items.len();
        *slot = Value::Array(items);
        len
    }

    /// The string items stored at `key`, in insertion order.
    ///
    /// Non-string array items are rendered as JSON. A plain string value is a
    /// single section; a missing key yields no sections.
    pub fn sections(&self, key: &str) -> Vec<String> {
        match self.get(key) {
            Some(Value::Array(items)) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(s) => s,
                    other => other.to_string(),
                })
                .collect(),
            Some(Value::String(s)) if !s.trim().is_empty() => vec![s],
            _ => Vec::new(),
        }
    }

    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.values.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}
