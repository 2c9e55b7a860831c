use serde_json::Value;

/// Ordered key/value payload attached to an emission.
///
/// Keys keep emission order so log lines stay readable; lookups are linear,
/// which is fine at the payload sizes the bus carries.
#[derive(Clone, Debug, Default)]
pub struct Payload {
    entries: Vec<(String, Value)>,
}

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries.push((key.into(), value.into()));
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn str_value(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn i64_value(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_i64)
    }

    pub fn f64_value(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_f64)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// One delivered emission: the topic, the payload, and the sender identity
/// captured when `emit` was called (not when a delayed emit fires).
#[derive(Clone, Debug)]
pub struct Event {
    pub topic: String,
    pub sender: String,
    pub payload: Payload,
}
