//! Runtime metadata describing the calling environment

use crate::event::{Event, Extra};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

/// Provider/model/mode snapshot for a session.
///
/// Serializes flat: `provider`, `model`, `mode` (when set) and then every
/// extra field. Extra fields replace earlier keys of the same name.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RuntimeInfo {
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl RuntimeInfo {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            mode: None,
            extra: Extra::new(),
        }
    }

    /// API mode, e.g. `messages` or `completions`
    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = Some(mode.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn with_extras(mut self, extra: Extra) -> Self {
        self.extra.extend(extra);
        self
    }

    /// Flattened fields in wire order
    pub fn to_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("provider".into(), Value::String(self.provider.clone()));
        fields.insert("model".into(), Value::String(self.model.clone()));
        if let Some(mode) = self.mode.as_deref().filter(|m| !m.is_empty()) {
            fields.insert("mode".into(), Value::String(mode.to_string()));
        }
        fields.extend(self.extra.clone());
        fields
    }

    /// The synthetic `runtime`/`runtime_info` event placed at the front of a batch
    pub fn to_event(&self) -> Event {
        let mut fields = Map::new();
        fields.insert("kind".into(), Value::String("runtime".into()));
        fields.insert("subtype".into(), Value::String("runtime_info".into()));
        fields.extend(self.to_fields());
        Event(fields)
    }
}

impl Serialize for RuntimeInfo {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_fields().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_runtime_serializes_flat() {
        let runtime = RuntimeInfo::new("anthropic", "claude-sonnet-4-5")
            .with_mode("messages")
            .with_extra("temperature", 0.7)
            .with_extra("max_tokens", 4096);

        assert_eq!(
            serde_json::to_value(&runtime).unwrap(),
            json!({
                "provider": "anthropic",
                "model": "claude-sonnet-4-5",
                "mode": "messages",
                "temperature": 0.7,
                "max_tokens": 4096
            })
        );
    }

    #[test]
    fn test_empty_mode_is_omitted() {
        let runtime = RuntimeInfo::new("openai", "gpt-4").with_mode("");
        assert!(!runtime.to_fields().contains_key("mode"));
    }

    #[test]
    fn test_runtime_event_shape() {
        let event = RuntimeInfo::new("anthropic", "claude-x").to_event();
        assert_eq!(event.kind(), "runtime");
        assert_eq!(event.subtype(), Some("runtime_info"));
        assert_eq!(event.get("provider"), Some(&json!("anthropic")));
        assert_eq!(event.get("model"), Some(&json!("claude-x")));
    }

    #[test]
    fn test_runtime_deserializes_extras() {
        let runtime: RuntimeInfo = serde_json::from_value(json!({
            "provider": "anthropic",
            "model": "claude-x",
            "api_version": "2023-06-01"
        }))
        .unwrap();
        assert_eq!(runtime.mode, None);
        assert_eq!(runtime.extra.get("api_version"), Some(&json!("2023-06-01")));
    }

    #[test]
    fn test_with_extras_merges_after_single_extras() {
        let mut extra = Extra::new();
        extra.insert("temperature".into(), json!(0.7));
        extra.insert("max_tokens".into(), json!(8192));

        let runtime = RuntimeInfo::new("anthropic", "claude-x")
            .with_extra("max_tokens", 4096)
            .with_extras(extra);

        let fields = runtime.to_fields();
        let keys: Vec<&str> = fields.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["provider", "model", "max_tokens", "temperature"]);
        assert_eq!(runtime.extra.get("max_tokens"), Some(&json!(8192)));
    }
}
