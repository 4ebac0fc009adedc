//! Canonical event record
//!
//! An [`Event`] is a flat JSON object. Standard fields (`ts`, `kind`,
//! `subtype`, `tool_name`, ...) sit next to any caller-supplied extension
//! fields; nothing is nested under a payload key.

use crate::{Error, Result, util::now_iso};
use serde::Serialize;
use serde_json::{Map, Value};

/// Extension fields merged flat into an event, in insertion order
pub type Extra = Map<String, Value>;

/// A single validated event record
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Event(pub(crate) Map<String, Value>);

impl Event {
    /// Start building an event of the given kind
    pub fn builder(kind: impl Into<String>) -> EventBuilder {
        EventBuilder::new(kind)
    }

    /// Wrap an existing object after validating it
    pub fn from_map(fields: Map<String, Value>) -> Result<Self> {
        validate_fields(&fields)?;
        Ok(Self(fields))
    }

    /// Re-check the invariants; builders do not reject an empty kind
    pub fn validate(&self) -> Result<()> {
        validate_fields(&self.0)
    }

    pub fn kind(&self) -> &str {
        self.0.get("kind").and_then(Value::as_str).unwrap_or_default()
    }

    pub fn subtype(&self) -> Option<&str> {
        self.0.get("subtype").and_then(Value::as_str)
    }

    pub fn ts(&self) -> Option<&str> {
        self.0.get("ts").and_then(Value::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl TryFrom<Value> for Event {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Object(fields) => Self::from_map(fields),
            _ => Err(Error::Validation("Event must be a JSON object".to_string())),
        }
    }
}

impl From<Event> for Value {
    fn from(event: Event) -> Self {
        Value::Object(event.0)
    }
}

/// Validate a raw event value.
///
/// The value must be an object with a non-empty string `kind`. If `ts` is
/// present it must be a string.
pub fn validate_event(value: &Value) -> Result<()> {
    match value {
        Value::Object(fields) => validate_fields(fields),
        _ => Err(Error::Validation("Event must be a JSON object".to_string())),
    }
}

pub(crate) fn validate_fields(fields: &Map<String, Value>) -> Result<()> {
    let kind = fields
        .get("kind")
        .ok_or_else(|| Error::Validation("Event must have 'kind' field".to_string()))?;

    let kind = kind
        .as_str()
        .ok_or_else(|| Error::Validation("Event 'kind' must be a string".to_string()))?;

    if kind.is_empty() {
        return Err(Error::Validation("Event 'kind' cannot be empty".to_string()));
    }

    if let Some(ts) = fields.get("ts")
        && !ts.is_string()
    {
        return Err(Error::Validation("Event 'ts' must be a string".to_string()));
    }

    Ok(())
}

/// Builder for the fixed-shape part of an event.
///
/// Extension fields are merged last, so a caller-supplied key wins over a
/// standard field of the same name.
#[derive(Debug, Clone, Default)]
pub struct EventBuilder {
    kind: String,
    subtype: Option<String>,
    tool_name: Option<String>,
    status: Option<String>,
    direction: Option<String>,
    method: Option<String>,
    correlation_id: Option<String>,
    span_parent_id: Option<String>,
    latency_ms: Option<u64>,
    ts: Option<String>,
    extra: Extra,
}

impl EventBuilder {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Default::default()
        }
    }

    pub fn subtype(mut self, subtype: impl Into<String>) -> Self {
        self.subtype = Some(subtype.into());
        self
    }

    pub fn tool_name(mut self, tool_name: impl Into<String>) -> Self {
        self.tool_name = Some(tool_name.into());
        self
    }

    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn direction(mut self, direction: impl Into<String>) -> Self {
        self.direction = Some(direction.into());
        self
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn correlation_id(mut self, correlation_id: Option<String>) -> Self {
        self.correlation_id = correlation_id;
        self
    }

    pub fn span_parent_id(mut self, span_parent_id: impl Into<String>) -> Self {
        self.span_parent_id = Some(span_parent_id.into());
        self
    }

    pub fn latency_ms(mut self, latency_ms: Option<u64>) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    /// Explicit timestamp; `build` falls back to the current time when unset
    pub fn ts(mut self, ts: impl Into<String>) -> Self {
        self.ts = Some(ts.into());
        self
    }

    /// Add a single extension field
    pub fn extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Merge a set of extension fields; later keys replace earlier ones
    pub fn extend(mut self, extra: Extra) -> Self {
        self.extra.extend(extra);
        self
    }

    pub fn build(self) -> Event {
        let mut fields = Map::new();
        fields.insert("ts".into(), Value::String(self.ts.unwrap_or_else(now_iso)));
        fields.insert("kind".into(), Value::String(self.kind));

        let standard = [
            ("subtype", self.subtype),
            ("tool_name", self.tool_name),
            ("status", self.status),
            ("direction", self.direction),
            ("method", self.method),
            ("correlation_id", self.correlation_id),
            ("span_parent_id", self.span_parent_id),
        ];
        for (key, value) in standard {
            if let Some(value) = value {
                fields.insert(key.into(), Value::String(value));
            }
        }
        if let Some(latency_ms) = self.latency_ms {
            fields.insert("latency_ms".into(), latency_ms.into());
        }

        fields.extend(self.extra);
        Event(fields)
    }
}
