//! Helper constructors for the standard event shapes

use crate::event::{Event, Extra};
use serde_json::Value;

pub fn session_started(extra: Extra) -> Event {
    Event::builder("session")
        .subtype("session_started")
        .extend(extra)
        .build()
}

pub fn session_ended(extra: Extra) -> Event {
    Event::builder("session")
        .subtype("session_ended")
        .extend(extra)
        .build()
}

/// `tool`/`tool_call_started`, direction `request`
pub fn tool_call_started(
    tool_name: impl Into<String>,
    args: Option<Value>,
    correlation_id: Option<String>,
    extra: Extra,
) -> Event {
    let mut builder = Event::builder("tool")
        .subtype("tool_call_started")
        .tool_name(tool_name)
        .direction("request")
        .correlation_id(correlation_id);

    if let Some(args) = args {
        builder = builder.extra("args", args);
    }

    builder.extend(extra).build()
}

/// `tool`/`tool_call_completed`, direction `response`, status `success`
pub fn tool_call_completed(
    tool_name: impl Into<String>,
    result: Option<Value>,
    latency_ms: Option<u64>,
    correlation_id: Option<String>,
    extra: Extra,
) -> Event {
    let mut builder = Event::builder("tool")
        .subtype("tool_call_completed")
        .tool_name(tool_name)
        .direction("response")
        .status("success")
        .latency_ms(latency_ms)
        .correlation_id(correlation_id);

    if let Some(result) = result {
        builder = builder.extra("result", result);
    }

    builder.extend(extra).build()
}

/// `tool`/`tool_call_failed`, direction `response`, status `error`
pub fn tool_call_failed(
    tool_name: impl Into<String>,
    error: Option<String>,
    latency_ms: Option<u64>,
    correlation_id: Option<String>,
    extra: Extra,
) -> Event {
    let mut builder = Event::builder("tool")
        .subtype("tool_call_failed")
        .tool_name(tool_name)
        .direction("response")
        .status("error")
        .latency_ms(latency_ms)
        .correlation_id(correlation_id);

    if let Some(error) = error {
        builder = builder.extra("error", error);
    }

    builder.extend(extra).build()
}

/// Arbitrary event; `kind` and `subtype` pass through, extras are merged flat
pub fn custom(kind: impl Into<String>, subtype: Option<String>, extra: Extra) -> Event {
    let mut builder = Event::builder(kind);
    if let Some(subtype) = subtype {
        builder = builder.subtype(subtype);
    }
    builder.extend(extra).build()
}

/// [`custom`] with the default `custom` kind
pub fn custom_event(subtype: Option<String>, extra: Extra) -> Event {
    custom("custom", subtype, extra)
}
