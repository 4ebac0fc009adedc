//! Session-scoped state guarded by the client's buffer lock
//!
//! The lock protecting [`SessionState`] is only held for the in-memory
//! snapshot and commit steps of a flush, never across network I/O.

use crate::transport::IngestRequest;
use serde_json::{Map, Value};
use surfa_core::{Event, RuntimeInfo};

/// Runtime metadata lifecycle for one session
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RuntimeState {
    Unset,
    /// Set, runtime-info event not yet delivered
    Pending { runtime: RuntimeInfo, generation: u64 },
    /// Runtime-info event delivered for this runtime
    Emitted { runtime: RuntimeInfo },
}

impl RuntimeState {
    fn runtime(&self) -> Option<&RuntimeInfo> {
        match self {
            Self::Unset => None,
            Self::Pending { runtime, .. } | Self::Emitted { runtime } => Some(runtime),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Lifecycle {
    Active,
    Ended,
}

/// A batch prepared from the buffer, plus what to commit if it is delivered
#[derive(Debug)]
pub(crate) struct BatchSnapshot {
    pub request: IngestRequest,
    /// Buffered events in the batch; the runtime-info event is not counted
    pub buffered: usize,
    /// Generation of the runtime whose info event leads the batch
    pub runtime_generation: Option<u64>,
}

#[derive(Debug)]
pub(crate) struct SessionState {
    buffer: Vec<Event>,
    execution_id: Option<String>,
    runtime: RuntimeState,
    runtime_generation: u64,
    lifecycle: Lifecycle,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            execution_id: None,
            runtime: RuntimeState::Unset,
            runtime_generation: 0,
            lifecycle: Lifecycle::Active,
        }
    }

    /// Append in arrival order, returning the new buffer length
    pub fn push(&mut self, event: Event) -> usize {
        self.buffer.push(event);
        self.buffer.len()
    }

    /// Append the session-end event and move to `Ended`, once.
    /// Returns the new buffer length, or `None` if the session already ended.
    pub fn end(&mut self, event: Event) -> Option<usize> {
        match self.lifecycle {
            Lifecycle::Ended => None,
            Lifecycle::Active => {
                self.lifecycle = Lifecycle::Ended;
                Some(self.push(event))
            }
        }
    }

    /// Replace the runtime wholesale; its info event goes out on the next flush
    pub fn set_runtime(&mut self, runtime: RuntimeInfo) {
        self.runtime_generation += 1;
        self.runtime = RuntimeState::Pending {
            runtime,
            generation: self.runtime_generation,
        };
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn events(&self) -> &[Event] {
        &self.buffer
    }

    pub fn execution_id(&self) -> Option<&str> {
        self.execution_id.as_deref()
    }

    pub fn runtime(&self) -> Option<&RuntimeInfo> {
        self.runtime.runtime()
    }

    pub fn runtime_state(&self) -> &RuntimeState {
        &self.runtime
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Copy the buffer into an outgoing batch without touching it.
    /// Returns `None` when there is nothing to send.
    pub fn snapshot(&self, session_id: &str) -> Option<BatchSnapshot> {
        if self.buffer.is_empty() {
            return None;
        }

        let mut events = Vec::with_capacity(self.buffer.len() + 1);
        let runtime_generation = match &self.runtime {
            RuntimeState::Pending {
                runtime,
                generation,
            } => {
                events.push(runtime.to_event());
                Some(*generation)
            }
            _ => None,
        };
        events.extend(self.buffer.iter().cloned());

        Some(BatchSnapshot {
            request: IngestRequest {
                session_id: session_id.to_string(),
                events,
                execution_id: self.execution_id.clone(),
                runtime: self.runtime.runtime().cloned(),
            },
            buffered: self.buffer.len(),
            runtime_generation,
        })
    }

    /// Apply a delivered batch: drop exactly its events from the front of the
    /// buffer, adopt the first execution id seen, and mark runtime-info as
    /// emitted unless the runtime was replaced in the meantime.
    /// Returns the execution id if this commit stored it.
    pub fn commit(&mut self, snapshot: &BatchSnapshot, response: &Map<String, Value>) -> Option<String> {
        let delivered = snapshot.buffered.min(self.buffer.len());
        self.buffer.drain(..delivered);

        let emitted = match (&self.runtime, snapshot.runtime_generation) {
            (RuntimeState::Pending { runtime, generation }, Some(sent)) if *generation == sent => {
                Some(runtime.clone())
            }
            _ => None,
        };
        if let Some(runtime) = emitted {
            self.runtime = RuntimeState::Emitted { runtime };
        }

        if self.execution_id.is_some() {
            return None;
        }

        let execution_id = match response.get("execution_id")? {
            Value::Null => return None,
            Value::String(id) => id.clone(),
            other => other.to_string(),
        };
        self.execution_id = Some(execution_id.clone());
        Some(execution_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(seq: u64) -> Event {
        Event::builder("tool").extra("seq", seq).build()
    }

    fn response(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn test_snapshot_empty_buffer() {
        assert!(SessionState::new().snapshot("s").is_none());
    }

    #[test]
    fn test_snapshot_does_not_mutate_buffer() {
        let mut state = SessionState::new();
        state.push(event(1));
        state.push(event(2));

        let snapshot = state.snapshot("s").unwrap();
        assert_eq!(snapshot.request.events.len(), 2);
        assert_eq!(snapshot.buffered, 2);
        assert_eq!(state.len(), 2);
    }

    #[test]
    fn test_runtime_info_leads_pending_batch() {
        let mut state = SessionState::new();
        state.set_runtime(RuntimeInfo::new("anthropic", "claude-x"));
        state.push(event(1));

        let snapshot = state.snapshot("s").unwrap();
        assert_eq!(snapshot.request.events.len(), 2);
        assert_eq!(snapshot.request.events[0].subtype(), Some("runtime_info"));
        assert_eq!(snapshot.buffered, 1);
        assert_eq!(snapshot.runtime_generation, Some(1));
        assert!(snapshot.request.runtime.is_some());
    }

    #[test]
    fn test_commit_marks_runtime_emitted() {
        let mut state = SessionState::new();
        state.set_runtime(RuntimeInfo::new("anthropic", "claude-x"));
        state.push(event(1));

        let snapshot = state.snapshot("s").unwrap();
        state.commit(&snapshot, &Map::new());
        assert!(matches!(state.runtime_state(), RuntimeState::Emitted { .. }));

        state.push(event(2));
        let snapshot = state.snapshot("s").unwrap();
        assert_eq!(snapshot.request.events.len(), 1);
        assert_eq!(snapshot.runtime_generation, None);
        // Still sent alongside every batch
        assert!(snapshot.request.runtime.is_some());
    }

    #[test]
    fn test_runtime_replaced_during_flush_stays_pending() {
        let mut state = SessionState::new();
        state.set_runtime(RuntimeInfo::new("anthropic", "claude-x"));
        state.push(event(1));
        let snapshot = state.snapshot("s").unwrap();

        state.set_runtime(RuntimeInfo::new("openai", "gpt-4"));
        state.commit(&snapshot, &Map::new());

        match state.runtime_state() {
            RuntimeState::Pending { runtime, generation } => {
                assert_eq!(runtime.provider, "openai");
                assert_eq!(*generation, 2);
            }
            other => panic!("expected pending runtime, got {other:?}"),
        }
    }

    #[test]
    fn test_commit_keeps_events_appended_after_snapshot() {
        let mut state = SessionState::new();
        state.push(event(1));
        state.push(event(2));
        let snapshot = state.snapshot("s").unwrap();

        state.push(event(3));
        state.commit(&snapshot, &Map::new());

        assert_eq!(state.len(), 1);
        assert_eq!(state.events()[0].get("seq"), Some(&json!(3)));
    }

    #[test]
    fn test_execution_id_is_set_once() {
        let mut state = SessionState::new();
        state.push(event(1));
        let snapshot = state.snapshot("s").unwrap();
        let stored = state.commit(&snapshot, &response(json!({"execution_id": "exec-1"})));
        assert_eq!(stored.as_deref(), Some("exec-1"));

        state.push(event(2));
        let snapshot = state.snapshot("s").unwrap();
        assert_eq!(snapshot.request.execution_id.as_deref(), Some("exec-1"));
        let stored = state.commit(&snapshot, &response(json!({"execution_id": "exec-2"})));
        assert_eq!(stored, None);
        assert_eq!(state.execution_id(), Some("exec-1"));
    }

    #[test]
    fn test_missing_or_null_execution_id_is_ignored() {
        let mut state = SessionState::new();
        state.push(event(1));
        let snapshot = state.snapshot("s").unwrap();
        assert_eq!(state.commit(&snapshot, &response(json!({"execution_id": null}))), None);
        assert_eq!(state.execution_id(), None);
    }

    #[test]
    fn test_end_transitions_once() {
        let mut state = SessionState::new();
        assert_eq!(state.end(event(1)), Some(1));
        assert_eq!(state.lifecycle(), Lifecycle::Ended);
        assert_eq!(state.end(event(2)), None);
        assert_eq!(state.len(), 1);
    }
}
