//! Buffered ingest client
//!
//! Tracking calls append validated events to an in-memory buffer. Reaching
//! `flush_at` buffered events flushes synchronously before the tracking call
//! returns; `flush` can also be called directly, and `close`/`scoped` flush
//! whatever is left at teardown.
//!
//! A flush copies the buffer under the buffer lock, releases it for the
//! network round trip (retries and backoff included), and on success takes
//! the lock again to drop exactly the delivered events. Events tracked while
//! the request is in flight stay buffered for the next batch. Flushes are
//! serialized by a separate async gate so two batches never overlap.

use crate::config::ClientConfig;
use crate::retry::send_with_retry;
use crate::session::{Lifecycle, RuntimeState, SessionState};
use crate::transport::{HttpTransport, Transport};
use futures::FutureExt;
use serde_json::{Map, Value};
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use surfa_core::{Error, Event, Extra, Result, RuntimeInfo, factory, util};
use tracing::{debug, info, instrument, warn};

/// Client for ingesting live traffic events to Surfa.
///
/// Cheap to clone; clones share the same session, buffer and transport.
#[derive(Clone)]
pub struct IngestClient {
    inner: Arc<Inner>,
}

struct Inner {
    config: ClientConfig,
    session_id: String,
    transport: Arc<dyn Transport>,
    state: Mutex<SessionState>,
    flush_gate: tokio::sync::Mutex<()>,
}

impl IngestClient {
    /// Create a client delivering over HTTP
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let transport = Arc::new(HttpTransport::new(&config)?);
        Ok(Self::build(config, transport))
    }

    /// Create a client delivering through a custom transport
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, transport))
    }

    fn build(mut config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        config.api_url = config.base_url().to_string();
        let session_id = util::generate_session_id();

        info!(
            session_id = %session_id,
            api_url = %config.api_url,
            flush_at = config.flush_at,
            "Initialized ingest client"
        );

        Self {
            inner: Arc::new(Inner {
                config,
                session_id,
                transport,
                state: Mutex::new(SessionState::new()),
                flush_gate: tokio::sync::Mutex::new(()),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn session_id(&self) -> &str {
        &self.inner.session_id
    }

    /// Server-assigned execution id, once the first successful flush reported one
    pub fn execution_id(&self) -> Option<String> {
        self.state().execution_id().map(str::to_string)
    }

    pub fn buffer_len(&self) -> usize {
        self.state().len()
    }

    /// Copy of the pending events, oldest first
    pub fn buffered_events(&self) -> Vec<Event> {
        self.state().events().to_vec()
    }

    pub fn runtime(&self) -> Option<RuntimeInfo> {
        self.state().runtime().cloned()
    }

    /// Whether the next flush will lead with a runtime-info event
    pub fn runtime_info_pending(&self) -> bool {
        matches!(self.state().runtime_state(), RuntimeState::Pending { .. })
    }

    pub fn is_session_ended(&self) -> bool {
        self.state().lifecycle() == Lifecycle::Ended
    }

    /// Replace the runtime metadata for this session.
    ///
    /// The snapshot is sent with every batch from now on, and a
    /// `runtime`/`runtime_info` event leads the next successful batch.
    pub fn set_runtime(&self, runtime: RuntimeInfo) {
        info!(
            provider = %runtime.provider,
            model = %runtime.model,
            mode = ?runtime.mode,
            "Set runtime metadata"
        );
        self.state().set_runtime(runtime);
    }

    /// Validate and buffer an event, flushing if the buffer is full
    pub async fn track(&self, event: Event) -> Result<()> {
        event.validate()?;
        debug!(kind = event.kind(), subtype = ?event.subtype(), "Tracking event");

        let len = self.state().push(event);
        self.flush_if_full(len).await
    }

    /// Validate and buffer a raw JSON object
    pub async fn track_raw(&self, value: Value) -> Result<()> {
        self.track(Event::try_from(value)?).await
    }

    async fn flush_if_full(&self, len: usize) -> Result<()> {
        let flush_at = self.inner.config.flush_at;
        debug!(buffer_len = len, flush_at, "Buffered event");

        if len >= flush_at {
            debug!(buffer_len = len, flush_at, "Buffer full, auto-flushing");
            self.flush().await?;
        }
        Ok(())
    }

    pub async fn session_start(&self, extra: Extra) -> Result<()> {
        self.track(factory::session_started(extra)).await
    }

    /// Track the session end. Only the first call records an event.
    pub async fn session_end(&self, extra: Extra) -> Result<()> {
        let ended = self.state().end(factory::session_ended(extra));
        let Some(len) = ended else {
            return Ok(());
        };

        info!(session_id = %self.inner.session_id, "Session ended");
        self.flush_if_full(len).await
    }

    pub async fn tool_started(
        &self,
        tool_name: &str,
        args: Option<Value>,
        correlation_id: Option<String>,
        extra: Extra,
    ) -> Result<()> {
        self.track(factory::tool_call_started(tool_name, args, correlation_id, extra))
            .await
    }

    pub async fn tool_completed(
        &self,
        tool_name: &str,
        result: Option<Value>,
        latency_ms: Option<u64>,
        correlation_id: Option<String>,
        extra: Extra,
    ) -> Result<()> {
        self.track(factory::tool_call_completed(
            tool_name,
            result,
            latency_ms,
            correlation_id,
            extra,
        ))
        .await
    }

    pub async fn tool_failed(
        &self,
        tool_name: &str,
        error: Option<String>,
        latency_ms: Option<u64>,
        correlation_id: Option<String>,
        extra: Extra,
    ) -> Result<()> {
        self.track(factory::tool_call_failed(
            tool_name,
            error,
            latency_ms,
            correlation_id,
            extra,
        ))
        .await
    }

    pub async fn custom_event(&self, kind: &str, subtype: Option<String>, extra: Extra) -> Result<()> {
        self.track(factory::custom(kind, subtype, extra)).await
    }

    /// Deliver the buffered events as one batch.
    ///
    /// Returns `Ok(None)` when there is nothing to send, otherwise the parsed
    /// response body (empty if it was not a JSON object). On error the buffer
    /// and session state are left exactly as they were.
    #[instrument(skip(self), fields(session_id = %self.inner.session_id))]
    pub async fn flush(&self) -> Result<Option<Map<String, Value>>> {
        let _gate = self.inner.flush_gate.lock().await;

        let snapshot = self.state().snapshot(&self.inner.session_id);
        let Some(snapshot) = snapshot else {
            debug!("No events to flush");
            return Ok(None);
        };

        if snapshot.runtime_generation.is_some() {
            debug!("Injecting runtime_info event");
        }
        info!(
            event_count = snapshot.request.events.len(),
            api_url = %self.inner.config.api_url,
            execution_id = ?snapshot.request.execution_id,
            "Flushing events"
        );

        let response = send_with_retry(
            self.inner.transport.as_ref(),
            &snapshot.request,
            &self.inner.config.retry,
            self.inner.config.timeout(),
        )
        .await
        .inspect_err(|e| {
            warn!(
                error = %e,
                retryable = e.is_retryable(),
                buffered = snapshot.buffered,
                "Flush failed, events kept for the next attempt"
            );
        })?;

        let data = parse_response_body(&response.body);
        let stored = self.state().commit(&snapshot, &data);
        if let Some(execution_id) = stored {
            info!(execution_id = %execution_id, "Stored execution id");
        }

        info!(event_count = snapshot.buffered, status = response.status, "Successfully flushed events");
        Ok(Some(data))
    }

    /// Best-effort teardown: end the session and flush what is left.
    /// Failures are logged, never returned.
    pub async fn close(&self) {
        debug!(session_id = %self.inner.session_id, "Closing ingest client");

        match self.teardown().await {
            Ok(()) => {}
            Err(TeardownFailure::SessionEnd(e)) => {
                warn!(
                    error = %e,
                    buffer_len = self.buffer_len(),
                    "Session end auto-flush failed during teardown, final flush skipped"
                );
            }
            Err(TeardownFailure::FinalFlush(e)) => {
                warn!(
                    error = %e,
                    buffer_len = self.buffer_len(),
                    "Final flush failed during teardown"
                );
            }
        }
    }

    async fn teardown(&self) -> std::result::Result<(), TeardownFailure> {
        self.session_end(Extra::new())
            .await
            .map_err(TeardownFailure::SessionEnd)?;
        self.flush().await.map_err(TeardownFailure::FinalFlush)?;
        Ok(())
    }

    /// Run `body` with this client, then [`close`](Self::close) it.
    ///
    /// The body's output is returned unchanged, and a panic in the body is
    /// resumed after teardown.
    pub async fn scoped<F, Fut, T>(self, body: F) -> T
    where
        F: FnOnce(IngestClient) -> Fut,
        Fut: Future<Output = T>,
    {
        let outcome = AssertUnwindSafe(body(self.clone())).catch_unwind().await;
        self.close().await;

        match outcome {
            Ok(value) => value,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

/// Teardown step that failed
#[derive(Debug)]
enum TeardownFailure {
    SessionEnd(Error),
    FinalFlush(Error),
}

impl fmt::Debug for IngestClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestClient")
            .field("session_id", &self.inner.session_id)
            .field("buffer_size", &self.buffer_len())
            .finish()
    }
}

/// Parse a success body; anything but a JSON object yields an empty map
fn parse_response_body(body: &str) -> Map<String, Value> {
    if body.trim().is_empty() {
        return Map::new();
    }

    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(data)) => data,
        Ok(_) | Err(_) => {
            warn!("Failed to parse JSON response");
            Map::new()
        }
    }
}
