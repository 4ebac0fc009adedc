//! Test doubles for the transport boundary

use crate::transport::{IngestRequest, Transport, TransportError, TransportResponse};
use async_trait::async_trait;
use mockall::mock;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use surfa_core::Event;
use tokio::sync::Notify;
use tokio::time::Instant;

mock! {
    pub IngestTransport {}

    #[async_trait]
    impl Transport for IngestTransport {
        async fn send(
            &self,
            request: &IngestRequest,
        ) -> std::result::Result<TransportResponse, TransportError>;
    }
}

/// Requests seen by a transport, with the (paused-clock) time they arrived
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<(Instant, IngestRequest)>>>);

impl CallLog {
    pub fn record(&self, request: &IngestRequest) {
        self.0.lock().unwrap().push((Instant::now(), request.clone()));
    }

    pub fn calls(&self) -> Vec<(Instant, IngestRequest)> {
        self.0.lock().unwrap().clone()
    }

    pub fn requests(&self) -> Vec<IngestRequest> {
        self.calls().into_iter().map(|(_, request)| request).collect()
    }
}

/// Mock answering with `statuses` in order (repeating the last one). 2xx
/// answers carry `success_body`, everything else an empty body.
pub fn scripted_transport(statuses: Vec<u16>, success_body: Value) -> (MockIngestTransport, CallLog) {
    let log = CallLog::default();
    let recorder = log.clone();
    let body = success_body.to_string();
    let mut index = 0;

    let mut transport = MockIngestTransport::new();
    transport.expect_send().returning(move |request| {
        recorder.record(request);
        let status = statuses[index.min(statuses.len() - 1)];
        index += 1;
        let body = if (200..300).contains(&status) { body.clone() } else { String::new() };
        Ok(TransportResponse::new(status, body))
    });

    (transport, log)
}

pub fn request_with(event_count: usize) -> IngestRequest {
    IngestRequest {
        session_id: "session-test".to_string(),
        events: (0..event_count)
            .map(|i| Event::builder("tool").extra("seq", i).build())
            .collect(),
        execution_id: None,
        runtime: None,
    }
}

/// Never answers
pub struct StalledTransport;

#[async_trait]
impl Transport for StalledTransport {
    async fn send(
        &self,
        _request: &IngestRequest,
    ) -> std::result::Result<TransportResponse, TransportError> {
        futures::future::pending().await
    }
}

/// Holds each request until released, so tests can act while a flush is in flight
#[derive(Default)]
pub struct GatedTransport {
    pub entered: Notify,
    pub release: Notify,
    pub log: CallLog,
}

#[async_trait]
impl Transport for GatedTransport {
    async fn send(
        &self,
        request: &IngestRequest,
    ) -> std::result::Result<TransportResponse, TransportError> {
        self.log.record(request);
        self.entered.notify_one();
        self.release.notified().await;
        Ok(TransportResponse::new(200, r#"{"execution_id": "exec-gated"}"#))
    }
}
