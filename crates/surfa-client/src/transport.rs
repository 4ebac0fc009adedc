//! Transport boundary between the flush protocol and the network

use crate::config::ClientConfig;
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use serde::Serialize;
use std::time::Duration;
use surfa_core::{Error, Event, Result, RuntimeInfo};
use tracing::debug;

/// Path of the batch ingest endpoint, relative to the API base URL
pub const INGEST_PATH: &str = "/api/v1/ingest/events";

/// Body of a batch ingest request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestRequest {
    pub session_id: String,
    pub events: Vec<Event>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<String>,
    /// Sent on every batch once set, alongside the one-time runtime-info event
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime: Option<RuntimeInfo>,
}

/// Raw answer from the ingest endpoint, any status
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Failures below the HTTP layer
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Request failed: {0}")]
    Other(String),
}

/// Delivers one batch and reports what the server answered
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        request: &IngestRequest,
    ) -> std::result::Result<TransportResponse, TransportError>;
}

/// Create a configured HTTP client
pub fn create_client(config: &ClientConfig) -> Result<Client> {
    ClientBuilder::new()
        .timeout(config.timeout())
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .user_agent(&config.user_agent)
        .build()
        .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))
}

/// `POST {api_url}/api/v1/ingest/events` with bearer authentication
pub struct HttpTransport {
    client: Client,
    endpoint: String,
    ingest_key: String,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Ok(Self {
            client: create_client(config)?,
            endpoint: format!("{}{}", config.base_url(), INGEST_PATH),
            ingest_key: config.ingest_key.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        request: &IngestRequest,
    ) -> std::result::Result<TransportResponse, TransportError> {
        debug!(
            endpoint = %self.endpoint,
            event_count = request.events.len(),
            "Sending ingest request"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.ingest_key)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(classify_reqwest_error)?;

        debug!(status, body_len = body.len(), "Received ingest response");
        Ok(TransportResponse { status, body })
    }
}

fn classify_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(err.to_string())
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Other(err.to_string())
    }
}
