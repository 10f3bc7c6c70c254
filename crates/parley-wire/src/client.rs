//! HTTP client for the orchestrator's streaming endpoints

use std::time::Duration;

use crate::{
    decoder::{EventStream, decode_stream},
    error::{Error, Result},
    requests::{Endpoint, OutgoingRequest},
};

/// Orchestrator endpoints and connection settings
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the orchestrator (e.g. "http://localhost:3001")
    pub base_url: String,
    /// Path that opens a new turn
    pub chat_path: String,
    /// Path receiving clarification, selection and preview answers
    pub respond_path: String,
    /// Path receiving plan decisions
    pub plan_approval_path: String,
    /// Timeout for establishing a connection
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3001".to_string(),
            chat_path: "/api/chat/stream".to_string(),
            respond_path: "/api/chat/respond".to_string(),
            plan_approval_path: "/api/chat/plan-approval".to_string(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl ClientConfig {
    /// Create a config for an orchestrator base URL with default paths
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Full URL for an endpoint
    pub fn url_for(&self, endpoint: Endpoint) -> String {
        let path = match endpoint {
            Endpoint::Chat => &self.chat_path,
            Endpoint::Respond => &self.respond_path,
            Endpoint::PlanApproval => &self.plan_approval_path,
        };
        join_url(&self.base_url, path)
    }
}

/// Join a base URL and a path with exactly one slash between them
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Client that opens event streams against the orchestrator
#[derive(Debug, Clone)]
pub struct AgentClient {
    client: reqwest::Client,
    config: ClientConfig,
}

impl AgentClient {
    /// Create a new client
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.base_url.trim().is_empty() {
            return Err(Error::InvalidConfig("orchestrator base URL is empty".into()));
        }
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Send a request and decode the streamed response.
    ///
    /// A non-success status is returned as [`Error::Status`] before any event
    /// is produced.
    pub async fn stream(&self, request: &OutgoingRequest) -> Result<EventStream> {
        let url = self.config.url_for(request.endpoint());
        tracing::debug!("Opening {} stream: {}", request.label(), url);

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::status(status.as_u16(), body));
        }

        Ok(decode_stream(response.bytes_stream()))
    }

    /// Probe an agent's health endpoint
    pub async fn health(&self, agent_url: &str) -> Result<serde_json::Value> {
        let url = join_url(agent_url, "/health");
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::status(status.as_u16(), body));
        }
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|_| Error::UnexpectedResponse(text))
    }
}
