//! Transport abstraction for opening agent event streams

use std::time::Duration;

use async_trait::async_trait;
use parley_wire::{AgentClient, EventStream, OutgoingRequest, Result};
use tokio_util::sync::CancellationToken;

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial delay between retries
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// No retries at all
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Calculate delay for a given attempt (0-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_secs =
            self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);
        Duration::from_secs_f64(delay_secs.min(self.max_delay.as_secs_f64()))
    }
}

/// Opens the event stream answering a request
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` and return the decoded events.
    ///
    /// Errors returned here happen before any event was produced.
    async fn open(&self, request: OutgoingRequest, cancel: CancellationToken)
    -> Result<EventStream>;
}

/// Transport over the orchestrator's HTTP endpoints
pub struct HttpTransport {
    client: AgentClient,
    retry_config: RetryConfig,
}

impl HttpTransport {
    pub fn new(client: AgentClient) -> Self {
        Self {
            client,
            retry_config: RetryConfig::default(),
        }
    }

    /// Set retry configuration
    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    pub fn client(&self) -> &AgentClient {
        &self.client
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn open(
        &self,
        request: OutgoingRequest,
        cancel: CancellationToken,
    ) -> Result<EventStream> {
        let mut attempt = 0u32;
        loop {
            if cancel.is_cancelled() {
                return Err(parley_wire::Error::Aborted);
            }

            match self.client.stream(&request).await {
                Ok(stream) => return Ok(stream),
                Err(e) if e.is_retryable() && attempt < self.retry_config.max_retries => {
                    let delay = self.retry_config.delay_for_attempt(attempt);
                    tracing::warn!(
                        "Opening {} stream failed (attempt {}/{}): {}. Retrying in {:?}...",
                        request.label(),
                        attempt + 1,
                        self.retry_config.max_retries + 1,
                        e,
                        delay
                    );
                    attempt += 1;
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(parley_wire::Error::Aborted),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}
