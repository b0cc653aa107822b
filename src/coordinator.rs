//! Coordinator client: the Ask round trip.
//!
//! One bounded HTTP request/response per call, no internal retries. The
//! control loop owns retry pacing; every failure here is soft from its
//! point of view.

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::config::Config;
use crate::protocol::{AskRequest, AskResult, HeartbeatInfo};

/// Coordinator API paths.
pub mod endpoints {
    /// Poll for status and work assignments.
    pub const ASK: &str = "/api/v1/agent/ask";
    /// One-shot startup notice.
    pub const STARTUP: &str = "/api/v1/agent/startup";
}

/// Failure of a single coordinator round trip.
///
/// All variants are retried at the next cycle; they are distinguished only
/// for log readability.
#[derive(Debug, Error)]
pub enum AskError {
    /// Could not reach the coordinator at all.
    #[error("transport: {0}")]
    Transport(String),
    /// The coordinator answered with a non-success HTTP status.
    #[error("coordinator returned HTTP {0}")]
    Http(u16),
    /// The response body did not match the expected shape.
    #[error("malformed response: {0}")]
    Decode(String),
}

/// One request/response exchange with the coordinator.
///
/// Implementations must bound each call (a stalled coordinator must not
/// wedge the loop) and must not retry internally.
#[async_trait]
pub trait Coordinator: Send + Sync {
    /// Poll the coordinator with the agent's current snapshot.
    async fn ask(&self, req: &AskRequest) -> Result<AskResult, AskError>;

    /// Announce that the agent process has (re)started.
    async fn report_startup(&self, heart: &HeartbeatInfo) -> Result<(), AskError>;
}

/// HTTP implementation speaking JSON to the coordinator.
pub struct HttpCoordinator {
    client: reqwest::Client,
    base_url: String,
    agent_id: String,
    secret_key: String,
}

impl HttpCoordinator {
    /// Build the client from configuration. The request timeout bounds the
    /// whole round trip.
    pub fn new(config: &Config) -> Result<Self, AskError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.ask_timeout_secs))
            .user_agent(crate::BUILD_INFO)
            .build()
            .map_err(|e| AskError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.coordinator_url.clone(),
            agent_id: config.agent_id.clone(),
            secret_key: config.secret_key.clone(),
        })
    }

    async fn post<T: serde::Serialize + Sync>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<reqwest::Response, AskError> {
        let url = endpoint_url(&self.base_url, path);
        let resp = self
            .client
            .post(&url)
            .header("X-Agent-Id", &self.agent_id)
            .header("X-Agent-Secret", &self.secret_key)
            .json(body)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AskError::Http(status.as_u16()));
        }
        Ok(resp)
    }
}

#[async_trait]
impl Coordinator for HttpCoordinator {
    async fn ask(&self, req: &AskRequest) -> Result<AskResult, AskError> {
        let resp = self.post(endpoints::ASK, req).await?;
        let result = resp.json::<AskResult>().await.map_err(from_reqwest)?;
        debug!(ok = result.ok, status = ?result.agent_status, "Ask round trip");
        Ok(result)
    }

    async fn report_startup(&self, heart: &HeartbeatInfo) -> Result<(), AskError> {
        self.post(endpoints::STARTUP, heart).await?;
        Ok(())
    }
}

fn endpoint_url(base: &str, path: &str) -> String {
    format!("{}{path}", base.trim_end_matches('/'))
}

fn from_reqwest(e: reqwest::Error) -> AskError {
    if e.is_decode() {
        AskError::Decode(e.to_string())
    } else {
        AskError::Transport(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_url_handles_trailing_slash() {
        assert_eq!(
            endpoint_url("https://ci.example.com/", endpoints::ASK),
            "https://ci.example.com/api/v1/agent/ask"
        );
        assert_eq!(
            endpoint_url("https://ci.example.com", endpoints::STARTUP),
            "https://ci.example.com/api/v1/agent/startup"
        );
    }

    #[test]
    fn errors_read_well_in_logs() {
        assert_eq!(
            AskError::Transport("connection refused".to_string()).to_string(),
            "transport: connection refused"
        );
        assert_eq!(AskError::Http(503).to_string(), "coordinator returned HTTP 503");
        assert!(AskError::Decode("eof".to_string())
            .to_string()
            .starts_with("malformed response"));
    }
}
