use async_trait::async_trait;
use reqwest::Url;
use serde::Serialize;
use std::time::Duration;

use crate::config::Config;
use crate::error::{ClientError, RestartError};
use crate::events::{ConnectionStatus, ReplySegment};
use crate::session::SessionToken;

const WEBHOOK_PATH: &str = "/webhooks/rest/webhook";

/// Conversation agent reachable over the network.
///
/// Implementations perform exactly one request per call and never retry;
/// retrying is the controller's decision.
#[async_trait]
pub trait AgentClient: Send + Sync {
    /// Forward one user utterance and return the reply segments
    async fn send_utterance(
        &self,
        session: &SessionToken,
        text: &str,
    ) -> Result<Vec<ReplySegment>, ClientError>;

    /// Ask the agent to forget the conversation. Server-side failures are
    /// logged and reported as success.
    async fn restart_session(&self, session: &SessionToken) -> Result<(), RestartError>;

    /// Lightweight reachability probe
    async fn check_connection(&self) -> ConnectionStatus;
}

#[derive(Debug, Serialize)]
struct UtterancePayload<'a> {
    sender: &'a str,
    message: &'a str,
}

#[derive(Debug, Serialize)]
struct TrackerEvent {
    event: &'static str,
}

/// Client for a Rasa-style REST channel
#[derive(Clone)]
pub struct WebhookClient {
    base_url: String,
    client: reqwest::Client,
}

impl WebhookClient {
    pub fn new(config: &Config) -> Result<Self, ClientError> {
        Self::with_timeout(&config.base_url, config.request_timeout())
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn webhook_url(&self) -> String {
        format!("{}{}", self.base_url, WEBHOOK_PATH)
    }

    fn restart_url(&self, session: &SessionToken) -> Result<Url, RestartError> {
        let raw = format!(
            "{}/conversations/{}/tracker/events",
            self.base_url,
            session.as_str()
        );
        Url::parse(&raw).map_err(|e| RestartError::InvalidEndpoint {
            url: raw,
            reason: e.to_string(),
        })
    }
}

/// Decode a webhook body. `null` is read as an empty reply.
pub fn decode_reply(body: &str) -> Result<Vec<ReplySegment>, ClientError> {
    let segments: Option<Vec<ReplySegment>> =
        serde_json::from_str(body).map_err(|e| ClientError::Decode(e.to_string()))?;
    Ok(segments.unwrap_or_default())
}

#[async_trait]
impl AgentClient for WebhookClient {
    async fn send_utterance(
        &self,
        session: &SessionToken,
        text: &str,
    ) -> Result<Vec<ReplySegment>, ClientError> {
        let payload = UtterancePayload {
            sender: session.as_str(),
            message: text,
        };

        let response = self
            .client
            .post(self.webhook_url())
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "webhook rejected utterance");
            return Err(ClientError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        let segments = decode_reply(&body)?;
        tracing::debug!(segments = segments.len(), "webhook reply received");
        Ok(segments)
    }

    async fn restart_session(&self, session: &SessionToken) -> Result<(), RestartError> {
        let url = self.restart_url(session)?;

        match self
            .client
            .put(url)
            .json(&TrackerEvent { event: "restart" })
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => {
                tracing::info!(session = %session, "agent session restarted");
            }
            Ok(response) => {
                tracing::warn!(
                    session = %session,
                    status = response.status().as_u16(),
                    "agent refused restart, continuing with local reset"
                );
            }
            Err(err) => {
                tracing::warn!(
                    session = %session,
                    error = %err,
                    "restart request failed, continuing with local reset"
                );
            }
        }

        Ok(())
    }

    async fn check_connection(&self) -> ConnectionStatus {
        match self.client.get(format!("{}/", self.base_url)).send().await {
            Ok(response) if response.status().is_success() => ConnectionStatus::Online,
            Ok(response) => {
                tracing::debug!(status = response.status().as_u16(), "health probe failed");
                ConnectionStatus::Offline
            }
            Err(err) => {
                tracing::debug!(error = %err, "health probe unreachable");
                ConnectionStatus::Offline
            }
        }
    }
}
