use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::DeliveryError;
use crate::notifier::SlackMessage;

/// Wait used when a rate-limit response carries no usable `Retry-After`.
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(5);

/// Upper bound on any single rate-limit wait.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// One way of getting a message into Slack.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    fn name(&self) -> &'static str;

    /// Send once. Returns the delivery identifier when the channel has one.
    async fn post(&self, message: &SlackMessage) -> Result<Option<String>, DeliveryError>;
}

/// Send through `channel`; on a rate limit wait as told and try exactly once
/// more. A second rate limit is returned as the error.
pub async fn post_with_backoff(
    channel: &dyn DeliveryChannel,
    message: &SlackMessage,
) -> Result<Option<String>, DeliveryError> {
    match channel.post(message).await {
        Err(DeliveryError::RateLimited { retry_after }) => {
            let wait = retry_after.min(MAX_RETRY_AFTER);
            warn!(
                "Slack {} rate limited, retrying once in {}s",
                channel.name(),
                wait.as_secs()
            );
            sleep(wait).await;
            channel.post(message).await
        }
        other => other,
    }
}

fn retry_after(headers: &HeaderMap) -> Duration {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_RETRY_AFTER)
}

#[derive(Debug, Deserialize)]
struct PostMessageResponse {
    ok: bool,
    #[serde(default)]
    ts: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Bot-token `chat.postMessage` to a channel id.
pub struct BotChannel {
    http: Client,
    api_base: String,
    token: String,
    channel: String,
}

impl BotChannel {
    pub fn new(http: Client, api_base: &str, token: &str, channel: &str) -> Self {
        Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.to_string(),
            channel: channel.to_string(),
        }
    }
}

#[async_trait]
impl DeliveryChannel for BotChannel {
    fn name(&self) -> &'static str {
        "bot"
    }

    async fn post(&self, message: &SlackMessage) -> Result<Option<String>, DeliveryError> {
        let payload = json!({
            "channel": self.channel,
            "text": message.text,
            "blocks": message.blocks,
        });

        let response = self
            .http
            .post(format!("{}/chat.postMessage", self.api_base))
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(DeliveryError::RateLimited {
                retry_after: retry_after(response.headers()),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let wait = retry_after(response.headers());
        let body: PostMessageResponse = response.json().await?;
        if body.ok {
            return Ok(body.ts);
        }

        match body.error.as_deref() {
            Some("ratelimited") => Err(DeliveryError::RateLimited { retry_after: wait }),
            Some(error) => Err(DeliveryError::Api(error.to_string())),
            None => Err(DeliveryError::Api("unknown error".to_string())),
        }
    }
}

/// Incoming-webhook POST to a pre-shared URL.
pub struct WebhookChannel {
    http: Client,
    url: String,
}

impl WebhookChannel {
    pub fn new(http: Client, url: &str) -> Self {
        Self {
            http,
            url: url.to_string(),
        }
    }
}

#[async_trait]
impl DeliveryChannel for WebhookChannel {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn post(&self, message: &SlackMessage) -> Result<Option<String>, DeliveryError> {
        let response = self.http.post(&self.url).json(message).send().await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(DeliveryError::RateLimited {
                retry_after: retry_after(response.headers()),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(DeliveryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        info!("Slack webhook accepted message");
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn retry_after_parses_seconds_or_defaults() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after(&headers), DEFAULT_RETRY_AFTER);

        headers.insert(RETRY_AFTER, HeaderValue::from_static("2"));
        assert_eq!(retry_after(&headers), Duration::from_secs(2));

        headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert_eq!(retry_after(&headers), DEFAULT_RETRY_AFTER);
    }
}
