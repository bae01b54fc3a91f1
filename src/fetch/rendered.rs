use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::FetchError;
use crate::fetch::{create_client, FetchOptions, PageFetcher};

/// Extra time granted on top of the element wait for the render itself.
const RENDER_OVERHEAD: Duration = Duration::from_secs(20);

/// Browser-rendered fetch through a Browserless-style `/content` endpoint.
pub struct RenderedFetcher {
    base_url: String,
    token: Option<String>,
    user_agent: String,
    timeout: Duration,
    client: Mutex<Client>,
}

impl RenderedFetcher {
    pub fn new(
        base_url: &str,
        token: Option<&str>,
        user_agent: &str,
        timeout: Duration,
    ) -> reqwest::Result<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()).map(String::from),
            user_agent: user_agent.to_string(),
            timeout,
            client: Mutex::new(create_client(user_agent, timeout)?),
        })
    }

    fn endpoint(&self) -> String {
        let mut endpoint = format!("{}/content", self.base_url);
        if let Some(token) = &self.token {
            endpoint.push_str(&format!("?token={token}"));
        }
        endpoint
    }

    fn client(&self) -> Client {
        match self.client.lock() {
            Ok(client) => client.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl PageFetcher for RenderedFetcher {
    async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<String, FetchError> {
        let mut body = json!({ "url": url });
        if let Some(selector) = &options.wait_selector {
            body["waitForSelector"] = json!({
                "selector": selector,
                "timeout": options.wait_timeout.as_millis() as u64,
            });
        }

        debug!("Rendering {} via {}", url, self.base_url);
        let request_error = |source| FetchError::Request {
            url: url.to_string(),
            source,
        };

        let response = self
            .client()
            .post(self.endpoint())
            .timeout(options.wait_timeout + RENDER_OVERHEAD)
            .json(&body)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(FetchError::Renderer {
                url: url.to_string(),
                status: status.as_u16(),
                message,
            });
        }

        response.text().await.map_err(request_error)
    }

    fn recycle(&self) {
        let fresh = match create_client(&self.user_agent, self.timeout) {
            Ok(fresh) => fresh,
            Err(e) => {
                warn!("Keeping rendering client, rebuild failed: {}", e);
                return;
            }
        };

        let mut client = match self.client.lock() {
            Ok(client) => client,
            Err(poisoned) => poisoned.into_inner(),
        };
        *client = fresh;
        info!("Rendering client recycled");
    }
}
