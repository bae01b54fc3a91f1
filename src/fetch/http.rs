use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use std::time::Duration;
use tracing::debug;

use crate::error::FetchError;
use crate::fetch::{FetchOptions, PageFetcher};

pub fn create_client(user_agent: &str, timeout: Duration) -> reqwest::Result<Client> {
    ClientBuilder::new()
        .user_agent(user_agent)
        .timeout(timeout)
        .pool_max_idle_per_host(2)
        .build()
}

/// Plain GET of the page markup.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, _options: &FetchOptions) -> Result<String, FetchError> {
        let request_error = |source| FetchError::Request {
            url: url.to_string(),
            source,
        };

        let response = self.client.get(url).send().await.map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(request_error)?;
        debug!("GET {} -> {} ({} bytes)", url, status, body.len());
        Ok(body)
    }
}
