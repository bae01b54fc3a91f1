use async_trait::async_trait;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, warn};

use crate::config::{Config, SiteProfile};
use crate::error::FetchError;

mod http;
mod rendered;

pub use http::{create_client, HttpFetcher};
pub use rendered::RenderedFetcher;

/// How a page should be acquired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    pub rendered: bool,
    pub wait_selector: Option<String>,
    pub wait_timeout: Duration,
}

impl FetchOptions {
    pub fn for_site(site: &SiteProfile) -> Self {
        Self {
            rendered: site.uses_rendered_fetch,
            wait_selector: site.wait_selector.clone(),
            wait_timeout: site.wait_timeout(),
        }
    }
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            rendered: false,
            wait_selector: None,
            wait_timeout: Duration::from_secs(10),
        }
    }
}

#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<String, FetchError>;

    /// Drop any long-lived rendering resources; they are rebuilt on demand.
    fn recycle(&self) {}
}

/// Routes each fetch to the plain HTTP or the rendering fetcher.
pub struct SiteFetcher {
    http: HttpFetcher,
    rendered: Option<RenderedFetcher>,
}

impl SiteFetcher {
    pub fn new(http: HttpFetcher, rendered: Option<RenderedFetcher>) -> Self {
        Self { http, rendered }
    }

    pub fn from_config(config: &Config) -> reqwest::Result<Self> {
        let client = create_client(&config.user_agent, config.request_timeout())?;
        let rendered = config
            .browserless_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .map(|url| {
                RenderedFetcher::new(
                    url,
                    config.browserless_token.as_deref(),
                    &config.user_agent,
                    config.request_timeout(),
                )
            })
            .transpose()?;

        Ok(Self::new(HttpFetcher::new(client), rendered))
    }
}

#[async_trait]
impl PageFetcher for SiteFetcher {
    async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<String, FetchError> {
        if !options.rendered {
            return self.http.fetch(url, options).await;
        }

        match &self.rendered {
            Some(renderer) => renderer.fetch(url, options).await,
            None => Err(FetchError::RendererUnavailable(url.to_string())),
        }
    }

    fn recycle(&self) {
        if let Some(renderer) = &self.rendered {
            renderer.recycle();
        }
    }
}

/// Fetch `url`, making up to `attempts` tries with a fixed `pause` between them.
pub async fn fetch_with_retry(
    fetcher: &dyn PageFetcher,
    url: &str,
    options: &FetchOptions,
    attempts: u32,
    pause: Duration,
) -> Result<String, FetchError> {
    let attempts = attempts.max(1);
    let mut attempt = 1;

    loop {
        match fetcher.fetch(url, options).await {
            Ok(markup) => return Ok(markup),
            Err(e @ FetchError::RendererUnavailable(_)) => return Err(e),
            Err(e) if attempt >= attempts => {
                error!(
                    "Page request finally failed for {} after {} attempts: {}",
                    url, attempts, e
                );
                return Err(e);
            }
            Err(e) => {
                warn!("Page request failed for {} (attempt {}/{}): {}", url, attempt, attempts, e);
                attempt += 1;
                sleep(pause).await;
            }
        }
    }
}
