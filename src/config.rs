use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use url::Url;

use crate::error::ConfigError;
use crate::models::CategoryGrouping;

/// Webhook value shipped in a freshly bootstrapped config; treated as unset.
pub const WEBHOOK_PLACEHOLDER: &str = "YOUR_SLACK_WEBHOOK_URL_HERE";

const ENV_PREFIX: &str = "NOTICE_MONITOR";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(alias = "websites")]
    pub sites: Vec<SiteProfile>,
    /// Seconds between scan cycles.
    pub check_interval: u64,
    pub user_agent: String,

    pub slack_webhook_url: Option<String>,
    pub slack_bot_token: Option<String>,
    pub slack_channel_id: Option<String>,
    pub slack_api_base: String,
    pub slack_show_date: bool,
    pub slack_show_views: bool,

    pub category_priority: Vec<String>,
    pub empty_category_label: Option<String>,

    /// Cycles after which the rendering fetcher is recycled; 0 disables.
    pub driver_recycle_every: u64,
    pub browserless_url: Option<String>,
    pub browserless_token: Option<String>,

    pub site_pause_secs: u64,
    pub fetch_attempts: u32,
    pub fetch_retry_pause_secs: u64,
    pub request_timeout_secs: u64,
    pub error_backoff_secs: u64,

    pub state_backend: StateBackend,
    pub state_file: PathBuf,
    pub lock_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteProfile {
    pub name: String,
    pub url: String,
    /// Selector matching one element per notice row.
    pub selector: String,
    #[serde(default)]
    pub category_selector: Option<String>,
    #[serde(default = "default_anchor_selector")]
    pub title_selector: String,
    #[serde(default = "default_anchor_selector")]
    pub link_selector: String,
    #[serde(default)]
    pub date_selector: Option<String>,
    #[serde(default)]
    pub views_selector: Option<String>,
    #[serde(default = "default_take_count", alias = "max_items")]
    pub take_count: usize,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, alias = "use_selenium")]
    pub uses_rendered_fetch: bool,
    #[serde(default)]
    pub wait_selector: Option<String>,
    /// Seconds to wait for `wait_selector` when rendering.
    #[serde(default = "default_wait_timeout")]
    pub wait_timeout: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateBackend {
    #[default]
    Json,
    Sqlite,
}

/// Which metadata fields appear under each notice line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayOptions {
    pub show_date: bool,
    pub show_views: bool,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            show_date: true,
            show_views: true,
        }
    }
}

fn default_anchor_selector() -> String {
    "a".to_string()
}

fn default_take_count() -> usize {
    20
}

fn default_true() -> bool {
    true
}

fn default_wait_timeout() -> u64 {
    10
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sites: Vec::new(),
            check_interval: 300,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            slack_webhook_url: None,
            slack_bot_token: None,
            slack_channel_id: None,
            slack_api_base: "https://slack.com/api".to_string(),
            slack_show_date: true,
            slack_show_views: true,
            category_priority: ["입학", "장학", "학사", "BK비교과", "기타"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            empty_category_label: None,
            driver_recycle_every: 200,
            browserless_url: None,
            browserless_token: None,
            site_pause_secs: 2,
            fetch_attempts: 2,
            fetch_retry_pause_secs: 1,
            request_timeout_secs: 10,
            error_backoff_secs: 60,
            state_backend: StateBackend::Json,
            state_file: PathBuf::from("data/previous_data.json"),
            lock_file: PathBuf::from("run/instance.lock"),
        }
    }
}

impl SiteProfile {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout)
    }
}

impl Config {
    /// Load the JSON config at `path`, writing a default one first if it does
    /// not exist, then apply `NOTICE_MONITOR_*` and well-known env overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            Self::write_bootstrap(path)?;
            info!("Configuration file created at {}", path.display());
        }

        let mut config: Config = config::Config::builder()
            .add_source(config::File::from(path).format(config::FileFormat::Json))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Config written when none exists: one disabled-by-placeholder example site.
    pub fn bootstrap() -> Self {
        Self {
            sites: vec![SiteProfile {
                name: "Example site".to_string(),
                url: "https://example.com/notice".to_string(),
                selector: ".notice-list li".to_string(),
                category_selector: None,
                title_selector: default_anchor_selector(),
                link_selector: default_anchor_selector(),
                date_selector: None,
                views_selector: None,
                take_count: default_take_count(),
                enabled: true,
                uses_rendered_fetch: false,
                wait_selector: Some(".notice-list".to_string()),
                wait_timeout: default_wait_timeout(),
            }],
            slack_webhook_url: Some(WEBHOOK_PLACEHOLDER.to_string()),
            ..Self::default()
        }
    }

    fn write_bootstrap(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let body = serde_json::to_string_pretty(&Self::bootstrap())?;
        std::fs::write(path, body)?;
        Ok(())
    }

    /// Apply `SLACK_WEBHOOK_URL`, `SLACK_BOT_TOKEN`, `SLACK_CHANNEL_ID` and
    /// `USER_AGENT` from `lookup`, ignoring empty values.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get("SLACK_WEBHOOK_URL") {
            self.slack_webhook_url = Some(url);
        }
        if let Some(token) = get("SLACK_BOT_TOKEN") {
            self.slack_bot_token = Some(token);
        }
        if let Some(channel) = get("SLACK_CHANNEL_ID") {
            self.slack_channel_id = Some(channel);
        }
        if let Some(agent) = get("USER_AGENT") {
            self.user_agent = agent;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.check_interval == 0 {
            return Err(ConfigError::Invalid("check_interval must be positive".into()));
        }
        if self.fetch_attempts == 0 {
            return Err(ConfigError::Invalid("fetch_attempts must be at least 1".into()));
        }
        for site in &self.sites {
            if site.name.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("site {} has no name", site.url)));
            }
            Url::parse(&site.url).map_err(|e| {
                ConfigError::Invalid(format!(
                    "site '{}' has invalid url {}: {}",
                    site.name, site.url, e
                ))
            })?;
        }
        Ok(())
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval)
    }

    pub fn site_pause(&self) -> Duration {
        Duration::from_secs(self.site_pause_secs)
    }

    pub fn fetch_retry_pause(&self) -> Duration {
        Duration::from_secs(self.fetch_retry_pause_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_secs(self.error_backoff_secs)
    }

    pub fn grouping(&self) -> CategoryGrouping {
        CategoryGrouping {
            priority: self.category_priority.clone(),
            empty_label: self
                .empty_category_label
                .clone()
                .filter(|label| !label.trim().is_empty()),
        }
    }

    pub fn display(&self) -> DisplayOptions {
        DisplayOptions {
            show_date: self.slack_show_date,
            show_views: self.slack_show_views,
        }
    }

    pub fn site(&self, name: &str) -> Option<&SiteProfile> {
        self.sites.iter().find(|s| s.name == name)
    }
}
