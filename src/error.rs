use std::time::Duration;

use thiserror::Error;

/// Page acquisition failed. Always transient from the monitor's point of view:
/// the site is skipped for the cycle.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("rendered fetch requested for {0} but no renderer is configured")]
    RendererUnavailable(String),

    #[error("renderer failed for {url} with HTTP {status}: {message}")]
    Renderer {
        url: String,
        status: u16,
        message: String,
    },
}

/// The page as a whole could not be extracted.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("invalid selector `{selector}`: {message}")]
    Selector { selector: String, message: String },

    #[error("invalid site url {url}: {source}")]
    SiteUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// A single row could not be turned into a record.
#[derive(Debug, Error)]
pub enum RowError {
    #[error("cannot resolve href `{href}`: {source}")]
    Link {
        href: String,
        #[source]
        source: url::ParseError,
    },
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("no delivery path configured (bot token/channel or webhook url)")]
    NotConfigured,

    #[error("rate limited, retry after {}s", .retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    #[error("slack api error: {0}")]
    Api(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("state file io: {0}")]
    Io(#[from] std::io::Error),

    #[error("state json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("state lock poisoned")]
    Poisoned,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("config file io: {0}")]
    Io(#[from] std::io::Error),

    #[error("config json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum LockError {
    #[error("another instance is running (lock {path} held by pid {pid})")]
    Held { path: String, pid: String },

    #[error("lock file io: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure caught at the per-site boundary of a cycle.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}
