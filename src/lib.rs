//! Notice board monitoring: scrape configured boards, detect notices not seen
//! before and post them to Slack.

pub mod config;
pub mod detect;
pub mod error;
pub mod extractor;
pub mod fetch;
pub mod lock;
pub mod models;
pub mod monitor;
pub mod notifier;
pub mod parsers;
pub mod storage;

pub use config::{Config, SiteProfile};
pub use error::MonitorError;
pub use monitor::{CycleReport, Monitor, SiteReport};
