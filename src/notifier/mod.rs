pub mod blocks;
pub mod slack;

pub use blocks::{render, Block, SlackMessage, TextObject, MAX_BLOCKS};
pub use slack::{post_with_backoff, BotChannel, DeliveryChannel, WebhookChannel};

use tracing::{error, info, warn};

use crate::config::{Config, DisplayOptions, WEBHOOK_PLACEHOLDER};
use crate::error::DeliveryError;
use crate::fetch::create_client;
use crate::models::{CategoryGrouping, NoticeRecord, NotificationBatch};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryPath {
    Primary,
    Secondary,
}

/// Where a message went and the identifier Slack gave it, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    pub path: DeliveryPath,
    pub id: Option<String>,
}

/// Groups, renders and delivers new notices. The bot channel is tried
/// first, the webhook is the fallback.
pub struct Notifier {
    primary: Option<Box<dyn DeliveryChannel>>,
    secondary: Option<Box<dyn DeliveryChannel>>,
    display: DisplayOptions,
    grouping: CategoryGrouping,
}

impl Notifier {
    pub fn new(
        primary: Option<Box<dyn DeliveryChannel>>,
        secondary: Option<Box<dyn DeliveryChannel>>,
        display: DisplayOptions,
        grouping: CategoryGrouping,
    ) -> Self {
        Self {
            primary,
            secondary,
            display,
            grouping,
        }
    }

    pub fn from_config(config: &Config) -> reqwest::Result<Self> {
        let http = create_client(&config.user_agent, config.request_timeout())?;

        let token = config.slack_bot_token.as_deref().filter(|t| !t.trim().is_empty());
        let channel = config.slack_channel_id.as_deref().filter(|c| !c.trim().is_empty());
        let primary = match (token, channel) {
            (Some(token), Some(channel)) => Some(Box::new(BotChannel::new(
                http.clone(),
                &config.slack_api_base,
                token,
                channel,
            )) as Box<dyn DeliveryChannel>),
            _ => None,
        };

        let secondary = config
            .slack_webhook_url
            .as_deref()
            .filter(|url| !url.trim().is_empty() && *url != WEBHOOK_PLACEHOLDER)
            .map(|url| Box::new(WebhookChannel::new(http, url)) as Box<dyn DeliveryChannel>);

        if primary.is_none() && secondary.is_none() {
            warn!("No Slack delivery path configured (bot token/channel or webhook url)");
        }

        Ok(Self::new(primary, secondary, config.display(), config.grouping()))
    }

    pub fn batch(&self, site_name: &str, records: Vec<NoticeRecord>) -> NotificationBatch {
        NotificationBatch::new(site_name, records, &self.grouping)
    }

    pub fn render(&self, batch: &NotificationBatch) -> SlackMessage {
        render(batch, self.display)
    }

    /// Deliver via the primary channel, falling back to the secondary one.
    pub async fn deliver(&self, message: &SlackMessage) -> Result<DeliveryReceipt, DeliveryError> {
        let mut last_error = None;

        if let Some(primary) = &self.primary {
            match post_with_backoff(primary.as_ref(), message).await {
                Ok(id) => {
                    info!(
                        "Slack ({}) delivery done (ts={})",
                        primary.name(),
                        id.as_deref().unwrap_or("-")
                    );
                    return Ok(DeliveryReceipt {
                        path: DeliveryPath::Primary,
                        id,
                    });
                }
                Err(e) => {
                    error!("Slack ({}) delivery failed: {}", primary.name(), e);
                    last_error = Some(e);
                }
            }
        }

        if let Some(secondary) = &self.secondary {
            return match post_with_backoff(secondary.as_ref(), message).await {
                Ok(id) => {
                    info!("Slack ({}) delivery done", secondary.name());
                    Ok(DeliveryReceipt {
                        path: DeliveryPath::Secondary,
                        id,
                    })
                }
                Err(e) => {
                    error!("Slack ({}) delivery failed: {}", secondary.name(), e);
                    Err(e)
                }
            };
        }

        Err(last_error.unwrap_or(DeliveryError::NotConfigured))
    }

    /// Group, render and deliver `records` for `site_name`.
    pub async fn notify(
        &self,
        site_name: &str,
        records: Vec<NoticeRecord>,
    ) -> Result<DeliveryReceipt, DeliveryError> {
        let batch = self.batch(site_name, records);
        let message = self.render(&batch);
        let result = self.deliver(&message).await;
        if result.is_ok() {
            info!("Slack notification sent for {}: {} notices", site_name, batch.len());
        }
        result
    }
}
