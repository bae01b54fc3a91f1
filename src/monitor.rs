//! Cycle orchestration: fetch, extract, diff, notify and commit, one site at a time.

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{Config, SiteProfile};
use crate::detect::new_records;
use crate::error::{DeliveryError, MonitorError, StorageError};
use crate::extractor::{dedupe, extract};
use crate::fetch::{fetch_with_retry, FetchOptions, PageFetcher};
use crate::models::SiteKey;
use crate::notifier::{DeliveryReceipt, Notifier};
use crate::storage::StateStore;

/// What happened to one site during a cycle.
#[derive(Debug)]
pub enum SiteReport {
    Disabled,
    /// Nothing usable was extracted; stored state is left untouched.
    Empty,
    Checked {
        found: usize,
        new: usize,
        /// `None` when there was nothing new to send.
        delivery: Option<Result<DeliveryReceipt, DeliveryError>>,
    },
}

#[derive(Debug, Default)]
pub struct CycleReport {
    pub sites: Vec<(String, Result<SiteReport, MonitorError>)>,
    /// True when the cycle stopped early on cancellation.
    pub cancelled: bool,
}

impl CycleReport {
    pub fn new_notices(&self) -> usize {
        self.sites
            .iter()
            .map(|(_, r)| match r {
                Ok(SiteReport::Checked { new, .. }) => *new,
                _ => 0,
            })
            .sum()
    }

    pub fn failures(&self) -> usize {
        self.sites.iter().filter(|(_, r)| r.is_err()).count()
    }
}

pub struct Monitor {
    config: Arc<Config>,
    fetcher: Box<dyn PageFetcher>,
    store: Box<dyn StateStore>,
    notifier: Notifier,
    last_delivery: Option<DeliveryReceipt>,
}

impl Monitor {
    pub fn new(
        config: Arc<Config>,
        fetcher: Box<dyn PageFetcher>,
        store: Box<dyn StateStore>,
        notifier: Notifier,
    ) -> Self {
        Self {
            config,
            fetcher,
            store,
            notifier,
            last_delivery: None,
        }
    }

    pub fn store(&self) -> &dyn StateStore {
        self.store.as_ref()
    }

    pub fn last_delivery(&self) -> Option<&DeliveryReceipt> {
        self.last_delivery.as_ref()
    }

    /// Check one site. State is committed after the notification attempt,
    /// whatever its outcome.
    pub async fn check_site(&mut self, site: &SiteProfile) -> Result<SiteReport, MonitorError> {
        if !site.enabled {
            return Ok(SiteReport::Disabled);
        }

        info!("Checking {}...", site.name);

        let options = FetchOptions::for_site(site);
        let markup = fetch_with_retry(
            self.fetcher.as_ref(),
            &site.url,
            &options,
            self.config.fetch_attempts,
            self.config.fetch_retry_pause(),
        )
        .await?;

        let records = match extract(&markup, site) {
            Ok(records) => records,
            Err(e) => {
                error!("{}: extraction failed: {}", site.name, e);
                return Ok(SiteReport::Empty);
            }
        };

        let before = records.len();
        let records = dedupe(records);
        if records.len() < before {
            info!("Deduplicated: {} -> {} (-{})", before, records.len(), before - records.len());
        }

        if records.is_empty() {
            warn!("{}: no notices found", site.name);
            return Ok(SiteReport::Empty);
        }

        let key = SiteKey::from_url(&site.url);
        let previous = self.store.load(&key).await?.fingerprints();
        let fresh = new_records(&records, &previous);
        let new = fresh.len();

        let delivery = if fresh.is_empty() {
            info!("{}: no new notices", site.name);
            None
        } else {
            info!("{}: {} new notices found", site.name, new);
            let result = self.notifier.notify(&site.name, fresh).await;
            if let Ok(receipt) = &result {
                self.last_delivery = Some(receipt.clone());
            }
            Some(result)
        };

        let fingerprints = records.iter().map(|r| r.fingerprint.clone()).collect();
        self.store.commit(&key, fingerprints).await?;

        if delivery.is_some() {
            if let Err(e) = self.store.flush().await {
                warn!("Interim state save failed: {}", e);
            }
        }

        Ok(SiteReport::Checked {
            found: records.len(),
            new,
            delivery,
        })
    }

    /// One pass over every configured site, then a state flush.
    pub async fn run_once(&mut self) -> Result<CycleReport, StorageError> {
        self.run_cycle(&CancellationToken::new()).await
    }

    async fn run_cycle(&mut self, cancel: &CancellationToken) -> Result<CycleReport, StorageError> {
        info!(
            "--- Starting check cycle at {} ---",
            Local::now().format("%Y-%m-%d %H:%M:%S")
        );

        let config = Arc::clone(&self.config);
        let mut report = CycleReport::default();

        for (index, site) in config.sites.iter().enumerate() {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            if index > 0 && !self.pause(config.site_pause(), cancel).await {
                report.cancelled = true;
                break;
            }

            let result = self.check_site(site).await;
            if let Err(e) = &result {
                error!("Site check failed for {}: {}", site.name, e);
            }
            report.sites.push((site.name.clone(), result));
        }

        self.store.flush().await?;
        info!(
            "Check cycle completed: {} new notices, {} failed sites",
            report.new_notices(),
            report.failures()
        );
        Ok(report)
    }

    /// Run cycles every `check_interval` until `cancel` fires, then flush
    /// state and release the rendering resource.
    pub async fn run_continuous(&mut self, cancel: CancellationToken) -> Result<(), StorageError> {
        info!("Continuous monitoring started (interval: {}s)", self.config.check_interval);
        let recycle_every = self.config.driver_recycle_every;
        let mut cycles: u64 = 0;

        while !cancel.is_cancelled() {
            let wait = match self.run_cycle(&cancel).await {
                Ok(_) => {
                    cycles += 1;
                    if recycle_every > 0 && cycles % recycle_every == 0 {
                        info!("Cycle {} reached, recycling renderer", cycles);
                        self.fetcher.recycle();
                    }
                    self.config.check_interval()
                }
                Err(e) => {
                    error!("Unexpected error during cycle: {}", e);
                    self.config.error_backoff()
                }
            };

            if cancel.is_cancelled() {
                break;
            }
            info!("Next check in {}s", wait.as_secs());
            if !self.pause(wait, &cancel).await {
                break;
            }
        }

        info!("Monitoring stopped");
        self.shutdown().await
    }

    /// Flush state and drop rendering resources.
    pub async fn shutdown(&mut self) -> Result<(), StorageError> {
        self.fetcher.recycle();
        self.store.flush().await
    }

    /// Sleep for `duration`; false if cancelled first.
    async fn pause(&self, duration: Duration, cancel: &CancellationToken) -> bool {
        if duration.is_zero() {
            return !cancel.is_cancelled();
        }
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = sleep(duration) => true,
        }
    }
}
