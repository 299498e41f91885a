use crate::messages;
use crate::search::RangeSearchEngine;
use chrono::NaiveDate;
use skyfare_core::retry::{with_retry, RetryConfig};
use skyfare_core::search::select_matches;
use skyfare_core::{
    today, AlertRepository, AlertSubscription, CoreResult, NotificationSink, RangeSearchRequest,
};
use skyfare_store::app_config::{MonitorConfig, ProviderConfig, TelegramConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub poll_interval: Duration,
    pub subscription_delay: Duration,
    pub notification_cap: usize,
    pub failure_threshold: u32,
    pub delivery_retry: RetryConfig,
    pub currency: String,
    pub link_base_url: String,
}

impl MonitorSettings {
    pub fn from_config(
        monitor: &MonitorConfig,
        provider: &ProviderConfig,
        telegram: &TelegramConfig,
    ) -> Self {
        Self {
            poll_interval: Duration::from_secs(monitor.poll_interval_seconds),
            subscription_delay: Duration::from_millis(monitor.subscription_delay_ms),
            notification_cap: monitor.notification_cap,
            failure_threshold: monitor.failure_threshold,
            delivery_retry: RetryConfig::new(
                telegram.delivery_attempts,
                Duration::from_millis(telegram.delivery_base_delay_ms),
            ),
            currency: provider.currency.clone(),
            link_base_url: provider.link_base_url.clone(),
        }
    }
}

/// Counters for one monitor pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub purged: u64,
    pub checked: usize,
    pub skipped: usize,
    pub notified: usize,
    pub removed: usize,
    pub failed: usize,
}

#[derive(Debug, PartialEq, Eq)]
enum CheckOutcome {
    Skipped,
    Checked { notified: usize },
    /// The owner can no longer be reached, the subscription was deleted.
    Removed { notified: usize },
}

/// Handle to the spawned monitor task.
pub struct MonitorHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Signals cancellation and waits for the loop to finish.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            error!("Alert monitor task ended abnormally: {}", e);
        }
    }
}

/// Background loop: sweep expired alerts, re-search every live one and
/// notify owners of fares at or below their ceiling.
pub struct AlertMonitor {
    repo: Arc<dyn AlertRepository>,
    search: RangeSearchEngine,
    sink: Arc<dyn NotificationSink>,
    settings: MonitorSettings,
}

impl AlertMonitor {
    pub fn new(
        repo: Arc<dyn AlertRepository>,
        search: RangeSearchEngine,
        sink: Arc<dyn NotificationSink>,
        settings: MonitorSettings,
    ) -> Self {
        Self {
            repo,
            search,
            sink,
            settings,
        }
    }

    pub fn spawn(self, cancel: CancellationToken) -> MonitorHandle {
        let token = cancel.clone();
        let task = tokio::spawn(async move { self.run(token).await });
        MonitorHandle { cancel, task }
    }

    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            interval_secs = self.settings.poll_interval.as_secs(),
            "Alert monitor started"
        );
        let mut consecutive_failures = 0;

        while !cancel.is_cancelled() {
            match self.run_cycle(today(), &cancel).await {
                Ok(report) => {
                    consecutive_failures = 0;
                    info!(
                        purged = report.purged,
                        checked = report.checked,
                        skipped = report.skipped,
                        notified = report.notified,
                        removed = report.removed,
                        failed = report.failed,
                        "Alert monitor cycle finished"
                    );
                }
                Err(err) => {
                    consecutive_failures += 1;
                    error!(error = %err, consecutive_failures, "Alert monitor cycle failed");
                }
            }

            let pause = self.next_pause(&mut consecutive_failures);
            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                _ = cancel.cancelled() => break,
            }
        }

        info!("Alert monitor stopped");
    }

    /// Normal poll interval, or a one-off doubled interval once the failure
    /// streak reaches the threshold (the streak then starts over).
    fn next_pause(&self, consecutive_failures: &mut u32) -> Duration {
        if *consecutive_failures >= self.settings.failure_threshold {
            warn!(
                consecutive_failures = *consecutive_failures,
                "Too many failed cycles, backing off"
            );
            *consecutive_failures = 0;
            self.settings.poll_interval.saturating_mul(2)
        } else {
            self.settings.poll_interval
        }
    }

    /// One sweep-list-check pass. Only sweep or listing failures fail the
    /// cycle; a failing subscription is logged and the pass moves on.
    pub async fn run_cycle(
        &self,
        today: NaiveDate,
        cancel: &CancellationToken,
    ) -> CoreResult<CycleReport> {
        let mut report = CycleReport {
            purged: self.repo.purge_expired(today).await?,
            ..CycleReport::default()
        };
        let subscriptions = self.repo.list_all().await?;
        debug!(count = subscriptions.len(), "Checking alerts");

        for (index, subscription) in subscriptions.iter().enumerate() {
            if index > 0 {
                tokio::select! {
                    _ = tokio::time::sleep(self.settings.subscription_delay) => {}
                    _ = cancel.cancelled() => break,
                }
            }
            if cancel.is_cancelled() {
                break;
            }

            match self.check_subscription(subscription, today, cancel).await {
                Ok(CheckOutcome::Skipped) => report.skipped += 1,
                Ok(CheckOutcome::Checked { notified }) => {
                    report.checked += 1;
                    report.notified += notified;
                }
                Ok(CheckOutcome::Removed { notified }) => {
                    report.checked += 1;
                    report.removed += 1;
                    report.notified += notified;
                }
                Err(err) => {
                    report.failed += 1;
                    error!(alert_id = subscription.id, error = %err, "Alert check failed");
                }
            }
        }

        Ok(report)
    }

    async fn check_subscription(
        &self,
        subscription: &AlertSubscription,
        today: NaiveDate,
        cancel: &CancellationToken,
    ) -> CoreResult<CheckOutcome> {
        // Sweep and check can straddle midnight.
        if subscription.is_expired(today) {
            return Ok(CheckOutcome::Skipped);
        }
        let Some((start_date, end_date)) = subscription.effective_window(today) else {
            return Ok(CheckOutcome::Skipped);
        };

        let request = RangeSearchRequest {
            origin: subscription.origin.clone(),
            destination: subscription.destination.clone(),
            start_date,
            end_date,
            passengers: subscription.passengers,
        };
        let quotes = self.search.search_range_until(&request, cancel).await;
        if cancel.is_cancelled() {
            return Ok(CheckOutcome::Skipped);
        }

        let matches = select_matches(
            quotes,
            subscription.threshold_price,
            self.settings.notification_cap,
        );
        let mut notified = 0;

        for quote in &matches {
            let text = messages::fare_alert(quote, &self.settings.currency, &self.settings.link_base_url);
            let delivery = with_retry(&self.settings.delivery_retry, || {
                self.sink.send_message(subscription.owner_id, &text)
            })
            .await;

            match delivery {
                Ok(()) => notified += 1,
                Err(err) if err.is_permanent() => {
                    warn!(
                        alert_id = subscription.id,
                        owner_id = subscription.owner_id,
                        error = %err,
                        "Owner unreachable, deleting alert"
                    );
                    self.repo.delete(subscription.id).await?;
                    return Ok(CheckOutcome::Removed { notified });
                }
                Err(err) => {
                    warn!(
                        alert_id = subscription.id,
                        owner_id = subscription.owner_id,
                        error = %err,
                        "Alert notification not delivered"
                    );
                }
            }
        }

        if notified > 0 {
            info!(alert_id = subscription.id, notified, "Alert notifications sent");
        }
        Ok(CheckOutcome::Checked { notified })
    }
}
