//! Outbox sweep: republishes rows whose publish was never confirmed.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use tallyflow_shared::config::OutboxConfig;

use crate::error::ServiceError;
use crate::transactions::TransactionService;

/// Result of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Rows examined.
    pub scanned: usize,
    /// Rows published and stamped.
    pub republished: usize,
    /// Rows that failed again and stay queued.
    pub failed: usize,
    /// Rows that can never produce an event, now marked `failed`.
    pub abandoned: usize,
}

/// Periodically republishes stale unpublished transactions.
pub struct OutboxSweeper {
    service: TransactionService,
    interval: Duration,
    threshold: TimeDelta,
    batch_size: u64,
}

impl OutboxSweeper {
    /// Creates a sweeper from configuration.
    #[must_use]
    pub fn new(service: TransactionService, config: &OutboxConfig) -> Self {
        Self {
            service,
            interval: Duration::from_secs(config.interval_secs.max(1)),
            threshold: i64::try_from(config.threshold_secs)
                .ok()
                .and_then(TimeDelta::try_seconds)
                .unwrap_or(TimeDelta::MAX),
            batch_size: config.batch_size.max(1),
        }
    }

    /// Republishes up to one batch of rows older than the threshold.
    ///
    /// Events carry the row's stored transaction id, so a row published twice
    /// still yields one ledger entry.
    pub async fn sweep_once(&self) -> Result<SweepReport, ServiceError> {
        let cutoff = Utc::now()
            .checked_sub_signed(self.threshold)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let rows = self
            .service
            .repository()
            .list_unpublished(cutoff, self.batch_size)
            .await?;

        let mut report = SweepReport {
            scanned: rows.len(),
            ..SweepReport::default()
        };
        for row in rows {
            let event = match row.to_event() {
                Ok(event) => event,
                Err(e) => {
                    error!(id = row.id, error = %e, "Unpublishable row, marking failed");
                    match self.service.repository().mark_failed(row.id).await {
                        Ok(_) => report.abandoned += 1,
                        Err(e) => {
                            warn!(id = row.id, error = %e, "Failed to mark row failed");
                            report.failed += 1;
                        }
                    }
                    continue;
                }
            };
            match self.service.publish(&event).await {
                Ok(_) => {
                    self.service.confirm_published(event.id).await;
                    report.republished += 1;
                }
                Err(e) => {
                    warn!(id = event.id, error = %e, "Republish failed");
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    /// Sweeps every interval until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            threshold_secs = self.threshold.num_seconds(),
            "Outbox sweeper started"
        );
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            match self.sweep_once().await {
                Ok(report) if report.scanned > 0 => info!(
                    scanned = report.scanned,
                    republished = report.republished,
                    failed = report.failed,
                    abandoned = report.abandoned,
                    "Outbox sweep finished"
                ),
                Ok(_) => {}
                Err(e) => error!(error = %e, "Outbox sweep failed"),
            }
        }
        info!("Outbox sweeper stopped");
    }

    /// Runs [`OutboxSweeper::run`] on its own task.
    #[must_use]
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }
}
