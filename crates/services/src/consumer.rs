//! Ledger consumer worker.
//!
//! One task per process polls the broker and handles records strictly in
//! order, one at a time. A record is acknowledged only after its entry is
//! written (or found already written); anything else leaves it pending for
//! redelivery until the dead-letter cap is reached.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use tallyflow_core::consumer::{ConsumerState, DeadLetterPolicy, FailureAction};
use tallyflow_core::ledger::LedgerEntry;
use tallyflow_core::transaction::TransactionEvent;
use tallyflow_docstore::{InsertOutcome, LedgerStore};
use tallyflow_messaging::{ConsumerConnection, Record};
use tallyflow_shared::config::BrokerConfig;

use crate::error::ServiceError;

/// Poll loop tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumerSettings {
    /// Records requested per poll.
    pub batch_size: usize,
    /// Sleep after an empty poll.
    pub idle_backoff: Duration,
    /// Sleep after a batch with a failed record, or a failed poll.
    pub retry_backoff: Duration,
    /// Redelivery cap.
    pub dead_letter: DeadLetterPolicy,
}

impl From<&BrokerConfig> for ConsumerSettings {
    fn from(config: &BrokerConfig) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            idle_backoff: config.idle_backoff(),
            retry_backoff: config.retry_backoff(),
            dead_letter: DeadLetterPolicy::new(u64::from(config.max_deliveries)),
        }
    }
}

/// What happened to one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// A new entry was written.
    Written,
    /// An entry for the transaction already existed.
    Duplicate,
    /// Gave up on the record and moved it to the dead-letter stream.
    DeadLettered,
}

/// Counters returned when the worker exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConsumerStats {
    /// Entries written.
    pub written: u64,
    /// Records skipped as already materialized.
    pub duplicates: u64,
    /// Records moved to the dead-letter stream.
    pub dead_lettered: u64,
    /// Failed attempts left for redelivery.
    pub failures: u64,
}

impl ConsumerStats {
    fn record(&mut self, outcome: RecordOutcome) {
        match outcome {
            RecordOutcome::Written => self.written += 1,
            RecordOutcome::Duplicate => self.duplicates += 1,
            RecordOutcome::DeadLettered => self.dead_lettered += 1,
        }
    }
}

/// Materializes ledger entries from transaction events.
pub struct LedgerConsumer {
    connection: Arc<dyn ConsumerConnection>,
    store: Arc<dyn LedgerStore>,
    settings: ConsumerSettings,
}

impl LedgerConsumer {
    /// Creates a consumer; nothing runs until [`LedgerConsumer::spawn`].
    #[must_use]
    pub fn new(
        connection: Arc<dyn ConsumerConnection>,
        store: Arc<dyn LedgerStore>,
        settings: ConsumerSettings,
    ) -> Self {
        Self {
            connection,
            store,
            settings,
        }
    }

    /// Starts the poll loop on its own task.
    #[must_use]
    pub fn spawn(self) -> ConsumerHandle {
        let (state_tx, state_rx) = watch::channel(ConsumerState::Disconnected);
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let task = tokio::spawn(async move { self.run(state_tx, token).await });

        ConsumerHandle {
            state: state_rx,
            cancel,
            task,
        }
    }

    async fn run(
        self,
        state: watch::Sender<ConsumerState>,
        cancel: CancellationToken,
    ) -> Result<ConsumerStats, ServiceError> {
        advance(&state, ConsumerState::Connecting)?;
        let joined = tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            joined = self.connection.subscribe() => Some(joined),
        };
        match joined {
            Some(Ok(())) => advance(&state, ConsumerState::Polling)?,
            Some(Err(e)) => {
                error!(error = %e, "Failed to join consumer group");
                finish(&state)?;
                return Err(e.into());
            }
            None => {
                finish(&state)?;
                return Ok(ConsumerStats::default());
            }
        }
        info!(batch_size = self.settings.batch_size, "Ledger consumer polling");

        let mut stats = ConsumerStats::default();
        while !cancel.is_cancelled() {
            let polled = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                polled = self.connection.poll(self.settings.batch_size) => polled,
            };

            let records = match polled {
                Ok(records) if records.is_empty() => {
                    pause(&cancel, self.settings.idle_backoff).await;
                    continue;
                }
                Ok(records) => records,
                Err(e) => {
                    warn!(error = %e, "Poll failed");
                    pause(&cancel, self.settings.retry_backoff).await;
                    continue;
                }
            };

            advance(&state, ConsumerState::Processing)?;
            let mut failed = false;
            for record in &records {
                if self.handle(record, &mut stats).await.is_err() {
                    stats.failures += 1;
                    failed = true;
                }
                if cancel.is_cancelled() {
                    break;
                }
            }
            advance(&state, ConsumerState::Polling)?;

            if failed {
                pause(&cancel, self.settings.retry_backoff).await;
            }
        }

        finish(&state)?;
        info!(
            written = stats.written,
            duplicates = stats.duplicates,
            dead_lettered = stats.dead_lettered,
            failures = stats.failures,
            "Ledger consumer stopped"
        );
        Ok(stats)
    }

    /// Processes one record and settles it with the broker.
    ///
    /// Returns an error only when the record stays pending. The outcome is
    /// counted as soon as the store settles it, so a write followed by a
    /// failed acknowledge still counts as written.
    async fn handle(
        &self,
        record: &Record,
        stats: &mut ConsumerStats,
    ) -> Result<(), ServiceError> {
        match self.materialize(record).await {
            Ok(outcome) => {
                stats.record(outcome);
                self.connection.commit(record).await.inspect_err(|e| {
                    warn!(record_id = %record.id, error = %e, "Acknowledge failed");
                })?;
                debug!(record_id = %record.id, ?outcome, "Record acknowledged");
                Ok(())
            }
            Err(err) => match self.settings.dead_letter.on_failure(record.delivery_count) {
                FailureAction::Redeliver => {
                    warn!(
                        record_id = %record.id,
                        key = %record.key,
                        delivery_count = record.delivery_count,
                        error = %err,
                        "Record failed, leaving for redelivery"
                    );
                    Err(err)
                }
                FailureAction::DeadLetter => {
                    error!(
                        record_id = %record.id,
                        key = %record.key,
                        delivery_count = record.delivery_count,
                        error = %err,
                        "Record exhausted its deliveries, dead-lettering"
                    );
                    self.connection
                        .dead_letter(record, &err.to_string())
                        .await?;
                    stats.record(RecordOutcome::DeadLettered);
                    Ok(())
                }
            },
        }
    }

    async fn materialize(&self, record: &Record) -> Result<RecordOutcome, ServiceError> {
        let event = TransactionEvent::from_payload(&record.payload)?;
        if self.store.exists(event.transaction_id).await? {
            debug!(transaction_id = %event.transaction_id, "Entry already present");
            return Ok(RecordOutcome::Duplicate);
        }

        let entry = LedgerEntry::from_event(&event, Utc::now());
        match self.store.insert(&entry).await? {
            InsertOutcome::Inserted => {
                info!(
                    transaction_id = %event.transaction_id,
                    account_id = %entry.account_id,
                    amount = %entry.amount,
                    "Ledger entry written"
                );
                Ok(RecordOutcome::Written)
            }
            InsertOutcome::AlreadyPresent => Ok(RecordOutcome::Duplicate),
        }
    }
}

fn advance(
    state: &watch::Sender<ConsumerState>,
    next: ConsumerState,
) -> Result<(), ServiceError> {
    let current = *state.borrow();
    let next = current.transition(next)?;
    state.send_replace(next);
    Ok(())
}

fn finish(state: &watch::Sender<ConsumerState>) -> Result<(), ServiceError> {
    advance(state, ConsumerState::ShuttingDown)?;
    advance(state, ConsumerState::Closed)
}

/// Sleeps for `duration` unless cancelled first.
async fn pause(cancel: &CancellationToken, duration: Duration) {
    tokio::select! {
        () = cancel.cancelled() => {}
        () = tokio::time::sleep(duration) => {}
    }
}

/// Owner's handle on a running [`LedgerConsumer`].
#[derive(Debug)]
pub struct ConsumerHandle {
    state: watch::Receiver<ConsumerState>,
    cancel: CancellationToken,
    task: JoinHandle<Result<ConsumerStats, ServiceError>>,
}

impl ConsumerHandle {
    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConsumerState {
        *self.state.borrow()
    }

    /// A receiver that observes every state change.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConsumerState> {
        self.state.clone()
    }

    /// Returns true if the task has exited on its own.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancels the loop and waits for the in-flight record to settle.
    pub async fn shutdown(self) -> Result<ConsumerStats, ServiceError> {
        self.cancel.cancel();
        self.join().await
    }

    /// Waits for the task without cancelling it.
    pub async fn join(self) -> Result<ConsumerStats, ServiceError> {
        self.task
            .await
            .map_err(|e| ServiceError::Task(e.to_string()))?
    }
}
