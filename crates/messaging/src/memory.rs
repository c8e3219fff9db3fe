//! In-process broker with consumer-group semantics.
//!
//! Mirrors the Redis Streams behavior the ledger consumer relies on:
//! unacknowledged records are handed back to the same consumer before any
//! new record, and every hand-back increments the delivery count. Failure
//! injection hooks let tests exercise publish and commit errors.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::connection::{Connection, ConsumerConnection, ProducerConnection, Record};
use crate::error::BrokerError;

#[derive(Debug, Clone)]
struct Entry {
    key: String,
    payload: String,
}

#[derive(Debug, Clone)]
struct Pending {
    consumer: String,
    deliveries: u64,
}

#[derive(Debug, Default)]
struct GroupState {
    cursor: usize,
    pending: BTreeMap<u64, Pending>,
    acknowledged: usize,
}

/// A record moved to the dead-letter stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetter {
    /// The record as last delivered.
    pub record: Record,
    /// Why processing gave up.
    pub reason: String,
}

#[derive(Debug, Default)]
struct State {
    entries: Vec<Entry>,
    groups: HashMap<String, GroupState>,
    dead_letters: Vec<DeadLetter>,
    produce_failures: usize,
    commit_failures: usize,
    poll_failures: usize,
    produce_delay: Option<Duration>,
}

/// Shared in-memory stream; hand out producer and consumer handles from it.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBroker {
    state: Arc<Mutex<State>>,
}

fn record_id(seq: u64) -> String {
    format!("{seq}-0")
}

fn seq_of(id: &str) -> Option<u64> {
    id.split('-').next()?.parse().ok()
}

impl InMemoryBroker {
    /// Creates an empty broker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A new producer handle.
    #[must_use]
    pub fn producer(&self) -> InMemoryProducer {
        InMemoryProducer {
            broker: self.clone(),
            closed: AtomicBool::new(false),
        }
    }

    /// A new consumer handle for `group` / `consumer`.
    #[must_use]
    pub fn consumer(&self, group: &str, consumer: &str) -> InMemoryConsumer {
        InMemoryConsumer {
            broker: self.clone(),
            group: group.to_string(),
            consumer: consumer.to_string(),
            closed: AtomicBool::new(false),
        }
    }

    /// `(key, payload)` of every appended record, in order.
    #[must_use]
    pub fn published(&self) -> Vec<(String, String)> {
        self.lock()
            .entries
            .iter()
            .map(|e| (e.key.clone(), e.payload.clone()))
            .collect()
    }

    /// Records moved to the dead-letter stream.
    #[must_use]
    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.lock().dead_letters.clone()
    }

    /// Delivered but unacknowledged records in `group`.
    #[must_use]
    pub fn pending_count(&self, group: &str) -> usize {
        self.lock().groups.get(group).map_or(0, |g| g.pending.len())
    }

    /// Acknowledged records in `group`, dead letters included.
    #[must_use]
    pub fn acknowledged_count(&self, group: &str) -> usize {
        self.lock().groups.get(group).map_or(0, |g| g.acknowledged)
    }

    /// Makes the next `n` produce calls fail.
    pub fn fail_next_produce(&self, n: usize) {
        self.lock().produce_failures = n;
    }

    /// Makes the next `n` commit calls fail.
    pub fn fail_next_commit(&self, n: usize) {
        self.lock().commit_failures = n;
    }

    /// Makes the next `n` poll calls fail.
    pub fn fail_next_poll(&self, n: usize) {
        self.lock().poll_failures = n;
    }

    /// Delays every produce call, for deadline tests.
    pub fn set_produce_delay(&self, delay: Option<Duration>) {
        self.lock().produce_delay = delay;
    }

    fn append(&self, key: &str, payload: &str) -> Result<String, BrokerError> {
        let mut state = self.lock();
        if state.produce_failures > 0 {
            state.produce_failures -= 1;
            return Err(BrokerError::Command("injected produce failure".into()));
        }
        state.entries.push(Entry {
            key: key.to_string(),
            payload: payload.to_string(),
        });
        Ok(record_id(state.entries.len() as u64))
    }

    fn to_record(entries: &[Entry], seq: u64, deliveries: u64) -> Option<Record> {
        let index = usize::try_from(seq).ok()?.checked_sub(1)?;
        let entry = entries.get(index)?;
        Some(Record {
            id: record_id(seq),
            key: entry.key.clone(),
            payload: entry.payload.clone(),
            delivery_count: deliveries,
        })
    }
}

/// Producer handle over an [`InMemoryBroker`].
#[derive(Debug)]
pub struct InMemoryProducer {
    broker: InMemoryBroker,
    closed: AtomicBool,
}

#[async_trait]
impl Connection for InMemoryProducer {
    async fn ping(&self) -> Result<(), BrokerError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(BrokerError::Closed)
        }
    }

    fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }

    async fn close(&self) -> Result<(), BrokerError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

#[async_trait]
impl ProducerConnection for InMemoryProducer {
    async fn produce(&self, key: &str, payload: &str) -> Result<String, BrokerError> {
        if !self.is_connected() {
            return Err(BrokerError::Closed);
        }
        let delay = self.broker.lock().produce_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.broker.append(key, payload)
    }
}

/// Consumer handle over an [`InMemoryBroker`].
#[derive(Debug)]
pub struct InMemoryConsumer {
    broker: InMemoryBroker,
    group: String,
    consumer: String,
    closed: AtomicBool,
}

#[async_trait]
impl Connection for InMemoryConsumer {
    async fn ping(&self) -> Result<(), BrokerError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(BrokerError::Closed)
        }
    }

    fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }

    async fn close(&self) -> Result<(), BrokerError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

#[async_trait]
impl ConsumerConnection for InMemoryConsumer {
    async fn subscribe(&self) -> Result<(), BrokerError> {
        if !self.is_connected() {
            return Err(BrokerError::Closed);
        }
        self.broker
            .lock()
            .groups
            .entry(self.group.clone())
            .or_default();
        Ok(())
    }

    async fn poll(&self, max: usize) -> Result<Vec<Record>, BrokerError> {
        if !self.is_connected() {
            return Err(BrokerError::Closed);
        }
        let mut guard = self.broker.lock();
        let state = &mut *guard;
        if state.poll_failures > 0 {
            state.poll_failures -= 1;
            return Err(BrokerError::Connection("injected poll failure".into()));
        }
        let group = state
            .groups
            .get_mut(&self.group)
            .ok_or_else(|| BrokerError::Command(format!("NOGROUP {}", self.group)))?;

        let mut records = Vec::new();
        for (seq, pending) in &mut group.pending {
            if records.len() >= max {
                break;
            }
            if pending.consumer != self.consumer {
                continue;
            }
            pending.deliveries += 1;
            if let Some(record) = InMemoryBroker::to_record(&state.entries, *seq, pending.deliveries) {
                records.push(record);
            }
        }
        if !records.is_empty() {
            return Ok(records);
        }

        while records.len() < max && group.cursor < state.entries.len() {
            group.cursor += 1;
            let seq = group.cursor as u64;
            group.pending.insert(
                seq,
                Pending {
                    consumer: self.consumer.clone(),
                    deliveries: 1,
                },
            );
            if let Some(record) = InMemoryBroker::to_record(&state.entries, seq, 1) {
                records.push(record);
            }
        }
        Ok(records)
    }

    async fn commit(&self, record: &Record) -> Result<(), BrokerError> {
        if !self.is_connected() {
            return Err(BrokerError::Closed);
        }
        let mut state = self.broker.lock();
        if state.commit_failures > 0 {
            state.commit_failures -= 1;
            return Err(BrokerError::Command("injected commit failure".into()));
        }
        if let (Some(seq), Some(group)) = (seq_of(&record.id), state.groups.get_mut(&self.group)) {
            if group.pending.remove(&seq).is_some() {
                group.acknowledged += 1;
            }
        }
        Ok(())
    }

    async fn dead_letter(&self, record: &Record, reason: &str) -> Result<(), BrokerError> {
        if !self.is_connected() {
            return Err(BrokerError::Closed);
        }
        let mut state = self.broker.lock();
        state.dead_letters.push(DeadLetter {
            record: record.clone(),
            reason: reason.to_string(),
        });
        if let (Some(seq), Some(group)) = (seq_of(&record.id), state.groups.get_mut(&self.group)) {
            if group.pending.remove(&seq).is_some() {
                group.acknowledged += 1;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GROUP: &str = "ledger-consumer-group";

    #[tokio::test]
    async fn test_unacked_record_is_redelivered_first() {
        let broker = InMemoryBroker::new();
        let producer = broker.producer();
        let consumer = broker.consumer(GROUP, "c1");
        consumer.subscribe().await.unwrap();

        producer.produce("tx-1", "one").await.unwrap();
        producer.produce("tx-2", "two").await.unwrap();

        let first = consumer.poll(1).await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].payload, "one");
        assert_eq!(first[0].delivery_count, 1);

        let again = consumer.poll(10).await.unwrap();
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].id, first[0].id);
        assert_eq!(again[0].delivery_count, 2);

        consumer.commit(&again[0]).await.unwrap();
        let next = consumer.poll(10).await.unwrap();
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].payload, "two");
        assert_eq!(broker.acknowledged_count(GROUP), 1);
    }

    #[tokio::test]
    async fn test_dead_letter_acknowledges() {
        let broker = InMemoryBroker::new();
        let consumer = broker.consumer(GROUP, "c1");
        consumer.subscribe().await.unwrap();
        broker.producer().produce("tx-1", "bad").await.unwrap();

        let records = consumer.poll(10).await.unwrap();
        consumer.dead_letter(&records[0], "decode failed").await.unwrap();

        assert_eq!(broker.pending_count(GROUP), 0);
        assert_eq!(broker.dead_letters().len(), 1);
        assert_eq!(broker.dead_letters()[0].reason, "decode failed");
        assert!(consumer.poll(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_injected_produce_failure_appends_nothing() {
        let broker = InMemoryBroker::new();
        let producer = broker.producer();
        broker.fail_next_produce(1);

        assert!(producer.produce("tx-1", "one").await.is_err());
        assert!(broker.published().is_empty());
        assert!(producer.produce("tx-1", "one").await.is_ok());
        assert_eq!(broker.published().len(), 1);
    }

    #[tokio::test]
    async fn test_poll_without_group_fails() {
        let broker = InMemoryBroker::new();
        let consumer = broker.consumer(GROUP, "c1");
        assert!(matches!(
            consumer.poll(1).await,
            Err(BrokerError::Command(_))
        ));
    }

    #[tokio::test]
    async fn test_closed_handle_rejects_commands() {
        let broker = InMemoryBroker::new();
        let producer = broker.producer();
        producer.close().await.unwrap();

        assert!(!producer.is_connected());
        assert_eq!(producer.ping().await, Err(BrokerError::Closed));
        assert_eq!(
            producer.produce("k", "v").await,
            Err(BrokerError::Closed)
        );
    }
}
