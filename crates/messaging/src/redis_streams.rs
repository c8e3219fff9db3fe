//! Redis Streams adapters (durable, at-least-once delivery).
//!
//! - **Produce**: `MULTI / XADD / EXEC`, fields `key` and `payload`
//! - **Consume**: `XREADGROUP` with a fixed consumer group
//! - **Redelivery**: this consumer's pending entries are re-claimed with
//!   `XCLAIM`, which also bumps their delivery counter
//! - **Dead letters**: `XADD <stream>:dlq` plus `XACK`, in one transaction
//!
//! Every command is bounded by the configured command deadline.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use redis::streams::{
    StreamClaimReply, StreamId, StreamPendingCountReply, StreamReadOptions, StreamReadReply,
};
use tracing::{debug, info, instrument, warn};

use tallyflow_shared::config::BrokerConfig;

use crate::connection::{Connection, ConsumerConnection, ProducerConnection, Record};
use crate::error::BrokerError;

/// Field carrying the record key.
pub const KEY_FIELD: &str = "key";

/// Field carrying the serialized event.
pub const PAYLOAD_FIELD: &str = "payload";

/// Opens a managed connection and verifies it with `PING`.
async fn open(url: &str, deadline: Duration) -> Result<ConnectionManager, BrokerError> {
    let client =
        redis::Client::open(url).map_err(|e| BrokerError::Connection(e.to_string()))?;
    let mut conn = bounded(deadline, "connect", ConnectionManager::new(client)).await?;
    ping(&mut conn, deadline).await?;
    Ok(conn)
}

async fn ping(conn: &mut ConnectionManager, deadline: Duration) -> Result<(), BrokerError> {
    let _: String = bounded(deadline, "PING", redis::cmd("PING").query_async(conn)).await?;
    Ok(())
}

/// Runs a redis future under a deadline.
async fn bounded<T, F>(deadline: Duration, op: &'static str, fut: F) -> Result<T, BrokerError>
where
    F: Future<Output = redis::RedisResult<T>>,
{
    tokio::time::timeout(deadline, fut)
        .await
        .map_err(|_| BrokerError::Timeout(op))?
        .map_err(BrokerError::from)
}

/// Runs `XGROUP CREATE` under a deadline; an existing group counts as joined.
///
/// Returns true if this call created the group.
async fn ensure_group<F>(deadline: Duration, create: F) -> Result<bool, BrokerError>
where
    F: Future<Output = redis::RedisResult<()>>,
{
    let created = tokio::time::timeout(deadline, create)
        .await
        .map_err(|_| BrokerError::Timeout("XGROUP CREATE"))?;
    match created {
        Ok(()) => Ok(true),
        Err(e) if e.code() == Some("BUSYGROUP") => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Producer half: appends transaction events to the stream.
pub struct RedisStreamsProducer {
    conn: ConnectionManager,
    stream: String,
    deadline: Duration,
    closed: AtomicBool,
}

impl RedisStreamsProducer {
    /// Connects to the broker and verifies the connection.
    pub async fn connect(config: &BrokerConfig) -> Result<Self, BrokerError> {
        let conn = open(&config.url, config.command_timeout()).await?;
        info!(stream = %config.stream, "Connected broker producer");
        Ok(Self {
            conn,
            stream: config.stream.clone(),
            deadline: config.command_timeout(),
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> Result<(), BrokerError> {
        if self.closed.load(Ordering::Acquire) {
            Err(BrokerError::Closed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Connection for RedisStreamsProducer {
    async fn ping(&self) -> Result<(), BrokerError> {
        self.ensure_open()?;
        let mut conn = self.conn.clone();
        ping(&mut conn, self.deadline).await
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
impl ProducerConnection for RedisStreamsProducer {
    #[instrument(skip(self, payload), fields(stream = %self.stream), err)]
    async fn produce(&self, key: &str, payload: &str) -> Result<String, BrokerError> {
        self.ensure_open()?;
        let mut conn = self.conn.clone();

        let mut pipe = redis::pipe();
        pipe.atomic().xadd(
            &self.stream,
            "*",
            &[(KEY_FIELD, key), (PAYLOAD_FIELD, payload)],
        );

        let (id,): (String,) = bounded(self.deadline, "XADD", pipe.query_async(&mut conn)).await?;
        debug!(record_id = %id, "Record appended");
        Ok(id)
    }
}

/// Consumer half: one member of the ledger consumer group.
pub struct RedisStreamsConsumer {
    conn: ConnectionManager,
    stream: String,
    dead_letter_stream: String,
    group: String,
    consumer: String,
    block: Duration,
    deadline: Duration,
    closed: AtomicBool,
}

impl RedisStreamsConsumer {
    /// Connects to the broker and verifies the connection.
    ///
    /// The group is joined separately by [`ConsumerConnection::subscribe`].
    pub async fn connect(config: &BrokerConfig) -> Result<Self, BrokerError> {
        let conn = open(&config.url, config.command_timeout()).await?;
        info!(
            stream = %config.stream,
            group = %config.consumer_group,
            consumer = %config.consumer_name,
            "Connected broker consumer"
        );
        Ok(Self {
            conn,
            stream: config.stream.clone(),
            dead_letter_stream: config.dead_letter_stream(),
            group: config.consumer_group.clone(),
            consumer: config.consumer_name.clone(),
            block: config.block(),
            deadline: config.command_timeout(),
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> Result<(), BrokerError> {
        if self.closed.load(Ordering::Acquire) {
            Err(BrokerError::Closed)
        } else {
            Ok(())
        }
    }

    /// Re-claims entries delivered to this consumer but never acknowledged.
    async fn claim_pending(
        &self,
        conn: &mut ConnectionManager,
        max: usize,
    ) -> Result<Vec<Record>, BrokerError> {
        let pending: StreamPendingCountReply = bounded(
            self.deadline,
            "XPENDING",
            conn.xpending_consumer_count(&self.stream, &self.group, "-", "+", max, &self.consumer),
        )
        .await?;

        if pending.ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<&str> = pending.ids.iter().map(|p| p.id.as_str()).collect();
        let claimed: StreamClaimReply = bounded(
            self.deadline,
            "XCLAIM",
            conn.xclaim(&self.stream, &self.group, &self.consumer, 0, &ids[..]),
        )
        .await?;

        // XCLAIM counts the claim itself as a delivery.
        let records = claimed
            .ids
            .iter()
            .map(|entry| {
                let previous = pending
                    .ids
                    .iter()
                    .find(|p| p.id == entry.id)
                    .map_or(0, |p| p.times_delivered);
                to_record(entry, u64::try_from(previous).unwrap_or(u64::MAX).saturating_add(1))
            })
            .collect();

        Ok(records)
    }

    async fn read_new(
        &self,
        conn: &mut ConnectionManager,
        max: usize,
    ) -> Result<Vec<Record>, BrokerError> {
        let block_ms = usize::try_from(self.block.as_millis()).unwrap_or(usize::MAX);
        let options = StreamReadOptions::default()
            .group(&self.group, &self.consumer)
            .count(max)
            .block(block_ms);

        let reply: Option<StreamReadReply> = bounded(
            self.deadline + self.block,
            "XREADGROUP",
            conn.xread_options(&[&self.stream], &[">"], &options),
        )
        .await?;

        Ok(reply
            .into_iter()
            .flat_map(|r| r.keys)
            .flat_map(|k| k.ids)
            .map(|entry| to_record(&entry, 1))
            .collect())
    }
}

/// Converts a delivered stream entry.
///
/// The entry already sits in the pending list, so one without a payload is
/// still handed over (empty) and settles through the dead-letter cap.
fn to_record(entry: &StreamId, delivery_count: u64) -> Record {
    let payload = entry.get::<String>(PAYLOAD_FIELD).unwrap_or_else(|| {
        warn!(record_id = %entry.id, "Stream entry has no payload field");
        String::new()
    });
    Record {
        id: entry.id.clone(),
        key: entry.get::<String>(KEY_FIELD).unwrap_or_default(),
        payload,
        delivery_count,
    }
}

#[async_trait]
impl Connection for RedisStreamsConsumer {
    async fn ping(&self) -> Result<(), BrokerError> {
        self.ensure_open()?;
        let mut conn = self.conn.clone();
        ping(&mut conn, self.deadline).await
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
impl ConsumerConnection for RedisStreamsConsumer {
    async fn subscribe(&self) -> Result<(), BrokerError> {
        self.ensure_open()?;
        let mut conn = self.conn.clone();

        let created = ensure_group(
            self.deadline,
            conn.xgroup_create_mkstream(&self.stream, &self.group, "0"),
        )
        .await?;
        if created {
            info!(group = %self.group, "Created consumer group");
        }
        Ok(())
    }

    async fn poll(&self, max: usize) -> Result<Vec<Record>, BrokerError> {
        self.ensure_open()?;
        let mut conn = self.conn.clone();

        let pending = self.claim_pending(&mut conn, max).await?;
        if !pending.is_empty() {
            return Ok(pending);
        }
        self.read_new(&mut conn, max).await
    }

    async fn commit(&self, record: &Record) -> Result<(), BrokerError> {
        self.ensure_open()?;
        let mut conn = self.conn.clone();
        let _: i64 = bounded(
            self.deadline,
            "XACK",
            conn.xack(&self.stream, &self.group, &[&record.id]),
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self, record), fields(record_id = %record.id, deliveries = record.delivery_count), err)]
    async fn dead_letter(&self, record: &Record, reason: &str) -> Result<(), BrokerError> {
        self.ensure_open()?;
        let mut conn = self.conn.clone();

        let delivery_count = record.delivery_count.to_string();
        let failed_at = chrono::Utc::now().to_rfc3339();
        let mut pipe = redis::pipe();
        pipe.atomic()
            .xadd(
                &self.dead_letter_stream,
                "*",
                &[
                    (KEY_FIELD, record.key.as_str()),
                    (PAYLOAD_FIELD, record.payload.as_str()),
                    ("original_id", record.id.as_str()),
                    ("delivery_count", delivery_count.as_str()),
                    ("reason", reason),
                    ("failed_at", failed_at.as_str()),
                ],
            )
            .xack(&self.stream, &self.group, &[&record.id]);

        let _: (String, i64) = bounded(self.deadline, "DLQ", pipe.query_async(&mut conn)).await?;
        warn!(stream = %self.dead_letter_stream, "Record moved to dead-letter stream");
        Ok(())
    }
}
