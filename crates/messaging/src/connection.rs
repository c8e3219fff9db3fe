//! Broker capability traits.

use async_trait::async_trait;

use crate::error::BrokerError;

/// A record delivered to a consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Broker-assigned id, used for acknowledgement.
    pub id: String,
    /// Partitioning key; the transaction id for transaction events.
    pub key: String,
    /// Serialized event.
    pub payload: String,
    /// How many times this record has been delivered, including this one.
    pub delivery_count: u64,
}

/// Liveness and lifecycle shared by every broker handle.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Round-trips a command to the broker.
    async fn ping(&self) -> Result<(), BrokerError>;

    /// Returns false once [`Connection::close`] has been called.
    fn is_connected(&self) -> bool;

    /// Stops accepting commands. Idempotent.
    async fn close(&self) -> Result<(), BrokerError>;
}

/// Publishing capability.
#[async_trait]
pub trait ProducerConnection: Connection {
    /// Appends one record inside a broker transaction.
    ///
    /// Either the record is durably appended and its id returned, or nothing
    /// is appended.
    async fn produce(&self, key: &str, payload: &str) -> Result<String, BrokerError>;
}

/// Consuming capability for one member of a consumer group.
#[async_trait]
pub trait ConsumerConnection: Connection {
    /// Joins the consumer group, creating it and the stream if absent.
    async fn subscribe(&self) -> Result<(), BrokerError>;

    /// Returns up to `max` records.
    ///
    /// Records delivered earlier but never acknowledged come first; new
    /// records are read only when none are pending.
    async fn poll(&self, max: usize) -> Result<Vec<Record>, BrokerError>;

    /// Acknowledges a record so it is never redelivered.
    async fn commit(&self, record: &Record) -> Result<(), BrokerError>;

    /// Copies a record to the dead-letter stream and acknowledges it.
    async fn dead_letter(&self, record: &Record, reason: &str) -> Result<(), BrokerError>;
}
