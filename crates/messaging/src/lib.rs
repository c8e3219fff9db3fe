//! Broker access for Tallyflow.
//!
//! Producers and consumers are separate capabilities:
//! - [`ProducerConnection`] appends records atomically
//! - [`ConsumerConnection`] joins a group, polls, acknowledges, and dead-letters
//!
//! Both extend [`Connection`] for liveness and shutdown. Redis Streams is the
//! production transport; [`memory::InMemoryBroker`] backs tests.

pub mod connection;
pub mod error;
pub mod memory;
pub mod redis_streams;

pub use connection::{Connection, ConsumerConnection, ProducerConnection, Record};
pub use error::BrokerError;
pub use memory::InMemoryBroker;
pub use redis_streams::{RedisStreamsConsumer, RedisStreamsProducer};
