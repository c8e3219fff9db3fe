//! Tallyflow ledger consumer.
//!
//! Joins the consumer group and materializes ledger entries until SIGINT or
//! SIGTERM, then drains the in-flight record and closes the broker client.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use tallyflow_core::retry::RetryPolicy;
use tallyflow_docstore::MongoLedgerStore;
use tallyflow_messaging::{Connection, RedisStreamsConsumer};
use tallyflow_services::{ConsumerSettings, LedgerConsumer, connect_with_retry};
use tallyflow_shared::AppConfig;
use tallyflow_shared::config::LogConfig;

fn init_tracing(log: &LogConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        log.filter
            .as_deref()
            .unwrap_or("tallyflow=debug")
            .into()
    });
    let registry = tracing_subscriber::registry().with(filter);
    if log.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;
    init_tracing(&config.log);

    let policy = RetryPolicy::from(&config.supervisor);

    let store = Arc::new(
        connect_with_retry("ledger store", &policy, || {
            MongoLedgerStore::connect(&config.document_store)
        })
        .await?,
    );
    let connection = Arc::new(
        connect_with_retry("broker", &policy, || {
            RedisStreamsConsumer::connect(&config.broker)
        })
        .await?,
    );

    let handle = LedgerConsumer::new(
        connection.clone(),
        store,
        ConsumerSettings::from(&config.broker),
    )
    .spawn();
    let mut states = handle.watch_state();

    tokio::select! {
        () = shutdown_signal() => info!("Shutdown signal received, draining"),
        _ = states.wait_for(|state| state.is_terminal()) => warn!("Consumer stopped on its own"),
    }

    let result = handle.shutdown().await;
    connection.close().await?;

    let stats = result?;
    info!(
        written = stats.written,
        duplicates = stats.duplicates,
        dead_lettered = stats.dead_lettered,
        "Ledger consumer exited"
    );
    Ok(())
}
