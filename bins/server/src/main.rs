//! Tallyflow API Server
//!
//! Serves the HTTP API and runs the outbox sweeper.

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use tallyflow_api::{AppState, create_router};
use tallyflow_core::retry::RetryPolicy;
use tallyflow_docstore::MongoLedgerStore;
use tallyflow_messaging::{Connection, RedisStreamsProducer};
use tallyflow_services::{OutboxSweeper, connect_with_retry};
use tallyflow_shared::AppConfig;
use tallyflow_shared::config::LogConfig;

fn init_tracing(log: &LogConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        log.filter
            .as_deref()
            .unwrap_or("tallyflow=debug,tower_http=debug")
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
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;
    init_tracing(&config.log);

    let policy = RetryPolicy::from(&config.supervisor);

    let db = connect_with_retry("database", &policy, || async {
        let db = tallyflow_db::connect(&config.database).await?;
        tallyflow_db::ping(&db).await?;
        Ok::<_, sea_orm::DbErr>(db)
    })
    .await?;

    let producer = Arc::new(
        connect_with_retry("broker", &policy, || {
            RedisStreamsProducer::connect(&config.broker)
        })
        .await?,
    );

    let ledger_store = Arc::new(
        connect_with_retry("ledger store", &policy, || {
            MongoLedgerStore::connect(&config.document_store)
        })
        .await?,
    );

    let state = AppState::new(Arc::new(db), producer.clone(), ledger_store, &config);

    let cancel = CancellationToken::new();
    let sweeper = config.outbox.enabled.then(|| {
        OutboxSweeper::new(state.transactions.clone(), &config.outbox).spawn(cancel.clone())
    });

    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    let shutdown = cancel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown.cancel();
        })
        .await?;

    cancel.cancel();
    if let Some(sweeper) = sweeper {
        if let Err(e) = sweeper.await {
            warn!(error = %e, "Outbox sweeper task failed");
        }
    }
    producer.close().await?;
    info!("Server stopped");

    Ok(())
}
