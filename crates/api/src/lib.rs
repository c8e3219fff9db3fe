//! HTTP API layer with Axum routes.
//!
//! This crate provides:
//! - REST routes under `/api/v1`
//! - A JSON error envelope shared by every handler
//! - Application state wiring the services together

pub mod error;
pub mod routes;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use sea_orm::DatabaseConnection;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use tallyflow_db::{AccountRepository, TransactionRepository};
use tallyflow_docstore::LedgerStore;
use tallyflow_messaging::ProducerConnection;
use tallyflow_services::{AccountService, LedgerQuery, TransactionService};
use tallyflow_shared::AppConfig;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: Arc<DatabaseConnection>,
    /// Broker producer, shared with the transaction service.
    pub producer: Arc<dyn ProducerConnection>,
    /// Ledger document store.
    pub ledger_store: Arc<dyn LedgerStore>,
    /// Transaction producer service.
    pub transactions: TransactionService,
    /// Account service.
    pub accounts: AccountService,
    /// Ledger read side.
    pub ledger: LedgerQuery,
    /// Deadline for each dependency ping on `/health`.
    pub health_timeout: Duration,
}

impl AppState {
    /// Wires services over already-connected handles.
    #[must_use]
    pub fn new(
        db: Arc<DatabaseConnection>,
        producer: Arc<dyn ProducerConnection>,
        ledger_store: Arc<dyn LedgerStore>,
        config: &AppConfig,
    ) -> Self {
        let transactions = TransactionService::new(
            TransactionRepository::new(db.clone()),
            producer.clone(),
            config.producer.publish_timeout(),
        );
        Self {
            accounts: AccountService::new(AccountRepository::new(db.clone())),
            ledger: LedgerQuery::new(ledger_store.clone()),
            transactions,
            db,
            producer,
            ledger_store,
            health_timeout: Duration::from_millis(config.supervisor.health_timeout_ms),
        }
    }
}

/// Creates the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, Response};
    use http_body_util::BodyExt;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use serde_json::Value;
    use tallyflow_docstore::InMemoryLedgerStore;
    use tallyflow_messaging::InMemoryBroker;
    use tower::ServiceExt;

    /// State over a mock database, an in-memory broker, and an in-memory store.
    pub(crate) fn state(
        db: MockDatabase,
        broker: &InMemoryBroker,
        store: &InMemoryLedgerStore,
    ) -> AppState {
        let config = AppConfig::default();
        AppState::new(
            Arc::new(db.into_connection()),
            Arc::new(broker.producer()),
            Arc::new(store.clone()),
            &config,
        )
    }

    pub(crate) fn empty_db() -> MockDatabase {
        MockDatabase::new(DatabaseBackend::Postgres)
    }

    pub(crate) async fn send(state: AppState, request: Request<Body>) -> Response<Body> {
        create_router(state).oneshot(request).await.unwrap()
    }

    pub(crate) fn get(uri: &str) -> Request<Body> {
        Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    pub(crate) fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    pub(crate) async fn json_body(response: Response<Body>) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }
}
