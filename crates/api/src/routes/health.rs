//! Health check endpoint.

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use serde::Serialize;

use tallyflow_services::{HealthReport, check_component};

use crate::AppState;

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Service version.
    pub version: &'static str,
    /// Dependency liveness.
    #[serde(flatten)]
    pub report: HealthReport,
}

/// Pings every dependency; 503 if any is down.
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let deadline = state.health_timeout;
    let (database, broker, ledger_store) = tokio::join!(
        check_component("database", deadline, tallyflow_db::ping(&state.db)),
        check_component("broker", deadline, state.producer.ping()),
        check_component("ledger_store", deadline, state.ledger_store.ping()),
    );
    let report = HealthReport::new(vec![database, broker, ledger_store]);
    let status = if report.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            version: env!("CARGO_PKG_VERSION"),
            report,
        }),
    )
}

/// Creates health check routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

#[cfg(test)]
mod tests {
    use crate::test_support::{empty_db, get, json_body, send, state};
    use axum::http::StatusCode;
    use tallyflow_docstore::InMemoryLedgerStore;
    use tallyflow_messaging::InMemoryBroker;

    #[tokio::test]
    async fn test_healthy_when_all_dependencies_answer() {
        let broker = InMemoryBroker::new();
        let store = InMemoryLedgerStore::new();

        let response = send(state(empty_db(), &broker, &store), get("/api/v1/health")).await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["components"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_unreachable_store_degrades_to_503() {
        let broker = InMemoryBroker::new();
        let store = InMemoryLedgerStore::new();
        store.set_unreachable(true);

        let response = send(state(empty_db(), &broker, &store), get("/api/v1/health")).await;

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = json_body(response).await;
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["components"][2]["name"], "ledger_store");
        assert_eq!(body["components"][2]["healthy"], false);
    }
}
