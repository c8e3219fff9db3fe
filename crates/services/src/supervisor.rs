//! Connection supervision.
//!
//! Every external dependency is reached through [`connect_with_retry`]:
//! attempts are bounded by the policy's per-attempt deadline and separated by
//! capped exponential backoff. Exhaustion is reported as
//! [`SupervisorError::Exhausted`], which binaries treat as fatal.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use tallyflow_core::retry::RetryPolicy;

/// Supervision failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SupervisorError {
    /// Every attempt failed.
    #[error("Could not connect to {target} after {attempts} attempts: {last_error}")]
    Exhausted {
        /// Dependency name.
        target: &'static str,
        /// Attempts made.
        attempts: u32,
        /// Error from the final attempt.
        last_error: String,
    },
}

/// Connects to `target`, retrying per `policy`.
///
/// `connect` must establish the handle and prove it live (connect plus ping);
/// each call is cut off after `policy.attempt_timeout`.
pub async fn connect_with_retry<T, E, F, Fut>(
    target: &'static str,
    policy: &RetryPolicy,
    mut connect: F,
) -> Result<T, SupervisorError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        let last_error = match tokio::time::timeout(policy.attempt_timeout, connect()).await {
            Ok(Ok(handle)) => {
                info!(target_name = target, attempt, "Connected");
                return Ok(handle);
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("attempt timed out after {:?}", policy.attempt_timeout),
        };

        if !policy.has_attempts_left(attempt) {
            return Err(SupervisorError::Exhausted {
                target,
                attempts: attempt,
                last_error,
            });
        }

        let delay = policy.delay_for(attempt);
        warn!(
            target_name = target,
            attempt,
            max_attempts = policy.max_attempts,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %last_error,
            "Connection attempt failed, retrying"
        );
        tokio::time::sleep(delay).await;
    }
}

/// Liveness of one dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentHealth {
    /// Dependency name.
    pub name: &'static str,
    /// True if the ping succeeded in time.
    pub healthy: bool,
    /// Failure reason, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Pings one dependency under `deadline`.
pub async fn check_component<E, Fut>(name: &'static str, deadline: Duration, ping: Fut) -> ComponentHealth
where
    Fut: Future<Output = Result<(), E>>,
    E: Display,
{
    let error = match tokio::time::timeout(deadline, ping).await {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(e.to_string()),
        Err(_) => Some(format!("no reply within {deadline:?}")),
    };
    ComponentHealth {
        name,
        healthy: error.is_none(),
        error,
    }
}

/// Aggregated liveness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    /// `"healthy"` or `"degraded"`.
    pub status: &'static str,
    /// Per-dependency results.
    pub components: Vec<ComponentHealth>,
}

impl HealthReport {
    /// Builds a report; healthy only if every component is.
    #[must_use]
    pub fn new(components: Vec<ComponentHealth>) -> Self {
        let status = if components.iter().all(|c| c.healthy) {
            "healthy"
        } else {
            "degraded"
        };
        Self { status, components }
    }

    /// Returns true if every component answered.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.components.iter().all(|c| c.healthy)
    }
}
