//! Bootstrap utilities for hosts embedding the backends.
//!
//! Shared initialization code: tracing setup and store connection with retry.

use std::sync::Arc;
use std::time::Duration;

use backon::Retryable;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{RetrySettings, LOG_ENV_VAR};
use crate::interfaces::{DocumentStore, Endpoint, StoreConnector, StoreError, StoreResult};
use crate::utils::retry::connection_backoff;

/// Initialize tracing with the DOCJOURNAL_LOG environment variable.
///
/// Defaults to "info" level if DOCJOURNAL_LOG is not set. Does nothing when
/// the host already installed a global subscriber.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env(LOG_ENV_VAR)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Connect to one bucket, retrying transient failures per `settings`.
///
/// Non-transient errors (unknown bucket, bad credentials surfaced as such)
/// fail on the first attempt.
pub async fn connect_with_retry(
    connector: &dyn StoreConnector,
    endpoint: &Endpoint,
    settings: &RetrySettings,
) -> StoreResult<Arc<dyn DocumentStore>> {
    let bucket = endpoint.bucket.as_str();
    let result = (|| async move { connector.connect(endpoint).await })
        .retry(connection_backoff(settings))
        .when(StoreError::is_transient)
        .notify(|err: &StoreError, dur: Duration| {
            warn!(bucket, error = %err, delay = ?dur, "Connection failed, retrying");
        })
        .await;

    match &result {
        Ok(_) => info!(bucket, "Connected to document store"),
        Err(e) => error!(bucket, error = %e, "Failed to connect to document store"),
    }
    result
}
