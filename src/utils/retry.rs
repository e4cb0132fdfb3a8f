//! Backoff builders for connection retries.
//!
//! Uses `backon` for exponential backoff with jitter. Policy numbers come from
//! `RetrySettings` so hosts decide how hard a backend tries before giving up.

use std::time::Duration;

use backon::ExponentialBuilder;

use crate::config::RetrySettings;

/// Backoff for store connection attempts at startup.
///
/// `max_attempts` includes the first attempt, so 1 (the default) yields a
/// builder that never retries.
pub fn connection_backoff(settings: &RetrySettings) -> ExponentialBuilder {
    let retries = settings.max_attempts.saturating_sub(1) as usize;
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(settings.min_delay_ms))
        .with_max_delay(Duration::from_millis(settings.max_delay_ms))
        .with_max_times(retries)
        .with_jitter()
}
