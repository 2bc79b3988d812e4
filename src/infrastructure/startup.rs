//! Bounded retry for connecting to backing services at process start.
//!
//! Orchestrators rely on fast-fail-and-restart, so a dependency that stays
//! unreachable for the whole retry budget is reported as an error instead of
//! being retried forever.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio_retry::Retry;
use tokio_retry::strategy::FixedInterval;
use tracing::{info, warn};

/// Retry budget for startup connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartupRetry {
    /// Total attempts, including the first one (at least 1).
    pub max_attempts: u32,
    /// Fixed pause between attempts.
    pub delay: Duration,
}

impl Default for StartupRetry {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_secs(5),
        }
    }
}

/// Runs `connect` until it succeeds or the attempt budget is exhausted.
///
/// Every failed attempt is logged with its number; the last error is returned
/// when no attempt succeeded.
pub async fn retry_startup<T, E, F, Fut>(
    what: &str,
    policy: StartupRetry,
    mut connect: F,
) -> Result<T, E>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let strategy = FixedInterval::new(policy.delay).take((max_attempts - 1) as usize);

    let mut attempt = 0u32;
    let result = Retry::spawn(strategy, || {
        attempt += 1;
        let current = attempt;
        let fut = connect();
        async move {
            fut.await.inspect_err(|e| {
                warn!(
                    attempt = current,
                    max_attempts,
                    error = %e,
                    "Failed to connect to {what}"
                );
            })
        }
    })
    .await;

    if result.is_ok() {
        info!("Connected to {what}");
    }

    result
}
