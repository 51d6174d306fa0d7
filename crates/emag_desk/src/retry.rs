//! Retry with exponential backoff for rate-limited marketplace calls.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};

use crate::platform::{ProgressCallback, Resource};
use crate::sync::{INITIAL_BACKOFF_MS, MAX_BACKOFF_MS, MAX_RATE_LIMIT_RETRIES, SyncEvent};

/// How often and how patiently a rate-limited request is retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub max_retries: usize,
}

impl Default for RetryPolicy {
    /// 1s doubling up to 60s, five retries.
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(INITIAL_BACKOFF_MS),
            max_delay: Duration::from_millis(MAX_BACKOFF_MS),
            max_retries: MAX_RATE_LIMIT_RETRIES as usize,
        }
    }
}

impl RetryPolicy {
    /// Fail on the first rate limit.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Jittered exponential backoff for this policy.
    #[must_use]
    pub fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries)
            .with_jitter()
    }
}

/// Run `operation`, retrying while `is_rate_limit` says the error is a rate
/// limit. Each wait is reported as [`SyncEvent::RateLimitBackoff`].
///
/// ```ignore
/// let page = with_retry(
///     &policy,
///     || async { client.read_page(Resource::Orders, 3, 100, &filter).await },
///     EmagError::is_rate_limit,
///     |e: &EmagError| e.to_string(),
///     Resource::Orders,
///     3,
///     on_progress,
/// )
/// .await?;
/// ```
pub async fn with_retry<T, E, F, Fut, IsRateLimit, ShortMsg>(
    policy: &RetryPolicy,
    mut operation: F,
    is_rate_limit: IsRateLimit,
    short_message: ShortMsg,
    resource: Resource,
    page: u32,
    on_progress: Option<&ProgressCallback>,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::error::Error + Send + Sync + 'static,
    IsRateLimit: Fn(&E) -> bool + Send + Sync + 'static,
    ShortMsg: Fn(&E) -> String + Send + Sync + 'static,
{
    let attempt = AtomicU32::new(0);

    let counted = || {
        attempt.fetch_add(1, Ordering::SeqCst);
        operation()
    };

    counted
        .retry(policy.backoff())
        .notify(|err, delay| {
            let attempt = attempt.load(Ordering::SeqCst);
            if let Some(cb) = on_progress {
                cb(SyncEvent::RateLimitBackoff {
                    resource,
                    page,
                    retry_after_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    attempt,
                });
            }
            tracing::debug!(
                resource = %resource,
                page,
                attempt,
                delay_ms = delay.as_millis(),
                error = %short_message(err),
                "Rate limited, backing off"
            );
        })
        .when(is_rate_limit)
        .await
}
