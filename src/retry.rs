use crate::config::RetryPolicy;
use anyhow::{anyhow, Result};
use std::future::Future;
use tracing::warn;

/// Runs `op` until it succeeds or the attempt budget is spent.
///
/// Each attempt is bounded by `policy.call_timeout`; a timeout counts as a
/// failed attempt. Backoff grows linearly with the attempt number.
pub async fn with_backoff<T, F, Fut>(policy: &RetryPolicy, what: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last = None;
    for attempt in 1..=policy.max_attempts {
        match tokio::time::timeout(policy.call_timeout, op()).await {
            Ok(Ok(v)) => return Ok(v),
            Ok(Err(e)) => {
                warn!(what, attempt, error = %e, "attempt failed");
                last = Some(e);
            }
            Err(_) => {
                warn!(what, attempt, timeout = ?policy.call_timeout, "attempt timed out");
                last = Some(anyhow!("{what} timed out after {:?}", policy.call_timeout));
            }
        }
        if attempt < policy.max_attempts {
            tokio::time::sleep(policy.backoff_step * attempt).await;
        }
    }
    Err(last.unwrap_or_else(|| anyhow!("{what} failed")))
}
