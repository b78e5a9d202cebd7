//! Retry policy for transient RPC failures and range-splitting log fetches.

use std::{future::Future, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    errors::ChainIoError,
    traits::LogService,
    types::{EventLog, LogFilter},
};

/// Retry policy applied uniformly to RPC calls.
///
/// This governs transport-level retries only; protocol-level decisions (commitment mismatches,
/// unsynchronized relays) are never retried here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of retries after the initial attempt.
    pub max_retries: u32,

    /// Delay before the first retry.
    pub delay: Duration,

    /// Multiplier applied to the delay after each failed attempt.
    pub backoff_multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            delay: Duration::from_millis(500),
            backoff_multiplier: 2,
        }
    }
}

/// Runs `op` until it succeeds, fails with a non-transient error, or the policy is exhausted.
///
/// Exhaustion surfaces as [`ChainIoError::RetriesExhausted`] wrapping the last observed error.
pub async fn with_retries<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, ChainIoError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ChainIoError>>,
{
    let mut delay = policy.delay;
    let mut attempts = 1u32;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempts <= policy.max_retries => {
                debug!(%err, attempt = attempts, ?delay, "transient rpc failure, retrying");
                tokio::time::sleep(delay).await;
                delay *= policy.backoff_multiplier;
                attempts += 1;
            }
            Err(err) if err.is_transient() => {
                warn!(%err, attempts, "retries exhausted");
                return Err(ChainIoError::RetriesExhausted {
                    attempts,
                    last: Box::new(err),
                });
            }
            Err(err) => return Err(err),
        }
    }
}

/// Fetches logs over a block range, halving any sub-range the provider rejects as oversized or
/// rate-limited until every piece fits.
///
/// Results come back ordered by (block, log index) since sub-ranges are processed left to right.
pub async fn fetch_logs_paged(
    service: &dyn LogService,
    policy: &RetryPolicy,
    filter: &LogFilter,
) -> Result<Vec<EventLog>, ChainIoError> {
    let mut out = Vec::new();
    // Depth-first over pending ranges, leftmost first.
    let mut pending = vec![(filter.from_block, filter.to_block)];

    while let Some((from, to)) = pending.pop() {
        let sub = LogFilter {
            from_block: from,
            to_block: to,
            ..filter.clone()
        };

        match with_retries(policy, || service.get_logs(&sub)).await {
            Ok(mut logs) => out.append(&mut logs),
            Err(err) if from < to && should_split(&err) => {
                let mid = from + (to - from) / 2;
                debug!(from, to, mid, "splitting oversized log range");
                // Push right half first so the left half is fetched next.
                pending.push((mid + 1, to));
                pending.push((from, mid));
            }
            Err(err) => return Err(err),
        }
    }

    Ok(out)
}

/// Whether a failed range query should be split instead of surfaced.
fn should_split(err: &ChainIoError) -> bool {
    match err {
        ChainIoError::ResponseTooLarge | ChainIoError::RateLimited => true,
        ChainIoError::RetriesExhausted { last, .. } => should_split(last),
        _ => false,
    }
}
