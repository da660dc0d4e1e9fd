use super::clock::Clock;
use crate::api::StoreResult;
use crate::config::SyncConfig;
use crate::util::random_jitter_ms;
use leptos::logging::warn;
use std::future::Future;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay_ms: u64,
    pub max_jitter_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&SyncConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            attempts: config.retry_attempts.max(1),
            base_delay_ms: config.retry_base_delay_ms,
            max_jitter_ms: config.retry_max_jitter_ms,
        }
    }

    /// Backoff before attempt `attempt + 1`, without jitter.
    pub fn base_delay_for(&self, attempt: u32) -> u64 {
        self.base_delay_ms
            .saturating_mul(1u64.checked_shl(attempt).unwrap_or(u64::MAX))
    }
}

/// Run `op` until it succeeds, the attempts run out, or it fails with a non-retryable kind.
pub async fn retry_with_backoff<T, C, F, Fut>(policy: RetryPolicy, clock: &C, mut op: F) -> StoreResult<T>
where
    C: Clock,
    F: FnMut() -> Fut,
    Fut: Future<Output = StoreResult<T>>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) => {
                attempt += 1;
                if attempt >= attempts {
                    return Err(e);
                }
                let delay = policy
                    .base_delay_for(attempt - 1)
                    .saturating_add(random_jitter_ms(policy.max_jitter_ms));
                warn!("attempt {attempt}/{attempts} failed ({e}); retrying in {delay}ms");
                clock.sleep(delay).await;
            }
        }
    }
}
