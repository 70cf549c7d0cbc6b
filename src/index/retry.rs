use crate::config::IndexingConfig;
use backon::{ConstantBuilder, Retryable};
use std::time::Duration;

/// Bounded retry for writes that may hit a transient conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Pause between attempts
    pub backoff: Duration,
}

/// How a retried operation ended
#[derive(Debug)]
pub enum RetryOutcome<T, E> {
    Done(T),
    /// Every attempt failed with a transient error; the last one is kept
    Exhausted(E),
    /// A non-transient error stopped the retries
    Failed(E),
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn from_config(config: &IndexingConfig) -> Self {
        Self::new(config.contention_retries, config.retry_backoff())
    }

    /// Runs `op` until it succeeds, fails permanently or runs out of attempts
    pub async fn run<T, E, F, C>(&self, mut op: F, is_transient: C) -> RetryOutcome<T, E>
    where
        F: FnMut() -> Result<T, E>,
        C: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let backoff = ConstantBuilder::default()
            .with_delay(self.backoff)
            .with_max_times(self.max_attempts.saturating_sub(1) as usize);

        let result = (|| std::future::ready(op()))
            .retry(backoff)
            .when(|err: &E| is_transient(err))
            .notify(|err: &E, delay: Duration| {
                tracing::warn!(
                    max_attempts = self.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Transient write conflict, retrying: {}",
                    err
                );
            })
            .await;

        match result {
            Ok(value) => RetryOutcome::Done(value),
            Err(err) if is_transient(&err) => RetryOutcome::Exhausted(err),
            Err(err) => RetryOutcome::Failed(err),
        }
    }
}
