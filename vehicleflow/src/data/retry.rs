//! Retry utilities with configurable backoff and jitter strategies.
//!
//! The orchestrator never retries on its own; retry budgets belong to the
//! I/O collaborators. [`RetryingDataSource`] applies one to any
//! [`DataSource`].

use super::{DataSource, Dataset, SourceError};
use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backoff strategy for retry delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// delay = base * 2^attempt
    #[default]
    Exponential,
    /// delay = base * (attempt + 1)
    Linear,
    /// delay = base (constant)
    Constant,
}

/// Jitter strategy to prevent thundering herd.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JitterStrategy {
    /// No jitter
    None,
    /// Random from 0 to delay
    #[default]
    Full,
    /// Half fixed, half random
    Equal,
}

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum attempts, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    /// Base delay between retries in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Maximum delay cap in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Backoff strategy.
    #[serde(default)]
    pub backoff_strategy: BackoffStrategy,
    /// Jitter strategy.
    #[serde(default)]
    pub jitter_strategy: JitterStrategy,
}

fn default_max_attempts() -> usize {
    3
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    10_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_strategy: BackoffStrategy::Exponential,
            jitter_strategy: JitterStrategy::Full,
        }
    }
}

impl RetryConfig {
    /// Creates a new retry config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum attempts.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the base delay.
    #[must_use]
    pub fn with_base_delay_ms(mut self, delay: u64) -> Self {
        self.base_delay_ms = delay;
        self
    }

    /// Sets the maximum delay.
    #[must_use]
    pub fn with_max_delay_ms(mut self, delay: u64) -> Self {
        self.max_delay_ms = delay;
        self
    }

    /// Sets the backoff strategy.
    #[must_use]
    pub fn with_backoff(mut self, strategy: BackoffStrategy) -> Self {
        self.backoff_strategy = strategy;
        self
    }

    /// Sets the jitter strategy.
    #[must_use]
    pub fn with_jitter(mut self, strategy: JitterStrategy) -> Self {
        self.jitter_strategy = strategy;
        self
    }

    /// Calculates the delay before retry number `attempt` (0-indexed).
    #[must_use]
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let base = self.base_delay_ms;
        let max = self.max_delay_ms;

        let delay = match self.backoff_strategy {
            BackoffStrategy::Exponential => {
                let exponent = u32::try_from(attempt).unwrap_or(u32::MAX);
                base.saturating_mul(2u64.saturating_pow(exponent)).min(max)
            }
            BackoffStrategy::Linear => base
                .saturating_mul(u64::try_from(attempt + 1).unwrap_or(u64::MAX))
                .min(max),
            BackoffStrategy::Constant => base.min(max),
        };

        let jittered = match self.jitter_strategy {
            JitterStrategy::None => delay,
            JitterStrategy::Full => {
                if delay == 0 {
                    0
                } else {
                    rand::thread_rng().gen_range(0..=delay)
                }
            }
            JitterStrategy::Equal => {
                let half = delay / 2;
                if half == 0 {
                    delay
                } else {
                    half + rand::thread_rng().gen_range(0..=half)
                }
            }
        };

        Duration::from_millis(jittered)
    }
}

/// The last error of an operation that never succeeded.
#[derive(Debug)]
pub struct RetryExhausted<E> {
    /// Attempts made, including the first.
    pub attempts: usize,
    /// The last error observed.
    pub last: E,
}

/// Executes an operation, retrying errors accepted by `is_retryable` until
/// the attempt budget runs out.
///
/// # Errors
///
/// Returns the last error and the number of attempts made.
pub async fn with_retry<T, E, F, Fut, P>(
    config: &RetryConfig,
    key: &str,
    mut operation: F,
    is_retryable: P,
) -> Result<T, RetryExhausted<E>>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if attempt >= max_attempts || !is_retryable(&e) {
                    return Err(RetryExhausted { attempts: attempt, last: e });
                }
                let delay = config.delay_for(attempt - 1);
                tracing::debug!(
                    key,
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %e,
                    "Retrying after error"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Wraps a [`DataSource`] with a retry budget for transient failures.
///
/// When the budget is spent the source fails with
/// [`SourceError::Exhausted`]; non-transient errors surface immediately.
#[derive(Debug)]
pub struct RetryingDataSource<S> {
    inner: S,
    config: RetryConfig,
}

impl<S: DataSource> RetryingDataSource<S> {
    /// Wraps `inner` with `config`.
    #[must_use]
    pub fn new(inner: S, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    /// Returns the wrapped source.
    #[must_use]
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: DataSource> DataSource for RetryingDataSource<S> {
    async fn fetch(&self, collection_id: &str) -> Result<Dataset, SourceError> {
        with_retry(
            &self.config,
            collection_id,
            || self.inner.fetch(collection_id),
            SourceError::is_transient,
        )
        .await
        .map_err(|RetryExhausted { attempts, last }| {
            if last.is_transient() {
                SourceError::Exhausted {
                    attempts,
                    last: Box::new(last),
                }
            } else {
                last
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::source::MockDataSource;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn fast_config(attempts: usize) -> RetryConfig {
        RetryConfig::new()
            .with_max_attempts(attempts)
            .with_base_delay_ms(1)
            .with_jitter(JitterStrategy::None)
    }

    fn unreachable() -> SourceError {
        SourceError::Unreachable {
            collection: "vehicles".to_string(),
            message: "connection refused".to_string(),
        }
    }

    #[test]
    fn test_retry_config_default() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.base_delay_ms, 500);
        assert_eq!(config.backoff_strategy, BackoffStrategy::Exponential);
    }

    #[test]
    fn test_delay_exponential_no_jitter() {
        let config = RetryConfig::new()
            .with_base_delay_ms(100)
            .with_jitter(JitterStrategy::None);

        assert_eq!(config.delay_for(0), Duration::from_millis(100));
        assert_eq!(config.delay_for(1), Duration::from_millis(200));
        assert_eq!(config.delay_for(2), Duration::from_millis(400));
    }

    #[test]
    fn test_delay_linear_and_constant() {
        let linear = RetryConfig::new()
            .with_base_delay_ms(100)
            .with_backoff(BackoffStrategy::Linear)
            .with_jitter(JitterStrategy::None);
        assert_eq!(linear.delay_for(2), Duration::from_millis(300));

        let constant = linear.with_backoff(BackoffStrategy::Constant);
        assert_eq!(constant.delay_for(5), Duration::from_millis(100));
    }

    #[test]
    fn test_delay_capped_at_max() {
        let config = RetryConfig::new()
            .with_base_delay_ms(1000)
            .with_max_delay_ms(5000)
            .with_jitter(JitterStrategy::None);
        assert_eq!(config.delay_for(10), Duration::from_millis(5000));
    }

    #[test]
    fn test_full_jitter_stays_below_delay() {
        let config = RetryConfig::new()
            .with_base_delay_ms(100)
            .with_backoff(BackoffStrategy::Constant);
        for _ in 0..10 {
            assert!(config.delay_for(0) <= Duration::from_millis(100));
        }
    }

    #[tokio::test]
    async fn test_with_retry_counts_attempts() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let result: Result<(), RetryExhausted<String>> = with_retry(
            &fast_config(3),
            "test",
            || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err("always fails".to_string()) }
            },
            |_| true,
        )
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retry_stops_on_non_retryable() {
        let result: Result<(), RetryExhausted<&str>> =
            with_retry(&fast_config(5), "test", || async { Err("fatal") }, |_| false).await;
        assert_eq!(result.unwrap_err().attempts, 1);
    }

    #[tokio::test]
    async fn test_retrying_source_recovers_from_transient_errors() {
        let mut mock = MockDataSource::new();
        let mut seq = mockall::Sequence::new();
        mock.expect_fetch()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_| Err(unreachable()));
        mock.expect_fetch()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(Dataset::default()));

        let source = RetryingDataSource::new(mock, fast_config(3));
        assert!(source.fetch("vehicles").await.is_ok());
    }

    #[tokio::test]
    async fn test_retrying_source_reports_exhaustion() {
        let mut mock = MockDataSource::new();
        mock.expect_fetch().times(2).returning(|_| Err(unreachable()));

        let source = RetryingDataSource::new(mock, fast_config(2));
        let err = source.fetch("vehicles").await.unwrap_err();

        match err {
            SourceError::Exhausted { attempts, last } => {
                assert_eq!(attempts, 2);
                assert!(matches!(*last, SourceError::Unreachable { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_retrying_source_does_not_retry_malformed_data() {
        let mut mock = MockDataSource::new();
        mock.expect_fetch().times(1).returning(|_| {
            Err(SourceError::Malformed {
                collection: "vehicles".to_string(),
                line: 1,
                message: "bad".to_string(),
            })
        });

        let source = RetryingDataSource::new(mock, fast_config(3));
        let err = source.fetch("vehicles").await.unwrap_err();
        assert!(matches!(err, SourceError::Malformed { .. }));
    }
}
