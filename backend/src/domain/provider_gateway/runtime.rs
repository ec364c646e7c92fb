//! Runtime helpers for the provider retry loop.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

/// Async sleeping abstraction so retry delays can be observed in tests.
#[async_trait]
pub trait RetrySleeper: Send + Sync {
    /// Suspend the current task for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Source of the random offset added to each backoff delay.
pub trait BackoffJitter: Send + Sync {
    /// Return an offset in `0..=max` for the given 1-indexed attempt.
    fn jitter(&self, max: Duration, attempt: u32) -> Duration;
}

/// Runtime dependencies of [`super::ProviderGateway`].
pub struct ProviderGatewayRuntime {
    /// Async sleep implementation.
    pub sleeper: Arc<dyn RetrySleeper>,
    /// Jitter strategy for retry delays.
    pub jitter: Arc<dyn BackoffJitter>,
}

impl Default for ProviderGatewayRuntime {
    fn default() -> Self {
        Self {
            sleeper: Arc::new(TokioSleeper),
            jitter: Arc::new(UniformJitter),
        }
    }
}

/// Tokio-based sleeper; suspends cooperatively without holding a thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl RetrySleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Uniformly distributed jitter in whole milliseconds.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformJitter;

impl BackoffJitter for UniformJitter {
    fn jitter(&self, max: Duration, _attempt: u32) -> Duration {
        let max_ms = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
    }
}
