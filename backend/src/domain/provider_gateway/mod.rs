//! Bounded-retry submission of payouts to the payment provider.
//!
//! The gateway makes at most `max_attempts` calls. Rate limiting, server
//! errors, transport failures, and timeouts are retried after an exponential
//! delay plus jitter; any other provider error stops the loop at once. On
//! acceptance the provider reference is recorded on the payout. The gateway
//! never changes payout status: only webhook confirmation does.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::domain::ports::{
    PaymentProvider, PaymentProviderError, PayoutLedger, ProviderAcceptance,
    ProviderPayoutRequest,
};
use crate::domain::{CorrelationId, Payout};

mod attempt_error;
mod runtime;

use attempt_error::AttemptError;
pub use runtime::{
    BackoffJitter, ProviderGatewayRuntime, RetrySleeper, TokioSleeper, UniformJitter,
};

/// Retry and timeout settings for provider submissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderGatewayConfig {
    /// Maximum provider calls per payout, including the first.
    pub max_attempts: u32,
    /// Upper bound on a single provider call.
    pub attempt_timeout: Duration,
    /// Base of the exponential delay; attempt `n` waits `base * 2^n`.
    pub backoff_base: Duration,
    /// Cap applied to the exponential part of the delay.
    pub backoff_cap: Duration,
    /// Largest random offset added to each delay.
    pub max_jitter: Duration,
}

impl Default for ProviderGatewayConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            attempt_timeout: Duration::from_secs(5),
            backoff_base: Duration::from_millis(500),
            backoff_cap: Duration::from_secs(5),
            max_jitter: Duration::from_millis(250),
        }
    }
}

impl ProviderGatewayConfig {
    /// Delay before retrying after the 1-indexed `attempt`, without jitter.
    ///
    /// ```
    /// # use std::time::Duration;
    /// # use payouts::domain::ProviderGatewayConfig;
    /// let config = ProviderGatewayConfig::default();
    /// assert_eq!(config.backoff_delay(1), Duration::from_secs(1));
    /// assert_eq!(config.backoff_delay(4), Duration::from_secs(5));
    /// ```
    #[must_use]
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let base_ms = u64::try_from(self.backoff_base.as_millis()).unwrap_or(u64::MAX);
        let cap_ms = u64::try_from(self.backoff_cap.as_millis()).unwrap_or(u64::MAX);
        let factor = 2_u64.saturating_pow(attempt);
        Duration::from_millis(base_ms.saturating_mul(factor).min(cap_ms))
    }

    /// Longest time one submission can take: every attempt timing out plus
    /// every backoff at its maximum jitter.
    ///
    /// With the defaults this is 20 s of calls plus 7 s of backoff and
    /// 0.75 s of jitter.
    #[must_use]
    pub fn worst_case_latency(&self) -> Duration {
        let attempts = self.max_attempts.max(1);
        let calls = self.attempt_timeout.saturating_mul(attempts);
        (1..attempts).fold(calls, |total, attempt| {
            total
                .saturating_add(self.backoff_delay(attempt))
                .saturating_add(self.max_jitter)
        })
    }
}

/// Result of one bounded submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// The provider accepted the payout.
    Accepted {
        /// Provider reference, recorded on the payout.
        reference: String,
        /// Calls made, including the successful one.
        attempts: u32,
    },
    /// Every attempt failed with a retryable error.
    Exhausted {
        /// Calls made.
        attempts: u32,
        /// Error from the final call.
        last_error: PaymentProviderError,
    },
    /// The provider returned a non-retryable error.
    Rejected {
        /// Calls made, including the rejected one.
        attempts: u32,
        /// The terminal error.
        error: PaymentProviderError,
    },
}

impl SubmissionOutcome {
    /// Number of provider calls made.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        match self {
            Self::Accepted { attempts, .. }
            | Self::Exhausted { attempts, .. }
            | Self::Rejected { attempts, .. } => *attempts,
        }
    }
}

/// Submits payouts to the provider under a bounded retry policy.
pub struct ProviderGateway {
    provider: Arc<dyn PaymentProvider>,
    ledger: Arc<dyn PayoutLedger>,
    sleeper: Arc<dyn RetrySleeper>,
    jitter: Arc<dyn BackoffJitter>,
    config: ProviderGatewayConfig,
}

impl ProviderGateway {
    /// Build a gateway with the Tokio sleeper and uniform jitter.
    #[must_use]
    pub fn new(
        provider: Arc<dyn PaymentProvider>,
        ledger: Arc<dyn PayoutLedger>,
        config: ProviderGatewayConfig,
    ) -> Self {
        Self::with_runtime(provider, ledger, ProviderGatewayRuntime::default(), config)
    }

    /// Build a gateway with injected runtime helpers.
    #[must_use]
    pub fn with_runtime(
        provider: Arc<dyn PaymentProvider>,
        ledger: Arc<dyn PayoutLedger>,
        runtime: ProviderGatewayRuntime,
        config: ProviderGatewayConfig,
    ) -> Self {
        Self {
            provider,
            ledger,
            sleeper: runtime.sleeper,
            jitter: runtime.jitter,
            config,
        }
    }

    /// Settings in force.
    #[must_use]
    pub const fn config(&self) -> &ProviderGatewayConfig {
        &self.config
    }

    /// Submit `payout`, retrying transient failures.
    ///
    /// Provider failures never surface as errors: they are logged and the
    /// payout stays `processing` until a webhook settles it.
    pub async fn submit(
        &self,
        payout: &Payout,
        correlation_id: Option<CorrelationId>,
    ) -> SubmissionOutcome {
        let request = ProviderPayoutRequest {
            payout_id: payout.id,
            amount: payout.amount,
            currency: payout.currency,
            reference: payout.id.provider_reference(),
            correlation_id,
        };
        let max_attempts = self.config.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            match self.run_single_attempt(&request).await {
                Ok(acceptance) => {
                    info!(
                        payout_id = %payout.id,
                        attempt,
                        provider_ref = %acceptance.reference,
                        "provider accepted payout"
                    );
                    self.record_reference(payout, &acceptance.reference).await;
                    return SubmissionOutcome::Accepted {
                        reference: acceptance.reference,
                        attempts: attempt,
                    };
                }
                Err(AttemptError::Retryable(error)) if attempt < max_attempts => {
                    let delay = self.config.backoff_delay(attempt).saturating_add(
                        self.jitter.jitter(self.config.max_jitter, attempt),
                    );
                    warn!(
                        payout_id = %payout.id,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %error,
                        "provider call failed; retrying"
                    );
                    self.sleeper.sleep(delay).await;
                }
                Err(AttemptError::Retryable(error)) => {
                    warn!(
                        payout_id = %payout.id,
                        attempts = attempt,
                        error = %error,
                        "provider retries exhausted; payout stays processing"
                    );
                    return SubmissionOutcome::Exhausted {
                        attempts: attempt,
                        last_error: error,
                    };
                }
                Err(AttemptError::Terminal(error)) => {
                    warn!(
                        payout_id = %payout.id,
                        attempt,
                        error = %error,
                        "provider rejected payout; payout stays processing"
                    );
                    return SubmissionOutcome::Rejected {
                        attempts: attempt,
                        error,
                    };
                }
            }
        }

        // `max_attempts` is at least one, so the loop always returns.
        SubmissionOutcome::Exhausted {
            attempts: max_attempts,
            last_error: PaymentProviderError::transport("no provider attempt was made"),
        }
    }

    async fn run_single_attempt(
        &self,
        request: &ProviderPayoutRequest,
    ) -> Result<ProviderAcceptance, AttemptError> {
        let call = self.provider.submit(request);
        match tokio::time::timeout(self.config.attempt_timeout, call).await {
            Ok(Ok(acceptance)) if acceptance.reference.trim().is_empty() => Err(
                AttemptError::from(PaymentProviderError::decode("empty provider reference")),
            ),
            Ok(Ok(acceptance)) => Ok(acceptance),
            Ok(Err(error)) => Err(AttemptError::from(error)),
            Err(_) => Err(AttemptError::from(PaymentProviderError::timeout(format!(
                "no response within {} ms",
                self.config.attempt_timeout.as_millis()
            )))),
        }
    }

    async fn record_reference(&self, payout: &Payout, reference: &str) {
        if let Err(error) = self.ledger.set_provider_ref(payout.id, reference).await {
            warn!(
                payout_id = %payout.id,
                provider_ref = %reference,
                error = %error,
                "failed to record provider reference"
            );
        }
    }
}

#[cfg(test)]
mod tests;
