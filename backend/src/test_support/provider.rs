//! Scripted payment provider and retry runtime doubles.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::ports::{
    PaymentProvider, PaymentProviderError, ProviderAcceptance, ProviderPayoutRequest,
};
use crate::domain::{BackoffJitter, RetrySleeper};

/// Provider replaying scripted results, then a fallback for every later call.
pub struct ScriptedProvider {
    scripted: Mutex<VecDeque<Result<ProviderAcceptance, PaymentProviderError>>>,
    fallback: Result<ProviderAcceptance, PaymentProviderError>,
    calls: AtomicU32,
    requests: Mutex<Vec<ProviderPayoutRequest>>,
}

impl ScriptedProvider {
    /// Replay `scripted` in order, then echo the request reference.
    #[must_use]
    pub fn scripted(scripted: Vec<Result<ProviderAcceptance, PaymentProviderError>>) -> Self {
        Self {
            scripted: Mutex::new(scripted.into()),
            fallback: Err(PaymentProviderError::transport("script exhausted")),
            calls: AtomicU32::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Accept every call, echoing the request reference.
    #[must_use]
    pub fn accepting() -> Self {
        Self {
            fallback: Ok(ProviderAcceptance {
                reference: String::new(),
            }),
            ..Self::scripted(Vec::new())
        }
    }

    /// Fail every call with `error`.
    #[must_use]
    pub fn always_failing(error: PaymentProviderError) -> Self {
        Self {
            fallback: Err(error),
            ..Self::scripted(Vec::new())
        }
    }

    /// Number of calls observed so far.
    #[must_use]
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests observed so far.
    #[must_use]
    pub fn requests(&self) -> Vec<ProviderPayoutRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|_| panic!("requests mutex"))
            .clone()
    }
}

#[async_trait]
impl PaymentProvider for ScriptedProvider {
    async fn submit(
        &self,
        request: &ProviderPayoutRequest,
    ) -> Result<ProviderAcceptance, PaymentProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap_or_else(|_| panic!("requests mutex"))
            .push(request.clone());
        let next = self
            .scripted
            .lock()
            .unwrap_or_else(|_| panic!("script mutex"))
            .pop_front();
        match next.unwrap_or_else(|| self.fallback.clone()) {
            Ok(acceptance) if acceptance.reference.is_empty() => Ok(ProviderAcceptance {
                reference: request.reference.clone(),
            }),
            other => other,
        }
    }
}

/// Sleeper that returns immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateSleeper;

#[async_trait]
impl RetrySleeper for ImmediateSleeper {
    async fn sleep(&self, _duration: Duration) {}
}

/// Sleeper recording each requested delay without waiting.
#[derive(Default)]
pub struct RecordingSleeper(pub Mutex<Vec<Duration>>);

impl RecordingSleeper {
    /// Delays requested so far.
    #[must_use]
    pub fn recorded(&self) -> Vec<Duration> {
        self.0
            .lock()
            .unwrap_or_else(|_| panic!("sleeper mutex"))
            .clone()
    }
}

#[async_trait]
impl RetrySleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.0
            .lock()
            .unwrap_or_else(|_| panic!("sleeper mutex"))
            .push(duration);
    }
}

/// Jitter that adds nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoJitter;

impl BackoffJitter for NoJitter {
    fn jitter(&self, _max: Duration, _attempt: u32) -> Duration {
        Duration::ZERO
    }
}

/// Jitter that always adds its maximum.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaxJitter;

impl BackoffJitter for MaxJitter {
    fn jitter(&self, max: Duration, _attempt: u32) -> Duration {
        max
    }
}
