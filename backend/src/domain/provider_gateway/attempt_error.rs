//! Attempt-local classification of one provider call.
//!
//! Keeps the retry decision explicit inside the gateway loop without
//! leaking attempt-control details into the public outcome type.

use crate::domain::ports::PaymentProviderError;

pub(super) enum AttemptError {
    Retryable(PaymentProviderError),
    Terminal(PaymentProviderError),
}

impl From<PaymentProviderError> for AttemptError {
    fn from(error: PaymentProviderError) -> Self {
        if error.is_retryable() {
            Self::Retryable(error)
        } else {
            Self::Terminal(error)
        }
    }
}
