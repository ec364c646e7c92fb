//! Driven port for submitting payouts to the external payment provider.
//!
//! The domain owns the request shape and the error classification so the
//! retry policy in [`crate::domain::ProviderGateway`] stays adapter-agnostic.

use async_trait::async_trait;

use crate::domain::{Amount, CorrelationId, Currency, PayoutId};

use super::define_port_error;

/// Domain-owned submission passed to the provider adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderPayoutRequest {
    /// Ledger id of the payout.
    pub payout_id: PayoutId,
    /// Amount to pay out.
    pub amount: Amount,
    /// Currency of the amount.
    pub currency: Currency,
    /// Reference the provider echoes in webhooks (`payout_<id>`).
    pub reference: String,
    /// Correlation id forwarded as `x-correlation-id`.
    pub correlation_id: Option<CorrelationId>,
}

/// Successful provider acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderAcceptance {
    /// Provider reference for later webhook correlation.
    pub reference: String,
}

define_port_error! {
    /// Errors surfaced while calling the payment provider.
    pub enum PaymentProviderError {
        /// Provider answered 429.
        RateLimited {
            /// Detail reported by the backend.
            message: String,
        } => "payment provider rate limited request: {message}",
        /// Provider answered 500.
        ServerError {
            /// HTTP status returned by the provider.
            status: u16,
            /// Detail reported by the backend.
            message: String,
        } => "payment provider server error {status}: {message}",
        /// Network transport failed before a response arrived.
        Transport {
            /// Detail reported by the backend.
            message: String,
        } => "payment provider transport failed: {message}",
        /// The attempt exceeded its timeout.
        Timeout {
            /// Detail reported by the backend.
            message: String,
        } => "payment provider timeout: {message}",
        /// Provider refused the payout with a non-retryable status.
        Rejected {
            /// HTTP status returned by the provider.
            status: u16,
            /// Detail reported by the backend.
            message: String,
        } => "payment provider rejected payout with {status}: {message}",
        /// A success response lacked a usable reference.
        Decode {
            /// Detail reported by the backend.
            message: String,
        } => "payment provider response decode failed: {message}",
    }
}

impl PaymentProviderError {
    /// Return whether retrying this error is expected to help.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. }
                | Self::ServerError { .. }
                | Self::Transport { .. }
                | Self::Timeout { .. }
        )
    }
}

/// Port for submitting a payout to the provider.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Perform one submission attempt.
    async fn submit(
        &self,
        request: &ProviderPayoutRequest,
    ) -> Result<ProviderAcceptance, PaymentProviderError>;
}

/// Fixture provider that accepts every payout under its own reference.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixturePaymentProvider;

#[async_trait]
impl PaymentProvider for FixturePaymentProvider {
    async fn submit(
        &self,
        request: &ProviderPayoutRequest,
    ) -> Result<ProviderAcceptance, PaymentProviderError> {
        Ok(ProviderAcceptance {
            reference: request.reference.clone(),
        })
    }
}
