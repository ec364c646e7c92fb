//! Driving port for idempotent payout creation.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;

use crate::domain::{
    Amount, Currency, Error, IdempotencyKey, Payout, PayoutId, PayoutStatus, UserId,
};

/// Request to create a payout under an idempotency key.
///
/// `amount` and `currency` are raw client input; the command validates them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatePayoutRequest {
    /// Authenticated caller.
    pub user_id: UserId,
    /// Client-supplied idempotency key.
    pub idempotency_key: IdempotencyKey,
    /// Requested amount before quantization.
    pub amount: Decimal,
    /// Requested currency code.
    pub currency: String,
}

/// Response from creating a payout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatePayoutResponse {
    /// Current snapshot of the payout bound to the key.
    pub payout: Payout,
    /// Whether the payout was created by an earlier request with this key.
    pub replayed: bool,
}

/// Driving port for payout creation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PayoutCommand: Send + Sync {
    /// Create a payout, or resolve the payout already bound to the key.
    ///
    /// Returns [`crate::domain::ErrorCode::Conflict`] when another request
    /// holds the key past the wait deadline, and
    /// [`crate::domain::ErrorCode::ValidationFailed`] for invalid money.
    async fn create_payout(
        &self,
        request: CreatePayoutRequest,
    ) -> Result<CreatePayoutResponse, Error>;
}

/// Fixture command that validates input and echoes a processing payout.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixturePayoutCommand;

#[async_trait]
impl PayoutCommand for FixturePayoutCommand {
    async fn create_payout(
        &self,
        request: CreatePayoutRequest,
    ) -> Result<CreatePayoutResponse, Error> {
        let amount =
            Amount::new(request.amount).map_err(|err| Error::validation_failed(err.to_string()))?;
        let currency = request
            .currency
            .parse::<Currency>()
            .map_err(|err| Error::validation_failed(err.to_string()))?;
        let now = Utc::now();
        Ok(CreatePayoutResponse {
            payout: Payout {
                id: PayoutId::new(1),
                user_id: request.user_id,
                amount,
                currency,
                status: PayoutStatus::Processing,
                provider_ref: None,
                created_at: now,
                updated_at: now,
            },
            replayed: false,
        })
    }
}
