//! Port abstraction for the canonical payout ledger.
//!
//! Records are never deleted. Status changes follow
//! [`PayoutStatus::transition_to`](crate::domain::PayoutStatus::transition_to)
//! and adapters must apply the rule inside the same unit that reads the
//! current status.

use async_trait::async_trait;
use chrono::Utc;

use crate::domain::{
    IdempotencyKey, NewPayout, PageRequest, Payout, PayoutId, PayoutPage, PayoutStatus,
    StatusUpdate, UserId,
};

use super::define_port_error;

define_port_error! {
    /// Errors raised by payout ledger adapters.
    pub enum PayoutLedgerError {
        /// Ledger connection could not be established.
        Connection {
            /// Detail reported by the backend.
            message: String,
        } => "payout ledger connection failed: {message}",
        /// Query or mutation failed during execution.
        Query {
            /// Detail reported by the backend.
            message: String,
        } => "payout ledger query failed: {message}",
        /// No payout exists with the given id.
        NotFound {
            /// Identifier that was looked up.
            payout_id: i64,
        } => "payout {payout_id} not found",
        /// The idempotency key is missing or already attached.
        KeyNotClaimed {
            /// Idempotency key involved.
            key: String,
        } => "idempotency key {key} is not held by this request",
        /// The provider reference differs from, or collides with, a stored one.
        ProviderRefConflict {
            /// Detail reported by the backend.
            message: String,
        } => "provider reference conflict: {message}",
        /// The payout is no longer in a state that permits the mutation.
        InvalidState {
            /// Detail reported by the backend.
            message: String,
        } => "payout state does not permit change: {message}",
    }
}

/// Port for payout persistence.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PayoutLedger: Send + Sync {
    /// Insert a payout in [`PayoutStatus::Processing`].
    async fn create(&self, payout: &NewPayout) -> Result<Payout, PayoutLedgerError>;

    /// Insert a payout and attach it to a claimed, unattached key as one
    /// atomic unit.
    ///
    /// Fails with [`PayoutLedgerError::KeyNotClaimed`] and writes nothing if
    /// the key row is absent or already attached.
    async fn create_for_key(
        &self,
        key: &IdempotencyKey,
        payout: &NewPayout,
    ) -> Result<Payout, PayoutLedgerError>;

    /// Fetch one payout.
    async fn get(&self, id: PayoutId) -> Result<Option<Payout>, PayoutLedgerError>;

    /// List a user's payouts, most recent first.
    async fn list(
        &self,
        user_id: &UserId,
        page: PageRequest,
    ) -> Result<PayoutPage, PayoutLedgerError>;

    /// Apply a status change under the monotonic transition rule.
    async fn update_status(
        &self,
        id: PayoutId,
        status: PayoutStatus,
    ) -> Result<StatusUpdate, PayoutLedgerError>;

    /// Record the provider reference while the payout is processing.
    ///
    /// Setting the same reference twice is a no-op.
    async fn set_provider_ref(
        &self,
        id: PayoutId,
        provider_ref: &str,
    ) -> Result<Payout, PayoutLedgerError>;
}

/// Fixture ledger that echoes writes without storing them.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixturePayoutLedger;

impl FixturePayoutLedger {
    fn echo(payout: &NewPayout) -> Payout {
        let now = Utc::now();
        Payout {
            id: PayoutId::new(1),
            user_id: payout.user_id.clone(),
            amount: payout.amount,
            currency: payout.currency,
            status: PayoutStatus::Processing,
            provider_ref: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[async_trait]
impl PayoutLedger for FixturePayoutLedger {
    async fn create(&self, payout: &NewPayout) -> Result<Payout, PayoutLedgerError> {
        Ok(Self::echo(payout))
    }

    async fn create_for_key(
        &self,
        _key: &IdempotencyKey,
        payout: &NewPayout,
    ) -> Result<Payout, PayoutLedgerError> {
        Ok(Self::echo(payout))
    }

    async fn get(&self, _id: PayoutId) -> Result<Option<Payout>, PayoutLedgerError> {
        Ok(None)
    }

    async fn list(
        &self,
        _user_id: &UserId,
        page: PageRequest,
    ) -> Result<PayoutPage, PayoutLedgerError> {
        Ok(PayoutPage {
            request: page,
            total: 0,
            items: Vec::new(),
        })
    }

    async fn update_status(
        &self,
        id: PayoutId,
        _status: PayoutStatus,
    ) -> Result<StatusUpdate, PayoutLedgerError> {
        Err(PayoutLedgerError::not_found(id.get()))
    }

    async fn set_provider_ref(
        &self,
        id: PayoutId,
        _provider_ref: &str,
    ) -> Result<Payout, PayoutLedgerError> {
        Err(PayoutLedgerError::not_found(id.get()))
    }
}
