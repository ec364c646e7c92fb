//! Port abstraction for the idempotency key claim protocol.
//!
//! The [`IdempotencyKeyStore`] trait is the system's only synchronisation
//! point: `claim` must be a single atomic insert-if-absent against a store
//! shared by every service instance.

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{ClaimOutcome, IdempotencyKey, IdempotencyKeyRecord, PayoutId, UserId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by idempotency key store adapters.
    pub enum IdempotencyKeyStoreError {
        /// Store connection could not be established.
        Connection {
            /// Detail reported by the backend.
            message: String,
        } => "idempotency key store connection failed: {message}",
        /// Query or mutation failed during execution.
        Query {
            /// Detail reported by the backend.
            message: String,
        } => "idempotency key store query failed: {message}",
        /// The key is not claimed, or already points at another payout.
        AttachConflict {
            /// Idempotency key involved.
            key: String,
        } => "idempotency key {key} cannot be attached",
    }
}

/// Port for claiming, resolving, and reaping idempotency keys.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdempotencyKeyStore: Send + Sync {
    /// Atomically insert `key` owned by `owner` if no row exists.
    ///
    /// Exactly one concurrent caller observes [`ClaimOutcome::Won`].
    async fn claim(
        &self,
        key: &IdempotencyKey,
        owner: &UserId,
    ) -> Result<ClaimOutcome, IdempotencyKeyStoreError>;

    /// Record the payout created by the winning caller.
    ///
    /// Re-attaching the same id is a no-op; any other id fails with
    /// [`IdempotencyKeyStoreError::AttachConflict`].
    async fn attach(
        &self,
        key: &IdempotencyKey,
        payout_id: PayoutId,
    ) -> Result<(), IdempotencyKeyStoreError>;

    /// Fetch the stored record for `key`.
    async fn lookup(
        &self,
        key: &IdempotencyKey,
    ) -> Result<Option<IdempotencyKeyRecord>, IdempotencyKeyStoreError>;

    /// Drop an unattached claim so a retry can win it.
    ///
    /// Returns `false` when the key is absent or already attached.
    async fn release(&self, key: &IdempotencyKey) -> Result<bool, IdempotencyKeyStoreError>;

    /// Remove keys older than `ttl`, returning how many were deleted.
    async fn cleanup_expired(&self, ttl: Duration) -> Result<u64, IdempotencyKeyStoreError>;
}

/// Fixture store where every claim wins and nothing is retained.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureIdempotencyKeyStore;

#[async_trait]
impl IdempotencyKeyStore for FixtureIdempotencyKeyStore {
    async fn claim(
        &self,
        _key: &IdempotencyKey,
        _owner: &UserId,
    ) -> Result<ClaimOutcome, IdempotencyKeyStoreError> {
        Ok(ClaimOutcome::Won)
    }

    async fn attach(
        &self,
        _key: &IdempotencyKey,
        _payout_id: PayoutId,
    ) -> Result<(), IdempotencyKeyStoreError> {
        Ok(())
    }

    async fn lookup(
        &self,
        _key: &IdempotencyKey,
    ) -> Result<Option<IdempotencyKeyRecord>, IdempotencyKeyStoreError> {
        Ok(None)
    }

    async fn release(&self, _key: &IdempotencyKey) -> Result<bool, IdempotencyKeyStoreError> {
        Ok(false)
    }

    async fn cleanup_expired(&self, _ttl: Duration) -> Result<u64, IdempotencyKeyStoreError> {
        Ok(0)
    }
}
