//! PostgreSQL-backed [`IdempotencyKeyStore`].
//!
//! The primary key on `idempotency_keys.key` is the mutex: `claim` is a single
//! `INSERT … ON CONFLICT DO NOTHING` and the affected row count decides the
//! winner, so the protocol holds across any number of service instances.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use tracing::debug;

use crate::domain::ports::{IdempotencyKeyStore, IdempotencyKeyStoreError};
use crate::domain::{ClaimOutcome, IdempotencyKey, IdempotencyKeyRecord, PayoutId, UserId};

use super::diesel_helpers::{affected_rows, map_diesel_error, map_pool_error};
use super::models::{IdempotencyKeyRow, NewIdempotencyKeyRow};
use super::pool::{DbPool, PoolError};
use super::schema::idempotency_keys;

/// Diesel-backed implementation of the [`IdempotencyKeyStore`] port.
#[derive(Clone)]
pub struct DieselIdempotencyKeyStore {
    pool: DbPool,
}

impl DieselIdempotencyKeyStore {
    /// Create a store over a shared connection pool.
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn pool_error(error: PoolError) -> IdempotencyKeyStoreError {
    map_pool_error(error, IdempotencyKeyStoreError::connection)
}

fn diesel_error(error: diesel::result::Error) -> IdempotencyKeyStoreError {
    map_diesel_error(
        error,
        IdempotencyKeyStoreError::query,
        IdempotencyKeyStoreError::connection,
    )
}

#[async_trait]
impl IdempotencyKeyStore for DieselIdempotencyKeyStore {
    async fn claim(
        &self,
        key: &IdempotencyKey,
        owner: &UserId,
    ) -> Result<ClaimOutcome, IdempotencyKeyStoreError> {
        let mut conn = self.pool.get().await.map_err(pool_error)?;

        let inserted = diesel::insert_into(idempotency_keys::table)
            .values(&NewIdempotencyKeyRow {
                key: key.as_ref(),
                owner_user_id: *owner.as_uuid(),
            })
            .on_conflict(idempotency_keys::key)
            .do_nothing()
            .execute(&mut conn)
            .await
            .map_err(diesel_error)?;

        Ok(if inserted == 1 {
            ClaimOutcome::Won
        } else {
            ClaimOutcome::Lost
        })
    }

    async fn attach(
        &self,
        key: &IdempotencyKey,
        payout_id: PayoutId,
    ) -> Result<(), IdempotencyKeyStoreError> {
        let mut conn = self.pool.get().await.map_err(pool_error)?;

        let updated = diesel::update(idempotency_keys::table)
            .filter(idempotency_keys::key.eq(key.as_ref()))
            .filter(
                idempotency_keys::payout_id
                    .is_null()
                    .or(idempotency_keys::payout_id.eq(payout_id.get())),
            )
            .set(idempotency_keys::payout_id.eq(payout_id.get()))
            .execute(&mut conn)
            .await
            .map_err(diesel_error)?;

        if updated == 0 {
            return Err(IdempotencyKeyStoreError::attach_conflict(key.as_ref()));
        }
        Ok(())
    }

    async fn lookup(
        &self,
        key: &IdempotencyKey,
    ) -> Result<Option<IdempotencyKeyRecord>, IdempotencyKeyStoreError> {
        let mut conn = self.pool.get().await.map_err(pool_error)?;

        let row: Option<IdempotencyKeyRow> = idempotency_keys::table
            .filter(idempotency_keys::key.eq(key.as_ref()))
            .select(IdempotencyKeyRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(diesel_error)?;

        row.map(IdempotencyKeyRow::into_domain)
            .transpose()
            .map_err(|err| IdempotencyKeyStoreError::query(format!("corrupted key row: {err}")))
    }

    async fn release(&self, key: &IdempotencyKey) -> Result<bool, IdempotencyKeyStoreError> {
        let mut conn = self.pool.get().await.map_err(pool_error)?;

        let deleted = diesel::delete(idempotency_keys::table)
            .filter(idempotency_keys::key.eq(key.as_ref()))
            .filter(idempotency_keys::payout_id.is_null())
            .execute(&mut conn)
            .await
            .map_err(diesel_error)?;

        Ok(deleted > 0)
    }

    async fn cleanup_expired(&self, ttl: Duration) -> Result<u64, IdempotencyKeyStoreError> {
        let retention = TimeDelta::from_std(ttl)
            .map_err(|err| IdempotencyKeyStoreError::query(format!("invalid ttl: {err}")))?;
        let cutoff = Utc::now() - retention;
        let mut conn = self.pool.get().await.map_err(pool_error)?;

        let deleted = diesel::delete(idempotency_keys::table)
            .filter(idempotency_keys::created_at.lt(cutoff))
            .execute(&mut conn)
            .await
            .map_err(diesel_error)?;

        debug!(deleted, %cutoff, "deleted expired idempotency keys");
        Ok(affected_rows(deleted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn pool_failures_are_connection_errors() {
        let err = pool_error(PoolError::checkout("connection refused"));

        assert!(matches!(err, IdempotencyKeyStoreError::Connection { .. }));
        assert!(err.to_string().contains("connection refused"));
    }

    #[rstest]
    fn missing_rows_are_query_errors() {
        let err = diesel_error(diesel::result::Error::NotFound);

        assert!(matches!(err, IdempotencyKeyStoreError::Query { .. }));
    }
}
