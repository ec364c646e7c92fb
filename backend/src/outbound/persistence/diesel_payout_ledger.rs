//! PostgreSQL-backed [`PayoutLedger`].
//!
//! Status and provider reference changes lock the payout row with
//! `SELECT … FOR UPDATE` so the transition check and the write see the same
//! state. `create_for_key` inserts the payout and attaches it to its claimed
//! key in one transaction.

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};

use crate::domain::ports::{PayoutLedger, PayoutLedgerError};
use crate::domain::{
    IdempotencyKey, NewPayout, PageRequest, Payout, PayoutId, PayoutPage, PayoutStatus,
    StatusUpdate, UserId,
};

use super::diesel_helpers::{is_unique_violation, map_diesel_error, map_pool_error};
use super::models::{NewPayoutRow, PayoutRow};
use super::pool::{DbPool, PoolError};
use super::schema::{idempotency_keys, payouts};

/// Diesel-backed implementation of the [`PayoutLedger`] port.
#[derive(Clone)]
pub struct DieselPayoutLedger {
    pool: DbPool,
}

impl DieselPayoutLedger {
    /// Create a ledger over a shared connection pool.
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Failure inside a ledger transaction; domain failures roll back too.
#[derive(Debug)]
enum LedgerTxError {
    Diesel(diesel::result::Error),
    Ledger(PayoutLedgerError),
}

impl From<diesel::result::Error> for LedgerTxError {
    fn from(error: diesel::result::Error) -> Self {
        Self::Diesel(error)
    }
}

impl From<LedgerTxError> for PayoutLedgerError {
    fn from(error: LedgerTxError) -> Self {
        match error {
            LedgerTxError::Diesel(err) => diesel_error(err),
            LedgerTxError::Ledger(err) => err,
        }
    }
}

fn pool_error(error: PoolError) -> PayoutLedgerError {
    map_pool_error(error, PayoutLedgerError::connection)
}

fn diesel_error(error: diesel::result::Error) -> PayoutLedgerError {
    map_diesel_error(error, PayoutLedgerError::query, PayoutLedgerError::connection)
}

fn to_domain(row: PayoutRow) -> Result<Payout, PayoutLedgerError> {
    row.into_domain()
        .map_err(|err| PayoutLedgerError::query(format!("corrupted payout row: {err}")))
}

fn new_row(payout: &NewPayout) -> NewPayoutRow<'_> {
    NewPayoutRow {
        user_id: *payout.user_id.as_uuid(),
        amount: payout.amount.value(),
        currency: payout.currency.code(),
        status: PayoutStatus::Processing.as_str(),
    }
}

async fn lock_payout(
    conn: &mut AsyncPgConnection,
    id: PayoutId,
) -> Result<Payout, LedgerTxError> {
    let found: Option<PayoutRow> = payouts::table
        .find(id.get())
        .select(PayoutRow::as_select())
        .for_update()
        .first(conn)
        .await
        .optional()?;
    let row = found.ok_or_else(|| LedgerTxError::Ledger(PayoutLedgerError::not_found(id.get())))?;
    to_domain(row).map_err(LedgerTxError::Ledger)
}

#[async_trait]
impl PayoutLedger for DieselPayoutLedger {
    async fn create(&self, payout: &NewPayout) -> Result<Payout, PayoutLedgerError> {
        let mut conn = self.pool.get().await.map_err(pool_error)?;

        let row: PayoutRow = diesel::insert_into(payouts::table)
            .values(&new_row(payout))
            .returning(PayoutRow::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(diesel_error)?;
        to_domain(row)
    }

    async fn create_for_key(
        &self,
        key: &IdempotencyKey,
        payout: &NewPayout,
    ) -> Result<Payout, PayoutLedgerError> {
        let mut conn = self.pool.get().await.map_err(pool_error)?;
        let key_str = key.as_ref();
        let owner = *payout.user_id.as_uuid();
        let row = new_row(payout);

        let created = conn
            .transaction::<_, LedgerTxError, _>(|tx| {
                async move {
                    let claimed: Option<String> = idempotency_keys::table
                        .filter(idempotency_keys::key.eq(key_str))
                        .filter(idempotency_keys::owner_user_id.eq(owner))
                        .filter(idempotency_keys::payout_id.is_null())
                        .select(idempotency_keys::key)
                        .for_update()
                        .first(tx)
                        .await
                        .optional()?;
                    if claimed.is_none() {
                        return Err(LedgerTxError::Ledger(PayoutLedgerError::key_not_claimed(
                            key_str,
                        )));
                    }

                    let inserted: PayoutRow = diesel::insert_into(payouts::table)
                        .values(&row)
                        .returning(PayoutRow::as_returning())
                        .get_result(tx)
                        .await?;

                    diesel::update(idempotency_keys::table)
                        .filter(idempotency_keys::key.eq(key_str))
                        .set(idempotency_keys::payout_id.eq(inserted.id))
                        .execute(tx)
                        .await?;

                    Ok(inserted)
                }
                .scope_boxed()
            })
            .await?;

        to_domain(created)
    }

    async fn get(&self, id: PayoutId) -> Result<Option<Payout>, PayoutLedgerError> {
        let mut conn = self.pool.get().await.map_err(pool_error)?;

        let row: Option<PayoutRow> = payouts::table
            .find(id.get())
            .select(PayoutRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(diesel_error)?;
        row.map(to_domain).transpose()
    }

    async fn list(
        &self,
        user_id: &UserId,
        page: PageRequest,
    ) -> Result<PayoutPage, PayoutLedgerError> {
        let offset = i64::try_from(page.offset())
            .map_err(|_| PayoutLedgerError::query("page offset out of range"))?;
        let owner = *user_id.as_uuid();
        let mut conn = self.pool.get().await.map_err(pool_error)?;

        let total: i64 = payouts::table
            .filter(payouts::user_id.eq(owner))
            .count()
            .get_result(&mut conn)
            .await
            .map_err(diesel_error)?;
        let rows: Vec<PayoutRow> = payouts::table
            .filter(payouts::user_id.eq(owner))
            .order_by(payouts::id.desc())
            .offset(offset)
            .limit(i64::from(page.limit()))
            .select(PayoutRow::as_select())
            .load(&mut conn)
            .await
            .map_err(diesel_error)?;

        Ok(PayoutPage {
            request: page,
            total: u64::try_from(total).unwrap_or_default(),
            items: rows
                .into_iter()
                .map(to_domain)
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    async fn update_status(
        &self,
        id: PayoutId,
        status: PayoutStatus,
    ) -> Result<StatusUpdate, PayoutLedgerError> {
        let mut conn = self.pool.get().await.map_err(pool_error)?;

        let update = conn
            .transaction::<_, LedgerTxError, _>(|tx| {
                async move {
                    let mut payout = lock_payout(tx, id).await?;
                    let outcome = payout.apply_status(status, Utc::now());
                    if let StatusUpdate::Applied(applied) = &outcome {
                        diesel::update(payouts::table.find(id.get()))
                            .set((
                                payouts::status.eq(applied.status.as_str()),
                                payouts::updated_at.eq(applied.updated_at),
                            ))
                            .execute(tx)
                            .await?;
                    }
                    Ok(outcome)
                }
                .scope_boxed()
            })
            .await?;

        Ok(update)
    }

    async fn set_provider_ref(
        &self,
        id: PayoutId,
        provider_ref: &str,
    ) -> Result<Payout, PayoutLedgerError> {
        let mut conn = self.pool.get().await.map_err(pool_error)?;

        let result = conn
            .transaction::<_, LedgerTxError, _>(|tx| {
                async move {
                    let mut payout = lock_payout(tx, id).await?;
                    let current_ref = payout.provider_ref.clone();
                    match current_ref.as_deref() {
                        Some(existing) if existing == provider_ref => return Ok(payout),
                        Some(existing) => {
                            return Err(LedgerTxError::Ledger(
                                PayoutLedgerError::provider_ref_conflict(format!(
                                    "payout {id} already has reference {existing}"
                                )),
                            ));
                        }
                        None => {}
                    }
                    if payout.status != PayoutStatus::Processing {
                        return Err(LedgerTxError::Ledger(PayoutLedgerError::invalid_state(
                            format!("payout {id} is {}", payout.status),
                        )));
                    }

                    let now = Utc::now();
                    diesel::update(payouts::table.find(id.get()))
                        .set((
                            payouts::provider_ref.eq(provider_ref),
                            payouts::updated_at.eq(now),
                        ))
                        .execute(tx)
                        .await?;
                    payout.provider_ref = Some(provider_ref.to_owned());
                    payout.updated_at = now;
                    Ok(payout)
                }
                .scope_boxed()
            })
            .await;

        match result {
            Err(LedgerTxError::Diesel(err)) if is_unique_violation(&err) => {
                Err(PayoutLedgerError::provider_ref_conflict(format!(
                    "{provider_ref} already belongs to another payout"
                )))
            }
            other => other.map_err(PayoutLedgerError::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diesel::result::{DatabaseErrorKind, Error as DieselError};
    use rstest::rstest;

    #[rstest]
    fn pool_failures_are_connection_errors() {
        let err = pool_error(PoolError::checkout("connection refused"));
        assert!(matches!(err, PayoutLedgerError::Connection { .. }));
    }

    #[rstest]
    fn transaction_errors_keep_domain_failures() {
        let err = PayoutLedgerError::from(LedgerTxError::Ledger(
            PayoutLedgerError::key_not_claimed("k-1"),
        ));
        assert!(matches!(err, PayoutLedgerError::KeyNotClaimed { .. }));
    }

    #[rstest]
    fn transaction_errors_map_driver_failures() {
        let err = PayoutLedgerError::from(LedgerTxError::Diesel(DieselError::DatabaseError(
            DatabaseErrorKind::ClosedConnection,
            Box::new("gone".to_owned()),
        )));
        assert!(matches!(err, PayoutLedgerError::Connection { .. }));
    }
}
