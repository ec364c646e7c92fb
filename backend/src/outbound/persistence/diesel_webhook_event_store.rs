//! PostgreSQL-backed [`WebhookEventStore`].
//!
//! The event insert and the payout update share one transaction: a delivery
//! either records its event id and applies its status, or does neither. A
//! redelivery finds the primary key taken and changes nothing.

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, RunQueryDsl};
use tracing::debug;

use crate::domain::ports::{WebhookEventStore, WebhookEventStoreError};
use crate::domain::{StatusUpdate, WebhookApplyOutcome, WebhookEvent, WebhookStatusUpdate};

use super::diesel_helpers::{map_diesel_error, map_pool_error};
use super::models::{NewWebhookEventRow, PayoutRow};
use super::pool::{DbPool, PoolError};
use super::schema::{payouts, webhook_events};

/// Diesel-backed implementation of the [`WebhookEventStore`] port.
#[derive(Clone)]
pub struct DieselWebhookEventStore {
    pool: DbPool,
}

impl DieselWebhookEventStore {
    /// Create a store over a shared connection pool.
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug)]
enum WebhookTxError {
    Diesel(diesel::result::Error),
    Corrupt(String),
}

impl From<diesel::result::Error> for WebhookTxError {
    fn from(error: diesel::result::Error) -> Self {
        Self::Diesel(error)
    }
}

fn pool_error(error: PoolError) -> WebhookEventStoreError {
    map_pool_error(error, WebhookEventStoreError::connection)
}

fn diesel_error(error: diesel::result::Error) -> WebhookEventStoreError {
    map_diesel_error(
        error,
        WebhookEventStoreError::query,
        WebhookEventStoreError::connection,
    )
}

fn tx_error(error: WebhookTxError) -> WebhookEventStoreError {
    match error {
        WebhookTxError::Diesel(err) => diesel_error(err),
        WebhookTxError::Corrupt(message) => {
            WebhookEventStoreError::query(format!("corrupted payout row: {message}"))
        }
    }
}

#[async_trait]
impl WebhookEventStore for DieselWebhookEventStore {
    async fn record_and_apply(
        &self,
        event: &WebhookEvent,
        update: &WebhookStatusUpdate,
    ) -> Result<WebhookApplyOutcome, WebhookEventStoreError> {
        let mut conn = self.pool.get().await.map_err(pool_error)?;
        let row = NewWebhookEventRow {
            event_id: &event.event_id,
            raw_payload: &event.raw_payload,
            received_at: event.received_at,
        };

        conn.transaction::<_, WebhookTxError, _>(|tx| {
            async move {
                let inserted = diesel::insert_into(webhook_events::table)
                    .values(&row)
                    .on_conflict(webhook_events::event_id)
                    .do_nothing()
                    .execute(tx)
                    .await?;
                if inserted == 0 {
                    return Ok(WebhookApplyOutcome::Duplicate);
                }

                let found: Option<PayoutRow> = payouts::table
                    .filter(payouts::provider_ref.eq(update.provider_ref.as_str()))
                    .select(PayoutRow::as_select())
                    .for_update()
                    .first(tx)
                    .await
                    .optional()?;
                let Some(locked) = found else {
                    return Ok(WebhookApplyOutcome::UnknownPayout);
                };
                let Some(status) = update.status else {
                    return Ok(WebhookApplyOutcome::UnknownStatus);
                };

                let mut payout = locked.into_domain().map_err(WebhookTxError::Corrupt)?;
                let payout_id = payout.id;
                let applied = payout.apply_status(status, Utc::now());
                if let StatusUpdate::Applied(changed) = &applied {
                    diesel::update(payouts::table.find(payout_id.get()))
                        .set((
                            payouts::status.eq(changed.status.as_str()),
                            payouts::updated_at.eq(changed.updated_at),
                        ))
                        .execute(tx)
                        .await?;
                }
                debug!(%payout_id, event_id = %row.event_id, "webhook event recorded");
                Ok(WebhookApplyOutcome::from_status_update(payout_id, applied))
            }
            .scope_boxed()
        })
        .await
        .map_err(tx_error)
    }
}
