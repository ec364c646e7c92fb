//! Internal Diesel row structs for database operations.
//!
//! These types are implementation details of the persistence layer and must
//! never be exposed to the domain.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::{
    Amount, IdempotencyKey, IdempotencyKeyRecord, Payout, PayoutId, PayoutStatus, UserId,
};

use super::schema::{idempotency_keys, payouts, webhook_events};

/// Row struct for reading from the payouts table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = payouts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct PayoutRow {
    pub id: i64,
    pub user_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub status: String,
    pub provider_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PayoutRow {
    /// Convert into the domain model, rejecting values the schema should
    /// never have admitted.
    pub(crate) fn into_domain(self) -> Result<Payout, String> {
        let amount =
            Amount::new(self.amount).map_err(|err| format!("payout {}: {err}", self.id))?;
        let currency = self
            .currency
            .parse()
            .map_err(|err| format!("payout {}: {err}", self.id))?;
        let status: PayoutStatus = self
            .status
            .parse()
            .map_err(|err| format!("payout {}: {err}", self.id))?;
        Ok(Payout {
            id: PayoutId::new(self.id),
            user_id: UserId::from_uuid(self.user_id),
            amount,
            currency,
            status,
            provider_ref: self.provider_ref,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Insertable struct for new payout rows.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = payouts)]
pub(crate) struct NewPayoutRow<'a> {
    pub user_id: Uuid,
    pub amount: Decimal,
    pub currency: &'a str,
    pub status: &'a str,
}

/// Row struct for reading from the idempotency_keys table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = idempotency_keys)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct IdempotencyKeyRow {
    pub key: String,
    pub owner_user_id: Uuid,
    pub payout_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl IdempotencyKeyRow {
    pub(crate) fn into_domain(self) -> Result<IdempotencyKeyRecord, String> {
        let key = IdempotencyKey::new(&self.key).map_err(|err| err.to_string())?;
        Ok(IdempotencyKeyRecord {
            key,
            owner: UserId::from_uuid(self.owner_user_id),
            payout_id: self.payout_id.map(PayoutId::new),
            created_at: self.created_at,
        })
    }
}

/// Insertable struct for claiming a key.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = idempotency_keys)]
pub(crate) struct NewIdempotencyKeyRow<'a> {
    pub key: &'a str,
    pub owner_user_id: Uuid,
}

/// Insertable struct for recording a webhook delivery.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = webhook_events)]
pub(crate) struct NewWebhookEventRow<'a> {
    pub event_id: &'a str,
    pub raw_payload: &'a str,
    pub received_at: DateTime<Utc>,
}
