//! Single-process adapters implementing every storage port.
//!
//! One [`InMemoryPayoutStore`] holds keys, payouts, and webhook events behind
//! a single lock so each port operation is atomic, mirroring the guarantees
//! the PostgreSQL adapters obtain from unique constraints and transactions.
//! Used when no database is configured and throughout the test suite.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::TimeDelta;
use mockable::{Clock, DefaultClock};
use tokio::sync::RwLock;

use crate::domain::ports::{
    IdempotencyKeyStore, IdempotencyKeyStoreError, PayoutLedger, PayoutLedgerError,
    WebhookEventStore, WebhookEventStoreError,
};
use crate::domain::{
    ClaimOutcome, IdempotencyKey, IdempotencyKeyRecord, NewPayout, PageRequest, Payout,
    PayoutId, PayoutPage, PayoutStatus, StatusUpdate, UserId, WebhookApplyOutcome, WebhookEvent,
    WebhookStatusUpdate,
};

#[derive(Default)]
struct MemoryState {
    keys: HashMap<String, IdempotencyKeyRecord>,
    payouts: BTreeMap<i64, Payout>,
    events: HashMap<String, WebhookEvent>,
    last_payout_id: i64,
}

impl MemoryState {
    fn insert_payout(&mut self, payout: &NewPayout, now: chrono::DateTime<chrono::Utc>) -> Payout {
        self.last_payout_id += 1;
        let created = Payout {
            id: PayoutId::new(self.last_payout_id),
            user_id: payout.user_id.clone(),
            amount: payout.amount,
            currency: payout.currency,
            status: PayoutStatus::Processing,
            provider_ref: None,
            created_at: now,
            updated_at: now,
        };
        self.payouts.insert(created.id.get(), created.clone());
        created
    }
}

/// Thread-safe in-memory store shared by the key, ledger, and webhook ports.
#[derive(Clone)]
pub struct InMemoryPayoutStore {
    state: Arc<RwLock<MemoryState>>,
    clock: Arc<dyn Clock>,
}

impl Default for InMemoryPayoutStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryPayoutStore {
    /// Create an empty store using the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(DefaultClock))
    }

    /// Create an empty store stamping records with `clock`.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(RwLock::new(MemoryState::default())),
            clock,
        }
    }

    /// Number of payout rows.
    pub async fn payout_count(&self) -> usize {
        self.state.read().await.payouts.len()
    }

    /// Number of recorded webhook events.
    pub async fn webhook_event_count(&self) -> usize {
        self.state.read().await.events.len()
    }
}

#[async_trait]
impl IdempotencyKeyStore for InMemoryPayoutStore {
    async fn claim(
        &self,
        key: &IdempotencyKey,
        owner: &UserId,
    ) -> Result<ClaimOutcome, IdempotencyKeyStoreError> {
        let mut state = self.state.write().await;
        if state.keys.contains_key(key.as_ref()) {
            return Ok(ClaimOutcome::Lost);
        }
        state.keys.insert(
            key.as_ref().to_owned(),
            IdempotencyKeyRecord {
                key: key.clone(),
                owner: owner.clone(),
                payout_id: None,
                created_at: self.clock.utc(),
            },
        );
        Ok(ClaimOutcome::Won)
    }

    async fn attach(
        &self,
        key: &IdempotencyKey,
        payout_id: PayoutId,
    ) -> Result<(), IdempotencyKeyStoreError> {
        let mut state = self.state.write().await;
        let record = state
            .keys
            .get_mut(key.as_ref())
            .ok_or_else(|| IdempotencyKeyStoreError::attach_conflict(key.as_ref()))?;
        match record.payout_id {
            None => {
                record.payout_id = Some(payout_id);
                Ok(())
            }
            Some(existing) if existing == payout_id => Ok(()),
            Some(_) => Err(IdempotencyKeyStoreError::attach_conflict(key.as_ref())),
        }
    }

    async fn lookup(
        &self,
        key: &IdempotencyKey,
    ) -> Result<Option<IdempotencyKeyRecord>, IdempotencyKeyStoreError> {
        Ok(self.state.read().await.keys.get(key.as_ref()).cloned())
    }

    async fn release(&self, key: &IdempotencyKey) -> Result<bool, IdempotencyKeyStoreError> {
        let mut state = self.state.write().await;
        let unattached = state
            .keys
            .get(key.as_ref())
            .is_some_and(|record| record.payout_id.is_none());
        if unattached {
            state.keys.remove(key.as_ref());
        }
        Ok(unattached)
    }

    async fn cleanup_expired(&self, ttl: Duration) -> Result<u64, IdempotencyKeyStoreError> {
        let retention = TimeDelta::from_std(ttl)
            .map_err(|err| IdempotencyKeyStoreError::query(format!("invalid ttl: {err}")))?;
        let cutoff = self.clock.utc() - retention;
        let mut state = self.state.write().await;
        let before = state.keys.len();
        state.keys.retain(|_, record| record.created_at >= cutoff);
        Ok(u64::try_from(before - state.keys.len()).unwrap_or(u64::MAX))
    }
}

#[async_trait]
impl PayoutLedger for InMemoryPayoutStore {
    async fn create(&self, payout: &NewPayout) -> Result<Payout, PayoutLedgerError> {
        let now = self.clock.utc();
        Ok(self.state.write().await.insert_payout(payout, now))
    }

    async fn create_for_key(
        &self,
        key: &IdempotencyKey,
        payout: &NewPayout,
    ) -> Result<Payout, PayoutLedgerError> {
        let now = self.clock.utc();
        let mut state = self.state.write().await;
        let claimable = state.keys.get(key.as_ref()).is_some_and(|record| {
            record.payout_id.is_none() && record.owner == payout.user_id
        });
        if !claimable {
            return Err(PayoutLedgerError::key_not_claimed(key.as_ref()));
        }
        let created = state.insert_payout(payout, now);
        if let Some(record) = state.keys.get_mut(key.as_ref()) {
            record.payout_id = Some(created.id);
        }
        Ok(created)
    }

    async fn get(&self, id: PayoutId) -> Result<Option<Payout>, PayoutLedgerError> {
        Ok(self.state.read().await.payouts.get(&id.get()).cloned())
    }

    async fn list(
        &self,
        user_id: &UserId,
        page: PageRequest,
    ) -> Result<PayoutPage, PayoutLedgerError> {
        let state = self.state.read().await;
        let owned = state
            .payouts
            .values()
            .rev()
            .filter(|payout| &payout.user_id == user_id);
        let total = u64::try_from(owned.clone().count()).unwrap_or(u64::MAX);
        let skip = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        let take = usize::try_from(page.limit()).unwrap_or(usize::MAX);
        Ok(PayoutPage {
            request: page,
            total,
            items: owned.skip(skip).take(take).cloned().collect(),
        })
    }

    async fn update_status(
        &self,
        id: PayoutId,
        status: PayoutStatus,
    ) -> Result<StatusUpdate, PayoutLedgerError> {
        let now = self.clock.utc();
        let mut state = self.state.write().await;
        let payout = state
            .payouts
            .get_mut(&id.get())
            .ok_or_else(|| PayoutLedgerError::not_found(id.get()))?;
        Ok(payout.apply_status(status, now))
    }

    async fn set_provider_ref(
        &self,
        id: PayoutId,
        provider_ref: &str,
    ) -> Result<Payout, PayoutLedgerError> {
        let now = self.clock.utc();
        let mut state = self.state.write().await;
        let taken = state.payouts.values().any(|payout| {
            payout.id != id && payout.provider_ref.as_deref() == Some(provider_ref)
        });
        if taken {
            return Err(PayoutLedgerError::provider_ref_conflict(format!(
                "{provider_ref} already belongs to another payout"
            )));
        }
        let payout = state
            .payouts
            .get_mut(&id.get())
            .ok_or_else(|| PayoutLedgerError::not_found(id.get()))?;
        match payout.provider_ref.as_deref() {
            Some(existing) if existing == provider_ref => return Ok(payout.clone()),
            Some(existing) => {
                return Err(PayoutLedgerError::provider_ref_conflict(format!(
                    "payout {id} already has reference {existing}"
                )));
            }
            None => {}
        }
        if payout.status != PayoutStatus::Processing {
            return Err(PayoutLedgerError::invalid_state(format!(
                "payout {id} is {}",
                payout.status
            )));
        }
        payout.provider_ref = Some(provider_ref.to_owned());
        payout.updated_at = now;
        Ok(payout.clone())
    }
}

#[async_trait]
impl WebhookEventStore for InMemoryPayoutStore {
    async fn record_and_apply(
        &self,
        event: &WebhookEvent,
        update: &WebhookStatusUpdate,
    ) -> Result<WebhookApplyOutcome, WebhookEventStoreError> {
        let now = self.clock.utc();
        let mut state = self.state.write().await;
        if state.events.contains_key(&event.event_id) {
            return Ok(WebhookApplyOutcome::Duplicate);
        }
        state.events.insert(event.event_id.clone(), event.clone());

        let Some(payout) = state
            .payouts
            .values_mut()
            .find(|payout| payout.provider_ref.as_deref() == Some(update.provider_ref.as_str()))
        else {
            return Ok(WebhookApplyOutcome::UnknownPayout);
        };
        let Some(status) = update.status else {
            return Ok(WebhookApplyOutcome::UnknownStatus);
        };
        let payout_id = payout.id;
        Ok(WebhookApplyOutcome::from_status_update(
            payout_id,
            payout.apply_status(status, now),
        ))
    }
}
