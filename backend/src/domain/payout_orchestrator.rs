//! End-to-end handling of one create-payout request.
//!
//! The request first claims its idempotency key. The winner creates the
//! payout and attaches the key in one transaction, submits to the provider
//! under the gateway's bounded retry policy, and returns the current
//! snapshot whatever the provider did. Losers poll the key until the
//! winner's payout appears or the wait deadline passes, then report
//! "processing" so the client retries with the same key.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, error, info, warn};

use super::ports::{
    CreatePayoutRequest, CreatePayoutResponse, IdempotencyKeyStore, IdempotencyKeyStoreError,
    PayoutCommand, PayoutLedger, PayoutLedgerError,
};
use super::{
    Amount, ClaimOutcome, ClaimWaitPolicy, CorrelationId, Currency, Error, IdempotencyKey,
    NewPayout, Payout, ProviderGateway, RetrySleeper, TokioSleeper, UserId,
};

const PROCESSING_MESSAGE: &str =
    "a payout for this idempotency key is still processing; retry with the same key";

/// Client-facing text for storage outages; the cause is only logged.
pub(crate) const STORAGE_UNAVAILABLE_MESSAGE: &str = "storage is temporarily unavailable";

fn map_key_store_error(error: IdempotencyKeyStoreError) -> Error {
    match error {
        IdempotencyKeyStoreError::Connection { message } => {
            error!(error = %message, "idempotency key store unavailable");
            Error::service_unavailable(STORAGE_UNAVAILABLE_MESSAGE)
        }
        other => Error::internal(format!("idempotency key store error: {other}")),
    }
}

fn map_ledger_error(error: PayoutLedgerError) -> Error {
    match error {
        PayoutLedgerError::Connection { message } => {
            error!(error = %message, "payout ledger unavailable");
            Error::service_unavailable(STORAGE_UNAVAILABLE_MESSAGE)
        }
        // The claim vanished between claim and create (released or reaped).
        PayoutLedgerError::KeyNotClaimed { .. } => processing_conflict(),
        other => Error::internal(format!("payout ledger error: {other}")),
    }
}

fn processing_conflict() -> Error {
    Error::conflict(PROCESSING_MESSAGE).with_details(json!({ "reason": "processing" }))
}

fn validate(request: &CreatePayoutRequest) -> Result<NewPayout, Error> {
    let amount = Amount::new(request.amount).map_err(|err| {
        Error::validation_failed(err.to_string()).with_details(json!({ "field": "amount" }))
    })?;
    let currency = request.currency.parse::<Currency>().map_err(|err| {
        Error::validation_failed(err.to_string()).with_details(json!({ "field": "currency" }))
    })?;
    Ok(NewPayout {
        user_id: request.user_id.clone(),
        amount,
        currency,
    })
}

/// Concrete implementation of [`PayoutCommand`].
pub struct PayoutOrchestrator {
    keys: Arc<dyn IdempotencyKeyStore>,
    ledger: Arc<dyn PayoutLedger>,
    gateway: Arc<ProviderGateway>,
    sleeper: Arc<dyn RetrySleeper>,
    wait: ClaimWaitPolicy,
}

impl PayoutOrchestrator {
    /// Create an orchestrator that waits with the Tokio sleeper.
    #[must_use]
    pub fn new(
        keys: Arc<dyn IdempotencyKeyStore>,
        ledger: Arc<dyn PayoutLedger>,
        gateway: Arc<ProviderGateway>,
        wait: ClaimWaitPolicy,
    ) -> Self {
        Self {
            keys,
            ledger,
            gateway,
            sleeper: Arc::new(TokioSleeper),
            wait,
        }
    }

    /// Replace the sleeper used between claim lookups.
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn RetrySleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    async fn create_as_winner(
        &self,
        key: &IdempotencyKey,
        new_payout: NewPayout,
    ) -> Result<Payout, Error> {
        let created = match self.ledger.create_for_key(key, &new_payout).await {
            Ok(payout) => payout,
            Err(err) => {
                error!(idempotency_key = %key, error = %err, "failed to create payout");
                self.release_claim(key).await;
                return Err(map_ledger_error(err));
            }
        };
        info!(
            payout_id = %created.id,
            user_id = %created.user_id,
            amount = %created.amount,
            currency = %created.currency,
            "payout created"
        );

        let outcome = self.gateway.submit(&created, CorrelationId::current()).await;
        debug!(payout_id = %created.id, attempts = outcome.attempts(), "provider submission finished");

        match self.ledger.get(created.id).await {
            Ok(Some(current)) => Ok(current),
            Ok(None) => Ok(created),
            Err(err) => {
                warn!(payout_id = %created.id, error = %err, "failed to refresh payout snapshot");
                Ok(created)
            }
        }
    }

    async fn release_claim(&self, key: &IdempotencyKey) {
        match self.keys.release(key).await {
            Ok(true) => info!(idempotency_key = %key, "released idempotency claim"),
            Ok(false) => {}
            Err(err) => {
                warn!(idempotency_key = %key, error = %err, "failed to release idempotency claim");
            }
        }
    }

    async fn wait_for_winner(&self, key: &IdempotencyKey, user_id: &UserId) -> Result<Payout, Error> {
        let max_polls = self.wait.max_polls();

        for poll in 0..=max_polls {
            if poll > 0 {
                self.sleeper.sleep(self.wait.poll_interval).await;
            }

            let Some(record) = self.keys.lookup(key).await.map_err(map_key_store_error)? else {
                // Released by a failed winner or reaped; the client may retry.
                return Err(processing_conflict());
            };

            if &record.owner != user_id {
                warn!(idempotency_key = %key, "idempotency key reused by another user");
                return Err(Error::conflict(
                    "idempotency key is already in use by another request",
                ));
            }

            if let Some(payout_id) = record.payout_id {
                return self
                    .ledger
                    .get(payout_id)
                    .await
                    .map_err(map_ledger_error)?
                    .ok_or_else(|| {
                        Error::internal(format!(
                            "idempotency key references missing payout {payout_id}"
                        ))
                    });
            }
        }

        info!(idempotency_key = %key, "claim wait deadline elapsed");
        Err(processing_conflict())
    }
}

#[async_trait]
impl PayoutCommand for PayoutOrchestrator {
    async fn create_payout(
        &self,
        request: CreatePayoutRequest,
    ) -> Result<CreatePayoutResponse, Error> {
        let new_payout = validate(&request)?;
        let key = &request.idempotency_key;

        match self
            .keys
            .claim(key, &request.user_id)
            .await
            .map_err(map_key_store_error)?
        {
            ClaimOutcome::Won => {
                let payout = self.create_as_winner(key, new_payout).await?;
                Ok(CreatePayoutResponse {
                    payout,
                    replayed: false,
                })
            }
            ClaimOutcome::Lost => {
                let payout = self.wait_for_winner(key, &request.user_id).await?;
                debug!(payout_id = %payout.id, idempotency_key = %key, "resolved existing payout");
                Ok(CreatePayoutResponse {
                    payout,
                    replayed: true,
                })
            }
        }
    }
}

#[cfg(test)]
#[path = "payout_orchestrator_tests.rs"]
mod tests;
