//! Verification and exactly-once application of provider webhooks.
//!
//! Deliveries are checked for freshness, then for a valid signature, and
//! only then parsed. The dedup insert and the status change happen in one
//! store transaction, so replays and concurrent duplicates are harmless.

use std::sync::Arc;

use async_trait::async_trait;
use mockable::Clock;
use serde_json::json;
use tracing::{error, info, warn};

use super::ports::{WebhookCommand, WebhookDelivery, WebhookEventStore, WebhookEventStoreError};
use super::payout_orchestrator::STORAGE_UNAVAILABLE_MESSAGE;
use super::{
    Error, SignedTimestamp, WEBHOOK_EVENT_ID_MAX_LEN, WebhookApplyOutcome, WebhookEvent,
    WebhookPayload, WebhookStatusUpdate, WebhookVerificationError, WebhookVerifier,
};

fn map_store_error(error: WebhookEventStoreError) -> Error {
    match error {
        WebhookEventStoreError::Connection { message } => {
            error!(error = %message, "webhook event store unavailable");
            Error::service_unavailable(STORAGE_UNAVAILABLE_MESSAGE)
        }
        WebhookEventStoreError::Query { message } => {
            Error::internal(format!("webhook event store error: {message}"))
        }
    }
}

fn map_verification_error(error: WebhookVerificationError) -> Error {
    match error {
        WebhookVerificationError::MalformedTimestamp => Error::invalid_request(error.to_string()),
        WebhookVerificationError::Stale { skew_secs } => {
            Error::invalid_request("stale signature").with_details(json!({ "skewSecs": skew_secs }))
        }
        WebhookVerificationError::BadSignature => Error::unauthorized("bad signature"),
        WebhookVerificationError::InvalidSecret => {
            Error::internal("webhook verifier is misconfigured")
        }
    }
}

fn parse_timestamp(raw: Option<&str>) -> Result<SignedTimestamp, Error> {
    let header = raw
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| Error::invalid_request("missing x-sig-ts header"))?;
    SignedTimestamp::parse(header).map_err(map_verification_error)
}

fn reject(error: WebhookVerificationError) -> Error {
    warn!(error = %error, "rejected webhook delivery");
    map_verification_error(error)
}

/// Concrete implementation of [`WebhookCommand`].
pub struct WebhookReconciler {
    verifier: WebhookVerifier,
    events: Arc<dyn WebhookEventStore>,
    clock: Arc<dyn Clock>,
}

impl WebhookReconciler {
    /// Create a reconciler.
    #[must_use]
    pub fn new(
        verifier: WebhookVerifier,
        events: Arc<dyn WebhookEventStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            verifier,
            events,
            clock,
        }
    }

    fn verify(&self, delivery: &WebhookDelivery) -> Result<(), Error> {
        let timestamp = parse_timestamp(delivery.timestamp.as_deref())?;
        let now = self.clock.utc();
        self.verifier.ensure_fresh(&timestamp, now).map_err(reject)?;
        let signature = delivery
            .signature
            .as_deref()
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| Error::unauthorized("missing x-sig header"))?;

        self.verifier
            .verify(&delivery.body, signature, &timestamp, now)
            .map_err(reject)
    }
}

#[async_trait]
impl WebhookCommand for WebhookReconciler {
    async fn handle_webhook(
        &self,
        delivery: WebhookDelivery,
    ) -> Result<WebhookApplyOutcome, Error> {
        self.verify(&delivery)?;

        let payload: WebhookPayload = serde_json::from_slice(&delivery.body)
            .map_err(|err| Error::invalid_request(format!("malformed webhook payload: {err}")))?;
        if payload.event_id.trim().is_empty() {
            return Err(Error::invalid_request("webhook event_id must not be empty"));
        }
        if payload.event_id.len() > WEBHOOK_EVENT_ID_MAX_LEN {
            return Err(Error::invalid_request(format!(
                "webhook event_id must be at most {WEBHOOK_EVENT_ID_MAX_LEN} bytes"
            ))
            .with_details(json!({ "field": "event_id" })));
        }
        let raw_payload = String::from_utf8(delivery.body)
            .map_err(|_| Error::invalid_request("webhook payload must be UTF-8"))?;

        let update = WebhookStatusUpdate {
            provider_ref: payload.payout_ref.clone(),
            status: payload.known_status(),
        };
        let event = WebhookEvent {
            event_id: payload.event_id,
            raw_payload,
            received_at: self.clock.utc(),
        };

        let outcome = self
            .events
            .record_and_apply(&event, &update)
            .await
            .map_err(map_store_error)?;

        match &outcome {
            WebhookApplyOutcome::Duplicate => {
                info!(event_id = %event.event_id, "webhook replay ignored");
            }
            WebhookApplyOutcome::Applied { payout_id, status } => {
                info!(event_id = %event.event_id, payout_id = %payout_id, status = %status, "payout status updated");
            }
            WebhookApplyOutcome::Unchanged { payout_id } => {
                info!(event_id = %event.event_id, payout_id = %payout_id, "payout status unchanged");
            }
            WebhookApplyOutcome::Rejected {
                payout_id,
                current,
                requested,
            } => {
                warn!(
                    event_id = %event.event_id,
                    payout_id = %payout_id,
                    current = %current,
                    requested = %requested,
                    "ignored status regression from terminal state"
                );
            }
            WebhookApplyOutcome::UnknownPayout => {
                warn!(event_id = %event.event_id, provider_ref = %update.provider_ref, "webhook references unknown payout");
            }
            WebhookApplyOutcome::UnknownStatus => {
                warn!(event_id = %event.event_id, status = ?payload.status, "webhook carries unknown status");
            }
        }

        Ok(outcome)
    }
}

#[cfg(test)]
#[path = "webhook_reconciler_tests.rs"]
mod tests;
