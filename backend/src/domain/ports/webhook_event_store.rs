//! Port for durable webhook deduplication.
//!
//! Recording an event and applying its status update are one atomic unit so
//! concurrent deliveries of the same event cannot both pass the dedup check.

use async_trait::async_trait;

use crate::domain::{WebhookApplyOutcome, WebhookEvent, WebhookStatusUpdate};

use super::define_port_error;

define_port_error! {
    /// Errors raised by webhook event store adapters.
    pub enum WebhookEventStoreError {
        /// Store connection could not be established.
        Connection {
            /// Detail reported by the backend.
            message: String,
        } => "webhook event store connection failed: {message}",
        /// Query or mutation failed during execution.
        Query {
            /// Detail reported by the backend.
            message: String,
        } => "webhook event store query failed: {message}",
    }
}

/// Port recording provider events exactly once.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WebhookEventStore: Send + Sync {
    /// Insert `event` if its id is new and, in the same transaction, apply
    /// `update` to the payout matching its provider reference.
    ///
    /// Returns [`WebhookApplyOutcome::Duplicate`] without side effects when
    /// the event id was already recorded.
    async fn record_and_apply(
        &self,
        event: &WebhookEvent,
        update: &WebhookStatusUpdate,
    ) -> Result<WebhookApplyOutcome, WebhookEventStoreError>;
}

/// Fixture store that acknowledges every event without matching a payout.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureWebhookEventStore;

#[async_trait]
impl WebhookEventStore for FixtureWebhookEventStore {
    async fn record_and_apply(
        &self,
        _event: &WebhookEvent,
        _update: &WebhookStatusUpdate,
    ) -> Result<WebhookApplyOutcome, WebhookEventStoreError> {
        Ok(WebhookApplyOutcome::UnknownPayout)
    }
}
