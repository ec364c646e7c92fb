//! Driving port for inbound provider webhooks.

use async_trait::async_trait;

use crate::domain::{Error, WebhookApplyOutcome};

/// One delivery as received, before verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookDelivery {
    /// Raw request body; the signature covers these exact bytes.
    pub body: Vec<u8>,
    /// Value of the `x-sig` header.
    pub signature: Option<String>,
    /// Value of the `x-sig-ts` header.
    pub timestamp: Option<String>,
}

/// Driving port for webhook reconciliation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WebhookCommand: Send + Sync {
    /// Verify, deduplicate, and apply one delivery.
    ///
    /// Stale or malformed deliveries fail with
    /// [`crate::domain::ErrorCode::InvalidRequest`]; signature failures with
    /// [`crate::domain::ErrorCode::Unauthorized`]. Replays succeed.
    async fn handle_webhook(&self, delivery: WebhookDelivery)
    -> Result<WebhookApplyOutcome, Error>;
}

/// Fixture command acknowledging every delivery.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureWebhookCommand;

#[async_trait]
impl WebhookCommand for FixtureWebhookCommand {
    async fn handle_webhook(
        &self,
        _delivery: WebhookDelivery,
    ) -> Result<WebhookApplyOutcome, Error> {
        Ok(WebhookApplyOutcome::UnknownPayout)
    }
}
