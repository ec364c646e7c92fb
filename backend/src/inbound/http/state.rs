//! Shared HTTP adapter state.
//!
//! Handlers receive this through `web::Data` and depend only on driving
//! ports, so they can be exercised with fixtures or mocks.

use std::sync::Arc;

use crate::domain::ports::{
    FixturePayoutCommand, FixturePayoutQuery, FixtureWebhookCommand, PayoutCommand, PayoutQuery,
    WebhookCommand,
};

/// Dependency bundle for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    /// Payout creation.
    pub payouts: Arc<dyn PayoutCommand>,
    /// Payout listing.
    pub payouts_query: Arc<dyn PayoutQuery>,
    /// Provider callback handling.
    pub webhooks: Arc<dyn WebhookCommand>,
    /// Whether `POST /auth/dev-login` may mint sessions.
    pub dev_login: bool,
}

impl HttpState {
    /// Bundle the driving ports; development login starts disabled.
    #[must_use]
    pub fn new(
        payouts: Arc<dyn PayoutCommand>,
        payouts_query: Arc<dyn PayoutQuery>,
        webhooks: Arc<dyn WebhookCommand>,
    ) -> Self {
        Self {
            payouts,
            payouts_query,
            webhooks,
            dev_login: false,
        }
    }

    /// Enable or disable development session issuance.
    #[must_use]
    pub const fn with_dev_login(mut self, enabled: bool) -> Self {
        self.dev_login = enabled;
        self
    }
}

impl Default for HttpState {
    /// Fixture-backed state for handler tests.
    fn default() -> Self {
        Self::new(
            Arc::new(FixturePayoutCommand),
            Arc::new(FixturePayoutQuery),
            Arc::new(FixtureWebhookCommand),
        )
    }
}
