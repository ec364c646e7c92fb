//! Builders wiring storage adapters and domain services into HTTP state.

use std::sync::Arc;

use color_eyre::eyre::{Result, WrapErr};
use mockable::DefaultClock;
use tracing::{info, warn};

use payouts::domain::ports::{IdempotencyKeyStore, PayoutLedger, WebhookEventStore};
use payouts::domain::{
    PayoutOrchestrator, PayoutQueryService, ProviderGateway, WebhookReconciler, WebhookVerifier,
};
use payouts::inbound::http::state::HttpState;
use payouts::outbound::memory::InMemoryPayoutStore;
use payouts::outbound::persistence::{
    DbPool, DieselIdempotencyKeyStore, DieselPayoutLedger, DieselWebhookEventStore,
    run_migrations,
};
use payouts::outbound::provider::HttpPaymentProvider;
use payouts::settings::PayoutSettings;

/// Storage ports shared by every service.
#[derive(Clone)]
pub struct Storage {
    /// Idempotency key claims.
    pub keys: Arc<dyn IdempotencyKeyStore>,
    /// Payout records.
    pub ledger: Arc<dyn PayoutLedger>,
    /// Processed webhook events.
    pub events: Arc<dyn WebhookEventStore>,
}

impl Storage {
    fn in_memory() -> Self {
        let store = InMemoryPayoutStore::new();
        Self {
            keys: Arc::new(store.clone()),
            ledger: Arc::new(store.clone()),
            events: Arc::new(store),
        }
    }

    fn postgres(pool: &DbPool) -> Self {
        Self {
            keys: Arc::new(DieselIdempotencyKeyStore::new(pool.clone())),
            ledger: Arc::new(DieselPayoutLedger::new(pool.clone())),
            events: Arc::new(DieselWebhookEventStore::new(pool.clone())),
        }
    }
}

/// Use PostgreSQL when a database URL is configured, after applying pending
/// migrations; otherwise fall back to the in-memory store.
///
/// # Errors
///
/// Fails when migrations cannot be applied or the pool cannot be built.
pub async fn build_storage(settings: &PayoutSettings) -> Result<Storage> {
    let Some(pool_config) = settings.pool_config() else {
        warn!("no database configured; payouts are kept in memory");
        return Ok(Storage::in_memory());
    };

    let applied = run_migrations(pool_config.database_url())
        .await
        .wrap_err("failed to apply database migrations")?;
    info!(applied, "database migrations applied");
    let pool = DbPool::new(pool_config)
        .await
        .wrap_err("failed to build database pool")?;
    Ok(Storage::postgres(&pool))
}

/// Construct the domain services behind the HTTP driving ports.
///
/// # Errors
///
/// Fails on invalid settings or when the provider client cannot be built.
pub fn build_http_state(settings: &PayoutSettings, storage: &Storage) -> Result<HttpState> {
    let gateway_config = settings.gateway_config()?;
    let provider = HttpPaymentProvider::new(settings.provider_url()?, gateway_config.attempt_timeout)
        .wrap_err("failed to build provider client")?;
    info!(
        max_attempts = gateway_config.max_attempts,
        worst_case_ms = u64::try_from(gateway_config.worst_case_latency().as_millis())
            .unwrap_or(u64::MAX),
        "provider submissions are bounded"
    );
    let gateway = Arc::new(ProviderGateway::new(
        Arc::new(provider),
        storage.ledger.clone(),
        gateway_config,
    ));

    let orchestrator = PayoutOrchestrator::new(
        storage.keys.clone(),
        storage.ledger.clone(),
        gateway,
        settings.claim_wait_policy()?,
    );
    let reconciler = WebhookReconciler::new(
        WebhookVerifier::new(settings.webhook_verifier_config()?),
        storage.events.clone(),
        Arc::new(DefaultClock),
    );
    let query = PayoutQueryService::new(storage.ledger.clone());

    Ok(HttpState::new(Arc::new(orchestrator), Arc::new(query), Arc::new(reconciler))
        .with_dev_login(settings.dev_login))
}
