//! Shared wiring for payout service behaviour tests.

use std::sync::Arc;

use actix_http::Request;
use actix_web::cookie::Cookie;
use actix_web::dev::{Service, ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::{App, test as actix_test, web};
use chrono::Utc;
use mockable::DefaultClock;
use serde_json::{Value, json};

use payouts::CorrelationMiddleware;
use payouts::domain::ports::PayoutLedger;
use payouts::domain::{
    ClaimWaitPolicy, PayoutOrchestrator, PayoutQueryService, ProviderGateway,
    ProviderGatewayConfig, ProviderGatewayRuntime, SignedTimestamp, WebhookReconciler,
    WebhookVerifier, WebhookVerifierConfig,
};
use payouts::inbound::http::configure_api;
use payouts::inbound::http::idempotency::IDEMPOTENCY_KEY_HEADER;
use payouts::inbound::http::state::HttpState;
use payouts::inbound::http::test_utils::{session_cookie, test_session_middleware};
use payouts::inbound::http::webhooks::{SIGNATURE_HEADER, SIGNATURE_TIMESTAMP_HEADER};
use payouts::outbound::memory::InMemoryPayoutStore;
use payouts::test_support::provider::{ImmediateSleeper, NoJitter, ScriptedProvider};

pub const USER_A: &str = "3fa85f64-5717-4562-b3fc-2c963f66afa6";
pub const USER_B: &str = "9b2f6a1e-1c7d-4d1a-8f3e-0a6b7c8d9e0f";
const WEBHOOK_SECRET: &str = "test_secret";

/// In-memory service graph with a scripted provider.
pub struct Harness {
    pub store: InMemoryPayoutStore,
    pub provider: Arc<ScriptedProvider>,
    verifier: WebhookVerifier,
    state: HttpState,
}

impl Harness {
    /// Wire every service over one in-memory store. Provider retries do not
    /// sleep; losing requests wait with the real Tokio sleeper.
    pub fn new(provider: ScriptedProvider) -> Self {
        let store = InMemoryPayoutStore::new();
        let shared_provider = Arc::new(provider);
        let ledger: Arc<dyn PayoutLedger> = Arc::new(store.clone());
        let gateway = Arc::new(ProviderGateway::with_runtime(
            shared_provider.clone(),
            ledger.clone(),
            ProviderGatewayRuntime {
                sleeper: Arc::new(ImmediateSleeper),
                jitter: Arc::new(NoJitter),
            },
            ProviderGatewayConfig::default(),
        ));
        let orchestrator = PayoutOrchestrator::new(
            Arc::new(store.clone()),
            ledger.clone(),
            gateway,
            ClaimWaitPolicy::default(),
        );
        let verifier = WebhookVerifier::new(WebhookVerifierConfig::new(WEBHOOK_SECRET));
        let reconciler = WebhookReconciler::new(
            verifier.clone(),
            Arc::new(store.clone()),
            Arc::new(DefaultClock),
        );
        let state = HttpState::new(
            Arc::new(orchestrator),
            Arc::new(PayoutQueryService::new(ledger)),
            Arc::new(reconciler),
        )
        .with_dev_login(true);

        Self {
            store,
            provider: shared_provider,
            verifier,
            state,
        }
    }

    /// Harness whose provider accepts every submission.
    pub fn accepting() -> Self {
        Self::new(ScriptedProvider::accepting())
    }

    /// Route table as mounted by the server, with a test session key.
    pub fn app(
        &self,
    ) -> App<
        impl ServiceFactory<
            ServiceRequest,
            Config = (),
            Response = ServiceResponse,
            Error = actix_web::Error,
            InitError = (),
        > + use<>,
    > {
        App::new()
            .app_data(web::Data::new(self.state.clone()))
            .configure(|cfg| configure_api(cfg, true))
            .wrap(test_session_middleware())
            .wrap(CorrelationMiddleware)
    }

    /// Webhook request signed at `timestamp` over exactly `body`.
    pub fn webhook_at(&self, body: &[u8], timestamp: i64) -> Request {
        self.webhook_with_header(body, &timestamp.to_string())
    }

    /// Webhook request whose `x-sig-ts` carries `header` verbatim.
    pub fn webhook_with_header(&self, body: &[u8], header: &str) -> Request {
        let timestamp = SignedTimestamp::parse(header).expect("integer timestamp header");
        let signature = self.verifier.sign(&timestamp, body).expect("sign webhook");
        actix_test::TestRequest::post()
            .uri("/webhooks/payments")
            .insert_header((SIGNATURE_HEADER, signature))
            .insert_header((SIGNATURE_TIMESTAMP_HEADER, header.to_owned()))
            .set_payload(body.to_vec())
            .to_request()
    }

    /// Webhook request signed now.
    pub fn webhook(&self, payload: &Value) -> Request {
        let body = serde_json::to_vec(payload).expect("serialize webhook");
        self.webhook_at(&body, Utc::now().timestamp())
    }
}

/// Log in through the development endpoint and return the session cookie.
pub async fn login(
    app: &impl Service<Request, Response = ServiceResponse, Error = actix_web::Error>,
    user: &str,
) -> Cookie<'static> {
    let res = actix_test::call_service(
        app,
        actix_test::TestRequest::post()
            .uri("/auth/dev-login")
            .set_json(json!({ "userId": user }))
            .to_request(),
    )
    .await;
    assert!(res.status().is_success(), "dev login failed: {}", res.status());
    session_cookie(&res)
}

/// `POST /payouts` with the given key and body.
pub fn create_payout(cookie: &Cookie<'static>, key: &str, body: &Value) -> Request {
    actix_test::TestRequest::post()
        .uri("/payouts")
        .cookie(cookie.clone())
        .insert_header((IDEMPOTENCY_KEY_HEADER, key))
        .set_json(body)
        .to_request()
}

/// `GET /payouts` for the session user.
pub fn list_payouts(cookie: &Cookie<'static>) -> Request {
    actix_test::TestRequest::get()
        .uri("/payouts")
        .cookie(cookie.clone())
        .to_request()
}

/// Read a response body as JSON.
pub async fn json_body(res: ServiceResponse) -> Value {
    actix_test::read_body_json(res).await
}
