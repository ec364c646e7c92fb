//! OpenAPI documentation configuration.
//!
//! [`ApiDoc`] registers every HTTP endpoint, the error schema wrappers from
//! [`crate::inbound::http::schemas`], and the session cookie security scheme.
//! Swagger UI serves it in debug builds; `openapi-dump` prints it.

use crate::inbound::http::auth::{DevLoginBody, SessionUserBody};
use crate::inbound::http::health::HealthBody;
use crate::inbound::http::payouts::{CreatePayoutBody, PayoutBody, PayoutListBody};
use crate::inbound::http::schemas::{ErrorCodeSchema, ErrorSchema};
use crate::inbound::http::webhooks::{WebhookAck, WebhookPayloadBody};
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

/// Enrich the generated document with the session cookie security scheme.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi
            .components
            .get_or_insert_with(utoipa::openapi::Components::default);

        components.add_security_scheme(
            "SessionCookie",
            SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                "session",
                "Session cookie issued by the identity provider or POST /auth/dev-login.",
            ))),
        );
    }
}

/// OpenAPI document for the REST API.
#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "Payouts API",
        description = "Idempotent payout creation and signed provider webhooks."
    ),
    servers(
        (url = "/", description = "Relative to the deployment base URL")
    ),
    paths(
        crate::inbound::http::payouts::create_payout,
        crate::inbound::http::payouts::list_payouts,
        crate::inbound::http::webhooks::receive_payment_webhook,
        crate::inbound::http::auth::dev_login,
        crate::inbound::http::auth::me,
        crate::inbound::http::auth::logout,
        crate::inbound::http::health::health,
        crate::inbound::http::health::ready,
    ),
    components(schemas(
        ErrorSchema,
        ErrorCodeSchema,
        CreatePayoutBody,
        PayoutBody,
        PayoutListBody,
        WebhookPayloadBody,
        WebhookAck,
        DevLoginBody,
        SessionUserBody,
        HealthBody,
    )),
    tags(
        (name = "payouts", description = "Payout creation and listing"),
        (name = "webhooks", description = "Provider callbacks"),
        (name = "auth", description = "Development sessions"),
        (name = "health", description = "Liveness and readiness")
    )
)]
pub struct ApiDoc;
