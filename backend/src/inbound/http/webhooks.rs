//! Provider webhook handler.
//!
//! ```text
//! POST /webhooks/payments  x-sig: <hex>  x-sig-ts: <unix seconds>
//! {"event_id":"e1","payout_ref":"payout_42","status":"paid"}
//! ```

use actix_web::http::header::HeaderMap;
use actix_web::{HttpRequest, post, web};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::ports::WebhookDelivery;
use crate::inbound::http::ApiResult;
use crate::inbound::http::schemas::ErrorSchema;
use crate::inbound::http::state::HttpState;

/// Signature header: hex HMAC-SHA256 of `"{x-sig-ts}.{body}"`, using the
/// timestamp header text exactly as sent.
pub const SIGNATURE_HEADER: &str = "x-sig";
/// Unix timestamp (seconds) covered by the signature.
pub const SIGNATURE_TIMESTAMP_HEADER: &str = "x-sig-ts";

/// Acknowledgement body; replays are acknowledged too.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct WebhookAck {
    /// Always `true`; failures use the error body instead.
    pub ok: bool,
}

/// Documented shape of the provider callback body.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct WebhookPayloadBody {
    /// Provider event id, at most 128 bytes; replays reuse it.
    #[schema(example = "evt_01", max_length = 128)]
    pub event_id: String,
    /// Reference the payout was submitted under.
    #[schema(example = "payout_42")]
    pub payout_ref: String,
    /// New status; unknown values are recorded and ignored.
    #[schema(example = "paid")]
    pub status: Option<String>,
}

fn header_text(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
}

/// Receive a signed provider status callback.
#[utoipa::path(
    post,
    path = "/webhooks/payments",
    request_body = WebhookPayloadBody,
    params(
        ("x-sig" = String, Header, description = "Hex HMAC-SHA256 signature"),
        ("x-sig-ts" = i64, Header, description = "Signed Unix timestamp in seconds")
    ),
    responses(
        (status = 200, description = "Accepted or already processed", body = WebhookAck),
        (status = 400, description = "Stale timestamp or malformed payload", body = ErrorSchema),
        (status = 401, description = "Missing or bad signature", body = ErrorSchema),
        (status = 503, description = "Storage unavailable", body = ErrorSchema)
    ),
    tags = ["webhooks"],
    operation_id = "receivePaymentWebhook",
    security([])
)]
#[post("/webhooks/payments")]
pub async fn receive_payment_webhook(
    state: web::Data<HttpState>,
    req: HttpRequest,
    body: web::Bytes,
) -> ApiResult<web::Json<WebhookAck>> {
    let delivery = WebhookDelivery {
        body: body.to_vec(),
        signature: header_text(req.headers(), SIGNATURE_HEADER),
        timestamp: header_text(req.headers(), SIGNATURE_TIMESTAMP_HEADER),
    };
    state.webhooks.handle_webhook(delivery).await?;
    Ok(web::Json(WebhookAck { ok: true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{FixturePayoutCommand, FixturePayoutQuery, MockWebhookCommand};
    use crate::domain::{Error, WebhookApplyOutcome};
    use actix_web::http::StatusCode;
    use actix_web::{App, test as actix_test};
    use rstest::rstest;
    use std::sync::Arc;

    const BODY: &str = r#"{"event_id":"e1","payout_ref":"payout_1","status":"paid"}"#;

    fn test_app(
        webhooks: MockWebhookCommand,
    ) -> App<
        impl actix_web::dev::ServiceFactory<
            actix_web::dev::ServiceRequest,
            Config = (),
            Response = actix_web::dev::ServiceResponse,
            Error = actix_web::Error,
            InitError = (),
        >,
    > {
        let state = HttpState::new(
            Arc::new(FixturePayoutCommand),
            Arc::new(FixturePayoutQuery),
            Arc::new(webhooks),
        );
        App::new()
            .app_data(web::Data::new(state))
            .service(receive_payment_webhook)
    }

    #[actix_web::test]
    async fn passes_raw_body_and_headers_through() {
        let mut webhooks = MockWebhookCommand::new();
        webhooks
            .expect_handle_webhook()
            .withf(|delivery| {
                delivery.body == BODY.as_bytes()
                    && delivery.signature.as_deref() == Some("abc123")
                    && delivery.timestamp.as_deref() == Some("1700000000")
            })
            .times(1)
            .return_once(|_| Ok(WebhookApplyOutcome::Duplicate));
        let app = actix_test::init_service(test_app(webhooks)).await;

        let res = actix_test::call_service(
            &app,
            actix_test::TestRequest::post()
                .uri("/webhooks/payments")
                .insert_header((SIGNATURE_HEADER, "abc123"))
                .insert_header((SIGNATURE_TIMESTAMP_HEADER, "1700000000"))
                .set_payload(BODY)
                .to_request(),
        )
        .await;

        assert_eq!(res.status(), StatusCode::OK);
        let ack: WebhookAck = actix_test::read_body_json(res).await;
        assert_eq!(ack, WebhookAck { ok: true });
    }

    #[rstest]
    #[case(Error::invalid_request("stale signature"), StatusCode::BAD_REQUEST)]
    #[case(Error::unauthorized("bad signature"), StatusCode::UNAUTHORIZED)]
    #[case(Error::service_unavailable("database unavailable"), StatusCode::SERVICE_UNAVAILABLE)]
    #[actix_web::test]
    async fn maps_reconciler_errors(#[case] error: Error, #[case] expected: StatusCode) {
        let mut webhooks = MockWebhookCommand::new();
        webhooks
            .expect_handle_webhook()
            .return_once(move |_| Err(error));
        let app = actix_test::init_service(test_app(webhooks)).await;

        let res = actix_test::call_service(
            &app,
            actix_test::TestRequest::post()
                .uri("/webhooks/payments")
                .set_payload(BODY)
                .to_request(),
        )
        .await;

        assert_eq!(res.status(), expected);
    }

    #[actix_web::test]
    async fn missing_headers_are_forwarded_as_absent() {
        let mut webhooks = MockWebhookCommand::new();
        webhooks
            .expect_handle_webhook()
            .withf(|delivery| delivery.signature.is_none() && delivery.timestamp.is_none())
            .return_once(|_| Err(Error::invalid_request("missing x-sig-ts header")));
        let app = actix_test::init_service(test_app(webhooks)).await;

        let res = actix_test::call_service(
            &app,
            actix_test::TestRequest::post()
                .uri("/webhooks/payments")
                .set_payload(BODY)
                .to_request(),
        )
        .await;

        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}
