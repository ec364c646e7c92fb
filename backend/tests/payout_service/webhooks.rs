//! Signed webhook delivery through `POST /webhooks/payments`.

use actix_web::HttpMessage;
use actix_web::http::StatusCode;
use actix_web::test as actix_test;
use chrono::Utc;
use payouts::inbound::http::webhooks::{SIGNATURE_HEADER, SIGNATURE_TIMESTAMP_HEADER};
use rstest::rstest;
use serde_json::{Value, json};

use super::harness::{Harness, USER_A, create_payout, json_body, list_payouts, login};

/// Create one payout and return its id.
async fn seeded_payout(
    harness: &Harness,
    app: &impl actix_web::dev::Service<
        actix_http::Request,
        Response = actix_web::dev::ServiceResponse,
        Error = actix_web::Error,
    >,
) -> (i64, actix_web::cookie::Cookie<'static>) {
    let cookie = login(app, USER_A).await;
    let res = actix_test::call_service(
        app,
        create_payout(&cookie, "k-hook", &json!({ "amount": "12.50", "currency": "USD" })),
    )
    .await;
    assert_eq!(res.status(), StatusCode::OK);
    let id = json_body(res).await["id"].as_i64().expect("numeric id");
    assert_eq!(harness.provider.calls(), 1);
    (id, cookie)
}

fn event(event_id: &str, id: i64, status: &str) -> Value {
    json!({ "event_id": event_id, "payout_ref": format!("payout_{id}"), "status": status })
}

#[actix_web::test]
async fn duplicate_events_apply_once() {
    let harness = Harness::accepting();
    let app = actix_test::init_service(harness.app()).await;
    let (id, cookie) = seeded_payout(&harness, &app).await;
    let payload = event("e1", id, "paid");

    for _ in 0..2 {
        let res = actix_test::call_service(&app, harness.webhook(&payload)).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(json_body(res).await, json!({ "ok": true }));
    }

    assert_eq!(harness.store.webhook_event_count().await, 1);
    let listing = json_body(actix_test::call_service(&app, list_payouts(&cookie)).await).await;
    assert_eq!(listing["items"][0]["status"], "paid");
}

#[actix_web::test]
async fn terminal_status_does_not_regress() {
    let harness = Harness::accepting();
    let app = actix_test::init_service(harness.app()).await;
    let (id, cookie) = seeded_payout(&harness, &app).await;

    let paid = actix_test::call_service(&app, harness.webhook(&event("e1", id, "paid"))).await;
    assert_eq!(paid.status(), StatusCode::OK);
    let failed = actix_test::call_service(&app, harness.webhook(&event("e2", id, "failed"))).await;
    assert_eq!(failed.status(), StatusCode::OK);

    assert_eq!(harness.store.webhook_event_count().await, 2);
    let listing = json_body(actix_test::call_service(&app, list_payouts(&cookie)).await).await;
    assert_eq!(listing["items"][0]["status"], "paid");
}

#[actix_web::test]
async fn tampered_body_is_unauthorized() {
    let harness = Harness::accepting();
    let app = actix_test::init_service(harness.app()).await;
    let (id, cookie) = seeded_payout(&harness, &app).await;

    let signed = serde_json::to_vec(&event("e1", id, "paid")).expect("serialize");
    let signature = harness
        .webhook_at(&signed, Utc::now().timestamp())
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
        .expect("signature header");
    let tampered = serde_json::to_vec(&event("e1", id, "failed")).expect("serialize");

    let res = actix_test::call_service(
        &app,
        actix_test::TestRequest::post()
            .uri("/webhooks/payments")
            .insert_header((SIGNATURE_HEADER, signature))
            .insert_header((SIGNATURE_TIMESTAMP_HEADER, Utc::now().timestamp().to_string()))
            .set_payload(tampered)
            .to_request(),
    )
    .await;

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(res).await["code"], "unauthorized");
    assert_eq!(harness.store.webhook_event_count().await, 0);
    let listing = json_body(actix_test::call_service(&app, list_payouts(&cookie)).await).await;
    assert_eq!(listing["items"][0]["status"], "processing");
}

#[rstest]
#[case(None, Some("1700000000"), StatusCode::BAD_REQUEST)]
#[case(Some("00ff"), None, StatusCode::BAD_REQUEST)]
#[case(Some("00ff"), Some("yesterday"), StatusCode::BAD_REQUEST)]
#[actix_web::test]
async fn incomplete_signature_headers_are_rejected(
    #[case] signature: Option<&str>,
    #[case] timestamp: Option<&str>,
    #[case] expected: StatusCode,
) {
    let harness = Harness::accepting();
    let app = actix_test::init_service(harness.app()).await;

    let mut request = actix_test::TestRequest::post()
        .uri("/webhooks/payments")
        .set_payload(r#"{"event_id":"e1","payout_ref":"payout_1","status":"paid"}"#);
    if let Some(value) = signature {
        request = request.insert_header((SIGNATURE_HEADER, value));
    }
    if let Some(value) = timestamp {
        request = request.insert_header((SIGNATURE_TIMESTAMP_HEADER, value));
    }
    let res = actix_test::call_service(&app, request.to_request()).await;

    assert_eq!(res.status(), expected);
    assert_eq!(harness.store.webhook_event_count().await, 0);
}

#[rstest]
#[case(-600)]
#[case(600)]
#[actix_web::test]
async fn stale_signatures_are_rejected(#[case] offset: i64) {
    let harness = Harness::accepting();
    let app = actix_test::init_service(harness.app()).await;
    let body = br#"{"event_id":"e1","payout_ref":"payout_1","status":"paid"}"#;

    let res = actix_test::call_service(
        &app,
        harness.webhook_at(body, Utc::now().timestamp() + offset),
    )
    .await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(harness.store.webhook_event_count().await, 0);
}

#[rstest]
#[case(br#"{"event_id":"e1","#.as_slice())]
#[case(br#"{"payout_ref":"payout_1","status":"paid"}"#.as_slice())]
#[case(br#"{"event_id":"  ","payout_ref":"payout_1","status":"paid"}"#.as_slice())]
#[actix_web::test]
async fn signed_but_malformed_payloads_are_bad_requests(#[case] body: &[u8]) {
    let harness = Harness::accepting();
    let app = actix_test::init_service(harness.app()).await;

    let res = actix_test::call_service(
        &app,
        harness.webhook_at(body, Utc::now().timestamp()),
    )
    .await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(res).await["code"], "invalid_request");
}

#[actix_web::test]
async fn unknown_references_are_recorded_and_acknowledged() {
    let harness = Harness::accepting();
    let app = actix_test::init_service(harness.app()).await;

    let res = actix_test::call_service(
        &app,
        harness.webhook(&json!({ "event_id": "e9", "payout_ref": "payout_999", "status": "paid" })),
    )
    .await;

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(harness.store.webhook_event_count().await, 1);
    assert_eq!(harness.store.payout_count().await, 0);
}

#[actix_web::test]
async fn fresh_timestamp_without_signature_is_unauthorized() {
    let harness = Harness::accepting();
    let app = actix_test::init_service(harness.app()).await;

    let res = actix_test::call_service(
        &app,
        actix_test::TestRequest::post()
            .uri("/webhooks/payments")
            .insert_header((SIGNATURE_TIMESTAMP_HEADER, Utc::now().timestamp().to_string()))
            .set_payload(r#"{"event_id":"e1","payout_ref":"payout_1","status":"paid"}"#)
            .to_request(),
    )
    .await;

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(harness.store.webhook_event_count().await, 0);
}

#[actix_web::test]
async fn zero_padded_timestamp_header_is_verified_as_sent() {
    let harness = Harness::accepting();
    let app = actix_test::init_service(harness.app()).await;
    let (id, cookie) = seeded_payout(&harness, &app).await;
    let body = serde_json::to_vec(&event("e1", id, "paid")).expect("serialize");
    let header = format!("0{}", Utc::now().timestamp());

    let res = actix_test::call_service(&app, harness.webhook_with_header(&body, &header)).await;

    assert_eq!(res.status(), StatusCode::OK);
    let listing = json_body(actix_test::call_service(&app, list_payouts(&cookie)).await).await;
    assert_eq!(listing["items"][0]["status"], "paid");
}

#[actix_web::test]
async fn event_ids_longer_than_the_column_are_bad_requests() {
    let harness = Harness::accepting();
    let app = actix_test::init_service(harness.app()).await;
    let (id, cookie) = seeded_payout(&harness, &app).await;
    let body = serde_json::to_vec(&event(&"e".repeat(129), id, "paid")).expect("serialize");

    let res = actix_test::call_service(
        &app,
        harness.webhook_at(&body, Utc::now().timestamp()),
    )
    .await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(res).await["code"], "invalid_request");
    assert_eq!(harness.store.webhook_event_count().await, 0);
    let listing = json_body(actix_test::call_service(&app, list_payouts(&cookie)).await).await;
    assert_eq!(listing["items"][0]["status"], "processing");
}
