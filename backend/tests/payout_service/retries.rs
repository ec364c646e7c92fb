//! Provider submission retries as seen through `POST /payouts`.

use actix_web::http::StatusCode;
use actix_web::test as actix_test;
use payouts::domain::PayoutId;
use payouts::domain::ports::{PaymentProviderError, PayoutLedger, ProviderAcceptance};
use payouts::test_support::provider::ScriptedProvider;
use rstest::rstest;
use serde_json::json;

use super::harness::{Harness, USER_A, create_payout, json_body, list_payouts, login};

async fn submit_one(harness: &Harness) -> serde_json::Value {
    let app = actix_test::init_service(harness.app()).await;
    let cookie = login(&app, USER_A).await;
    let res = actix_test::call_service(
        &app,
        create_payout(&cookie, "k-retry", &json!({ "amount": "25.00", "currency": "EUR" })),
    )
    .await;
    assert_eq!(res.status(), StatusCode::OK, "provider failures are not client errors");
    json_body(res).await
}

async fn stored_reference(harness: &Harness, id: i64) -> Option<String> {
    harness
        .store
        .get(PayoutId::new(id))
        .await
        .expect("ledger read")
        .expect("payout exists")
        .provider_ref
}

#[rstest]
#[case(PaymentProviderError::server_error(500_u16, "boom"))]
#[case(PaymentProviderError::rate_limited("slow down"))]
#[case(PaymentProviderError::transport("connection reset"))]
#[actix_web::test]
async fn transient_failures_stop_after_the_attempt_budget(#[case] error: PaymentProviderError) {
    let harness = Harness::new(ScriptedProvider::always_failing(error));

    let body = submit_one(&harness).await;

    assert_eq!(harness.provider.calls(), 4);
    assert_eq!(body["status"], "processing");
    let id = body["id"].as_i64().expect("numeric id");
    assert_eq!(stored_reference(&harness, id).await, None);
}

#[rstest]
#[case(PaymentProviderError::rejected(400_u16, "bad account"))]
#[case(PaymentProviderError::rejected(503_u16, "maintenance"))]
#[actix_web::test]
async fn terminal_failures_are_not_retried(#[case] error: PaymentProviderError) {
    let harness = Harness::new(ScriptedProvider::always_failing(error));

    let body = submit_one(&harness).await;

    assert_eq!(harness.provider.calls(), 1);
    assert_eq!(body["status"], "processing");
}

#[actix_web::test]
async fn recovery_within_budget_records_the_reference() {
    let harness = Harness::new(ScriptedProvider::scripted(vec![
        Err(PaymentProviderError::server_error(500_u16, "boom")),
        Err(PaymentProviderError::timeout("slow")),
        Ok(ProviderAcceptance {
            reference: String::new(),
        }),
    ]));

    let body = submit_one(&harness).await;

    assert_eq!(harness.provider.calls(), 3);
    let id = body["id"].as_i64().expect("numeric id");
    assert_eq!(
        stored_reference(&harness, id).await,
        Some(format!("payout_{id}"))
    );
    let requests = harness.provider.requests();
    assert!(
        requests.iter().all(|request| request.reference == format!("payout_{id}")),
        "every attempt reuses the payout reference"
    );
}

#[actix_web::test]
async fn failed_submissions_remain_listed() {
    let harness = Harness::new(ScriptedProvider::always_failing(
        PaymentProviderError::rejected(422_u16, "invalid beneficiary"),
    ));
    let app = actix_test::init_service(harness.app()).await;
    let cookie = login(&app, USER_A).await;

    let created = actix_test::call_service(
        &app,
        create_payout(&cookie, "k-list", &json!({ "amount": "5", "currency": "GBP" })),
    )
    .await;
    assert_eq!(created.status(), StatusCode::OK);

    let listing = json_body(actix_test::call_service(&app, list_payouts(&cookie)).await).await;

    assert_eq!(listing["total"], 1);
    assert_eq!(listing["items"][0]["amount"], "5.00");
    assert_eq!(listing["items"][0]["status"], "processing");
}
