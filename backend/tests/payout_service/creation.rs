//! Idempotent payout creation under concurrency and replay.

use actix_web::http::StatusCode;
use actix_web::test as actix_test;
use futures::future::join_all;
use payouts::inbound::http::payouts::IDEMPOTENT_REPLAYED_HEADER;
use rstest::rstest;
use serde_json::{Value, json};

use super::harness::{Harness, USER_A, USER_B, create_payout, json_body, login};

fn body() -> Value {
    json!({ "amount": "10.00", "currency": "USD" })
}

#[actix_web::test]
async fn concurrent_duplicates_create_one_payout() {
    let harness = Harness::accepting();
    let app = actix_test::init_service(harness.app()).await;
    let cookie = login(&app, USER_A).await;

    let responses = join_all(
        (0..10).map(|_| actix_test::call_service(&app, create_payout(&cookie, "k-race", &body()))),
    )
    .await;

    let mut ids = Vec::new();
    for res in responses {
        assert_eq!(res.status(), StatusCode::OK);
        let payload = json_body(res).await;
        ids.push(payload["id"].as_i64().expect("numeric id"));
    }
    ids.dedup();
    assert_eq!(ids.len(), 1, "every response should carry the same id");
    assert_eq!(harness.store.payout_count().await, 1);
    assert_eq!(harness.provider.calls(), 1);
}

#[actix_web::test]
async fn replay_returns_the_original_payout() {
    let harness = Harness::accepting();
    let app = actix_test::init_service(harness.app()).await;
    let cookie = login(&app, USER_A).await;

    let first = actix_test::call_service(&app, create_payout(&cookie, "k1", &body())).await;
    assert!(first.headers().get(IDEMPOTENT_REPLAYED_HEADER).is_none());
    let first_body = json_body(first).await;

    let different = json!({ "amount": "99.99", "currency": "EUR" });
    let second = actix_test::call_service(&app, create_payout(&cookie, "k1", &different)).await;
    assert_eq!(
        second
            .headers()
            .get(IDEMPOTENT_REPLAYED_HEADER)
            .and_then(|value| value.to_str().ok()),
        Some("true")
    );
    let second_body = json_body(second).await;

    assert_eq!(first_body["id"], second_body["id"]);
    assert_eq!(second_body["amount"], "10.00");
    assert_eq!(second_body["currency"], "USD");
    assert_eq!(harness.store.payout_count().await, 1);
}

#[actix_web::test]
async fn keys_are_scoped_to_their_owner() {
    let harness = Harness::accepting();
    let app = actix_test::init_service(harness.app()).await;
    let owner = login(&app, USER_A).await;
    let other = login(&app, USER_B).await;

    let created = actix_test::call_service(&app, create_payout(&owner, "shared", &body())).await;
    assert_eq!(created.status(), StatusCode::OK);

    let res = actix_test::call_service(&app, create_payout(&other, "shared", &body())).await;

    assert_eq!(res.status(), StatusCode::CONFLICT);
    let payload = json_body(res).await;
    assert_eq!(payload["code"], "conflict");
    assert!(payload.get("id").is_none());
    assert_eq!(harness.store.payout_count().await, 1);
}

#[rstest]
#[case(json!({ "amount": "0.00", "currency": "USD" }))]
#[case(json!({ "amount": "-5", "currency": "USD" }))]
#[case(json!({ "amount": "10.00", "currency": "XYZ" }))]
#[case(json!({ "amount": "10000000000", "currency": "USD" }))]
#[actix_web::test]
async fn invalid_money_is_rejected_without_side_effects(#[case] payload: Value) {
    let harness = Harness::accepting();
    let app = actix_test::init_service(harness.app()).await;
    let cookie = login(&app, USER_A).await;

    let res = actix_test::call_service(&app, create_payout(&cookie, "k-bad", &payload)).await;

    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(harness.store.payout_count().await, 0);
    assert_eq!(harness.provider.calls(), 0);

    let retry = actix_test::call_service(&app, create_payout(&cookie, "k-bad", &body())).await;
    assert_eq!(retry.status(), StatusCode::OK, "a rejected key stays usable");
}

#[actix_web::test]
async fn amounts_are_quantized_half_up() {
    let harness = Harness::accepting();
    let app = actix_test::init_service(harness.app()).await;
    let cookie = login(&app, USER_A).await;

    let res = actix_test::call_service(
        &app,
        create_payout(&cookie, "k-round", &json!({ "amount": 10.005, "currency": "usd" })),
    )
    .await;

    assert_eq!(res.status(), StatusCode::OK);
    let payload = json_body(res).await;
    assert_eq!(payload["amount"], "10.01");
    assert_eq!(payload["currency"], "USD");
}
