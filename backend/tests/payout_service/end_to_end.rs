//! Create, settle by webhook, and replay.

use actix_web::http::StatusCode;
use actix_web::test as actix_test;
use serde_json::json;

use super::harness::{Harness, USER_A, USER_B, create_payout, json_body, list_payouts, login};

#[actix_web::test]
async fn payout_lifecycle() {
    let harness = Harness::accepting();
    let app = actix_test::init_service(harness.app()).await;
    let cookie = login(&app, USER_A).await;
    let body = json!({ "amount": "10.00", "currency": "USD" });

    let created = json_body(actix_test::call_service(&app, create_payout(&cookie, "k1", &body)).await).await;
    assert_eq!(created["status"], "processing");
    assert_eq!(created["amount"], "10.00");
    let id = created["id"].as_i64().expect("numeric id");

    let repeated = json_body(actix_test::call_service(&app, create_payout(&cookie, "k1", &body)).await).await;
    assert_eq!(repeated["id"], id);
    assert_eq!(harness.provider.calls(), 1);

    let settle = json!({ "event_id": "e1", "payout_ref": format!("payout_{id}"), "status": "paid" });
    let ack = actix_test::call_service(&app, harness.webhook(&settle)).await;
    assert_eq!(ack.status(), StatusCode::OK);

    let listing = json_body(actix_test::call_service(&app, list_payouts(&cookie)).await).await;
    assert_eq!(listing["total"], 1);
    assert_eq!(listing["items"][0]["id"], id);
    assert_eq!(listing["items"][0]["status"], "paid");

    let replay = actix_test::call_service(&app, harness.webhook(&settle)).await;
    assert_eq!(replay.status(), StatusCode::OK);
    assert_eq!(harness.store.webhook_event_count().await, 1);

    let after_replay =
        json_body(actix_test::call_service(&app, create_payout(&cookie, "k1", &body)).await).await;
    assert_eq!(after_replay["status"], "paid");
}

#[actix_web::test]
async fn listings_are_scoped_to_the_session_user() {
    let harness = Harness::accepting();
    let app = actix_test::init_service(harness.app()).await;
    let alice = login(&app, USER_A).await;
    let bob = login(&app, USER_B).await;

    for (index, key) in ["a1", "a2", "a3"].into_iter().enumerate() {
        let amount = format!("{}.00", index + 1);
        let res = actix_test::call_service(
            &app,
            create_payout(&alice, key, &json!({ "amount": amount, "currency": "USD" })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
    }
    let res = actix_test::call_service(
        &app,
        create_payout(&bob, "b1", &json!({ "amount": "9.00", "currency": "EUR" })),
    )
    .await;
    assert_eq!(res.status(), StatusCode::OK);

    let mine = json_body(actix_test::call_service(&app, list_payouts(&alice)).await).await;
    assert_eq!(mine["total"], 3);
    assert_eq!(mine["items"][0]["amount"], "3.00", "newest first");
    assert_eq!(mine["items"][2]["amount"], "1.00");

    let theirs = json_body(actix_test::call_service(&app, list_payouts(&bob)).await).await;
    assert_eq!(theirs["total"], 1);
    assert_eq!(theirs["items"][0]["currency"], "EUR");

    let page = json_body(
        actix_test::call_service(
            &app,
            actix_test::TestRequest::get()
                .uri("/payouts?page=2&limit=2")
                .cookie(alice.clone())
                .to_request(),
        )
        .await,
    )
    .await;
    assert_eq!(page["page"], 2);
    assert_eq!(page["total"], 3);
    assert_eq!(page["items"].as_array().map(Vec::len), Some(1));
}

#[actix_web::test]
async fn payouts_require_a_session() {
    let harness = Harness::accepting();
    let app = actix_test::init_service(harness.app()).await;

    let res = actix_test::call_service(
        &app,
        actix_test::TestRequest::get().uri("/payouts").to_request(),
    )
    .await;

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(res).await;
    assert_eq!(body["code"], "unauthorized");
}
