use actix_web::{http::StatusCode, test};
use electrum_payment_engine::{
    signer,
    test_utils::{
        charge_reply, default_method, finished_transaction, open_order, refund_reply, user_tag, MemoryStore,
        ScriptedGateway,
    },
};
use epg_common::Cents;

use super::{call, payments_api, TEST_SECRET};

#[actix_web::test]
async fn pay_rejects_a_non_numeric_id() {
    let api = payments_api(&MemoryStore::new(), &ScriptedGateway::new(), false);
    let status = call(api, test::TestRequest::get().uri("/pay/seven")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn pay_surfaces_engine_errors_as_500() {
    let api = payments_api(&MemoryStore::new(), &ScriptedGateway::new(), false);
    let status = call(api, test::TestRequest::get().uri("/pay/7")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[actix_web::test]
async fn pay_acknowledges_a_dispatched_payment() {
    let store = MemoryStore::new();
    store.seed_transaction(finished_transaction(7, "A1", 1000));
    store.seed_user_tag(user_tag("A1", "u1"));
    store.seed_payment_method(default_method("u1", "tok-1", "abc123"));

    let api = payments_api(&store, &ScriptedGateway::new(), true);
    let status = call(api, test::TestRequest::get().uri("/pay/7")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(store.transaction(7).unwrap().payment_billed, Cents::from(1000));
}

#[actix_web::test]
async fn return_rejects_a_non_numeric_id() {
    let api = payments_api(&MemoryStore::new(), &ScriptedGateway::new(), false);
    let status = call(api, test::TestRequest::get().uri("/return/x")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn return_order_rejects_a_malformed_body() {
    let api = payments_api(&MemoryStore::new(), &ScriptedGateway::new(), false);
    let status = call(
        api,
        test::TestRequest::post().uri("/return/order/1300").set_payload("{\"amount\": \"much\"}").insert_header((
            "Content-Type",
            "application/json",
        )),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn return_order_surfaces_a_zero_amount_as_500() {
    let store = MemoryStore::new();
    store.seed_order(open_order(1300, 7, "tok-1", 500));
    let api = payments_api(&store, &ScriptedGateway::new(), false);
    let status = call(
        api,
        test::TestRequest::post().uri("/return/order/1300").set_json(serde_json::json!({"amount": 0})),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[actix_web::test]
async fn return_order_dispatches_a_refund() {
    let store = MemoryStore::new();
    let mut order = open_order(1300, 7, "tok-1", 500);
    order.is_completed = true;
    store.seed_order(order);
    store.seed_payment_method(default_method("u1", "tok-1", "abc123"));
    let gateway = ScriptedGateway::new();
    gateway.push_reply(refund_reply(1300, 500, "0900"));

    let api = payments_api(&store, &gateway, false);
    let status = call(
        api,
        test::TestRequest::post().uri("/return/order/1300").set_json(serde_json::json!({"amount": 500})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert_eq!(store.order(1300).unwrap().refund_amount, Cents::from(500));
}

#[actix_web::test]
async fn notify_returns_200_even_for_garbage() {
    let api = payments_api(&MemoryStore::new(), &ScriptedGateway::new(), false);
    let status = call(api, test::TestRequest::post().uri("/notify").set_payload("%%%not-a-form")).await;
    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn notify_feeds_reconciliation() {
    let store = MemoryStore::new();
    store.seed_transaction(finished_transaction(7, "A1", 1000));
    store.seed_user_tag(user_tag("A1", "u1"));
    store.seed_payment_method(default_method("u1", "tok-1", "abc123"));
    store.seed_order(open_order(1200, 7, "tok-1", 1000));

    let reply = charge_reply(1200, 1000, "0000");
    let parameters = base64::encode(serde_json::to_string(&reply).unwrap());
    let signature = signer::sign(TEST_SECRET, &parameters, &reply.order).unwrap();
    let body = serde_urlencoded::to_string([
        ("Ds_SignatureVersion", "HMAC_SHA256_V1"),
        ("Ds_MerchantParameters", parameters.as_str()),
        ("Ds_Signature", signature.as_str()),
    ])
    .unwrap();

    let api = payments_api(&store, &ScriptedGateway::new(), false);
    let status = call(api, test::TestRequest::post().uri("/notify").set_payload(body)).await;
    assert_eq!(status, StatusCode::OK);

    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    let transaction = store.transaction(7).unwrap();
    assert_eq!(transaction.payment_billed, Cents::from(1000));
    assert!(store.order(1200).unwrap().is_completed);
}
