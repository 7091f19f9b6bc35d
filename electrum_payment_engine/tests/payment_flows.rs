//! End-to-end flows through the engine against the in-memory store and a scripted gateway.

mod support;

use electrum_payment_engine::{
    gateway::GatewayError,
    test_utils::{charge_reply, default_method, finished_transaction, open_order, refund_reply, user_tag, MemoryStore, ScriptedGateway},
    MerchantConfig, PaymentsApi, PaymentsError,
};
use epg_common::{Cents, Secret};
use serde_json::Value;
use support::{api, merchant_config, settle};

#[tokio::test]
async fn happy_path_charges_the_unbilled_remainder() {
    let _ = env_logger::try_init();
    let store = MemoryStore::new();
    store.seed_transaction(finished_transaction(7, "A1", 1000));
    store.seed_user_tag(user_tag("A1", "u1"));
    store.seed_payment_method(default_method("u1", "tok-1", "abc123"));

    let gateway = ScriptedGateway::new();
    gateway.push_reply(charge_reply(1200, 1000, "0000"));

    api(&store, &gateway).pay_transaction(7).await.unwrap();
    settle().await;

    let transaction = store.transaction(7).unwrap();
    assert_eq!(transaction.payment_billed, Cents::from(1000));
    assert_eq!(transaction.payment_order, 1200);
    assert_eq!(transaction.payment_error, "");
    assert_eq!(transaction.payment_orders.len(), 1);

    let order = store.order(1200).unwrap();
    assert!(order.is_completed);
    assert_eq!(order.result, "0000 by electrum");
    assert_eq!(order.amount, Cents::from(1000));
    assert_eq!(order.date, "2025-11-04 18:02");
    assert!(order.time_closed.is_some());

    assert_eq!(store.method("tok-1").unwrap().fail_count, 0);
}

#[tokio::test]
async fn the_dispatched_envelope_is_a_signed_mit_request() {
    let store = MemoryStore::new();
    store.seed_transaction(finished_transaction(7, "A1", 1000));
    store.seed_user_tag(user_tag("A1", "u1"));
    store.seed_payment_method(default_method("u1", "tok-1", "abc123"));

    let gateway = ScriptedGateway::new();
    gateway.push_reply(charge_reply(1200, 1000, "0000"));

    api(&store, &gateway).pay_transaction(7).await.unwrap();
    settle().await;

    let sent = gateway.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].signature_version, "HMAC_SHA256_V1");
    assert!(!sent[0].signature.is_empty());

    let decoded = base64::decode(&sent[0].parameters).unwrap();
    let parameters: Value = serde_json::from_slice(&decoded).unwrap();
    assert_eq!(parameters["DS_MERCHANT_ORDER"], "1200");
    assert_eq!(parameters["DS_MERCHANT_AMOUNT"], "1000");
    assert_eq!(parameters["DS_MERCHANT_CURRENCY"], "978");
    assert_eq!(parameters["DS_MERCHANT_TRANSACTIONTYPE"], "0");
    assert_eq!(parameters["DS_MERCHANT_IDENTIFIER"], "tok-1");
    assert_eq!(parameters["DS_MERCHANT_DIRECTPAYMENT"], "true");
    assert_eq!(parameters["DS_MERCHANT_EXCEP_SCA"], "MIT");
    assert_eq!(parameters["DS_MERCHANT_COF_INI"], "N");
    assert_eq!(parameters["DS_MERCHANT_COF_TYPE"], "R");
    assert_eq!(parameters["DS_MERCHANT_COF_TXNID"], "abc123");
    // The session description rides on the order, not the wire.
    assert_eq!(store.order(1200).unwrap().description, "CP-01:2 12kW");
}

#[tokio::test]
async fn a_gateway_rejection_closes_the_ledger_with_the_code() {
    let store = MemoryStore::new();
    store.seed_transaction(finished_transaction(7, "A1", 1000));
    store.seed_user_tag(user_tag("A1", "u1"));
    store.seed_payment_method(default_method("u1", "tok-1", "abc123"));

    let gateway = ScriptedGateway::new();
    gateway.push_reply(charge_reply(1200, 1000, "0190"));

    api(&store, &gateway).pay_transaction(7).await.unwrap();
    settle().await;

    let transaction = store.transaction(7).unwrap();
    assert_eq!(transaction.payment_billed, Cents::from(1000));
    assert_eq!(transaction.payment_error, "0190");
    assert_eq!(transaction.payment_order, 1200);

    let order = store.order(1200).unwrap();
    assert!(order.is_completed);
    assert_eq!(order.result, "0190 by electrum");

    assert_eq!(store.method("tok-1").unwrap().fail_count, 1);
}

#[tokio::test]
async fn a_sis_error_envelope_closes_the_order_with_the_code() {
    let store = MemoryStore::new();
    store.seed_transaction(finished_transaction(7, "A1", 1000));
    store.seed_user_tag(user_tag("A1", "u1"));
    store.seed_payment_method(default_method("u1", "tok-1", "abc123"));

    let gateway = ScriptedGateway::new();
    gateway.push_error(GatewayError::ErrorCode("SIS0051".to_string()));

    api(&store, &gateway).pay_transaction(7).await.unwrap();
    settle().await;

    let order = store.order(1200).unwrap();
    assert!(order.is_completed);
    assert_eq!(order.result, "SIS0051");
    assert_eq!(store.transaction(7).unwrap().payment_error, "SIS0051");
    assert_eq!(store.method("tok-1").unwrap().fail_count, 1);
}

#[tokio::test]
async fn an_unreachable_gateway_leaves_the_order_open() {
    let store = MemoryStore::new();
    store.seed_transaction(finished_transaction(7, "A1", 1000));
    store.seed_user_tag(user_tag("A1", "u1"));
    store.seed_payment_method(default_method("u1", "tok-1", "abc123"));

    let gateway = ScriptedGateway::new();
    gateway.push_error(GatewayError::Transport("connection refused".to_string()));

    api(&store, &gateway).pay_transaction(7).await.unwrap();
    settle().await;

    let order = store.order(1200).unwrap();
    assert!(!order.is_completed);
    let transaction = store.transaction(7).unwrap();
    assert_eq!(transaction.payment_billed, Cents::zero());
    assert_eq!(transaction.payment_error, "");
}

#[tokio::test]
async fn a_stale_order_is_closed_before_the_next_attempt() {
    let store = MemoryStore::new();
    store.seed_transaction(finished_transaction(9, "A1", 800));
    store.seed_user_tag(user_tag("A1", "u1"));
    store.seed_payment_method(default_method("u1", "tok-1", "abc123"));
    store.seed_order(open_order(1250, 9, "tok-1", 800));

    let gateway = ScriptedGateway::new();
    gateway.push_error(GatewayError::Transport("still unreachable".to_string()));

    api(&store, &gateway).pay_transaction(9).await.unwrap();
    settle().await;

    let stale = store.order(1250).unwrap();
    assert!(stale.is_completed);
    assert_eq!(stale.result, "closed without response");
    assert!(stale.time_closed.is_some());

    // The next attempt got the next number and is still awaiting a response.
    let fresh = store.order(1251).unwrap();
    assert!(!fresh.is_completed);
    assert_eq!(store.method("tok-1").unwrap().fail_count, 1);
}

#[tokio::test]
async fn an_untagged_session_closes_the_ledger_without_a_gateway_call() {
    let store = MemoryStore::new();
    store.seed_transaction(finished_transaction(7, "A1", 1000));
    store.seed_user_tag(user_tag("A1", ""));

    let gateway = ScriptedGateway::new();
    let err = api(&store, &gateway).pay_transaction(7).await.unwrap_err();
    assert!(matches!(err, PaymentsError::EmptyUserId(_)));

    let transaction = store.transaction(7).unwrap();
    assert_eq!(transaction.payment_billed, Cents::from(1000));
    assert!(gateway.sent().is_empty());
    assert_eq!(store.order_count(), 0);
}

#[tokio::test]
async fn a_user_without_methods_closes_the_ledger() {
    let store = MemoryStore::new();
    store.seed_transaction(finished_transaction(7, "A1", 1000));
    store.seed_user_tag(user_tag("A1", "u1"));

    let gateway = ScriptedGateway::new();
    let err = api(&store, &gateway).pay_transaction(7).await.unwrap_err();
    assert!(matches!(err, PaymentsError::NoPaymentMethod(_)));
    assert_eq!(store.transaction(7).unwrap().payment_billed, Cents::from(1000));
    assert!(gateway.sent().is_empty());
}

#[tokio::test]
async fn a_failing_method_is_swapped_for_a_healthier_one() {
    let store = MemoryStore::new();
    let mut transaction = finished_transaction(7, "A1", 1000);
    let mut cached = default_method("u1", "tok-bad", "old");
    cached.fail_count = 3;
    transaction.payment_method = Some(cached.clone());
    transaction.user_tag = Some(user_tag("A1", "u1"));
    store.seed_transaction(transaction);
    store.seed_payment_method(cached);
    let mut healthy = default_method("u1", "tok-good", "new");
    healthy.is_default = false;
    store.seed_payment_method(healthy);

    let gateway = ScriptedGateway::new();
    gateway.push_reply(charge_reply(1200, 1000, "0000"));

    api(&store, &gateway).pay_transaction(7).await.unwrap();
    settle().await;

    assert_eq!(store.order(1200).unwrap().identifier, "tok-good");
}

#[tokio::test]
async fn disable_payment_bills_without_contacting_the_gateway() {
    let store = MemoryStore::new();
    store.seed_transaction(finished_transaction(7, "A1", 1000));
    store.seed_user_tag(user_tag("A1", "u1"));
    store.seed_payment_method(default_method("u1", "tok-1", "abc123"));

    let gateway = ScriptedGateway::new();
    let mut conf = merchant_config();
    conf.disable_payment = true;
    let api = PaymentsApi::new(conf, store.clone(), gateway.clone(), false);

    api.pay_transaction(7).await.unwrap();
    settle().await;

    assert_eq!(store.transaction(7).unwrap().payment_billed, Cents::from(1000));
    assert!(gateway.sent().is_empty());
    assert_eq!(store.order_count(), 0);
}

#[tokio::test]
async fn an_unconfigured_merchant_is_rejected_up_front() {
    let store = MemoryStore::new();
    store.seed_transaction(finished_transaction(7, "A1", 1000));
    let gateway = ScriptedGateway::new();
    let conf = MerchantConfig {
        secret: Secret::new(String::new()),
        code: String::new(),
        terminal: String::new(),
        disable_payment: false,
        close_ledger_on_error: true,
        verify_notify: true,
    };
    let api = PaymentsApi::new(conf, store.clone(), gateway.clone(), false);
    let err = api.pay_transaction(7).await.unwrap_err();
    assert!(matches!(err, PaymentsError::MerchantNotConfigured));
}

#[tokio::test]
async fn a_fully_billed_transaction_is_a_no_op() {
    let store = MemoryStore::new();
    let mut transaction = finished_transaction(7, "A1", 1000);
    transaction.payment_billed = Cents::from(1000);
    store.seed_transaction(transaction);

    let gateway = ScriptedGateway::new();
    api(&store, &gateway).pay_transaction(7).await.unwrap();
    assert!(gateway.sent().is_empty());
}

#[tokio::test]
async fn an_unfinished_transaction_is_rejected() {
    let store = MemoryStore::new();
    let mut transaction = finished_transaction(7, "A1", 1000);
    transaction.is_finished = false;
    store.seed_transaction(transaction);

    let gateway = ScriptedGateway::new();
    let err = api(&store, &gateway).pay_transaction(7).await.unwrap_err();
    assert!(matches!(err, PaymentsError::TransactionNotFinished(7)));
}

#[tokio::test]
async fn refund_by_order_records_the_refund() {
    let store = MemoryStore::new();
    store.seed_payment_method(default_method("u1", "tok-1", "abc123"));
    let mut order = open_order(1300, 7, "tok-1", 500);
    order.is_completed = true;
    order.result = "0000 by electrum".to_string();
    store.seed_order(order);

    let gateway = ScriptedGateway::new();
    gateway.push_reply(refund_reply(1300, 500, "0900"));

    api(&store, &gateway).return_by_order("1300", Cents::from(500)).await.unwrap();
    settle().await;

    let order = store.order(1300).unwrap();
    assert_eq!(order.refund_amount, Cents::from(500));
    assert!(order.refund_time.is_some());
    assert_eq!(store.method("tok-1").unwrap().fail_count, 0);
}

#[tokio::test]
async fn refund_validation_rejects_bad_requests() {
    let store = MemoryStore::new();
    store.seed_order(open_order(1300, 7, "tok-1", 500));
    let gateway = ScriptedGateway::new();
    let api = api(&store, &gateway);

    assert!(matches!(api.return_by_order("1300", Cents::zero()).await, Err(PaymentsError::ZeroReturnAmount)));
    assert!(matches!(api.return_by_order("13x0", Cents::from(10)).await, Err(PaymentsError::InvalidOrderId(_))));
    assert!(matches!(api.return_by_order("9999", Cents::from(10)).await, Err(PaymentsError::OrderNotFound(9999))));
    assert!(matches!(
        api.return_by_order("1300", Cents::from(501)).await,
        Err(PaymentsError::ReturnExceedsOrder { .. })
    ));
    assert!(gateway.sent().is_empty());
}

#[tokio::test]
async fn return_payment_dispatches_a_refund_for_the_whole_amount() {
    let store = MemoryStore::new();
    let mut transaction = finished_transaction(7, "A1", 1000);
    transaction.payment_billed = Cents::from(1000);
    transaction.payment_order = 1200;
    store.seed_transaction(transaction);
    let mut order = open_order(1200, 7, "tok-1", 1000);
    order.is_completed = true;
    store.seed_order(order);
    store.seed_payment_method(default_method("u1", "tok-1", "abc123"));

    let gateway = ScriptedGateway::new();
    gateway.push_reply(refund_reply(1200, 1000, "0900"));

    api(&store, &gateway).return_payment(7).await.unwrap();
    settle().await;

    let sent = gateway.sent();
    assert_eq!(sent.len(), 1);
    let parameters: Value = serde_json::from_slice(&base64::decode(&sent[0].parameters).unwrap()).unwrap();
    assert_eq!(parameters["DS_MERCHANT_TRANSACTIONTYPE"], "3");
    assert_eq!(parameters["DS_MERCHANT_ORDER"], "1200");
    // Refunds carry no credential-on-file fields.
    assert_eq!(parameters["DS_MERCHANT_COF_TXNID"], "");
    assert_eq!(store.order(1200).unwrap().refund_amount, Cents::from(1000));
}

#[tokio::test]
async fn a_tokenization_reply_saves_the_method_and_refunds_the_amount() {
    let store = MemoryStore::new();
    let mut order = open_order(1400, 0, "", 150);
    order.user_id = "u1".to_string();
    store.seed_order(order);

    let gateway = ScriptedGateway::new();
    gateway.push_reply(refund_reply(1400, 150, "0900"));

    let api = api(&store, &gateway);
    let mut reply = charge_reply(1400, 150, "0000");
    reply.merchant_identifier = "tok-new".to_string();
    reply.merchant_cof_txnid = "txn-new".to_string();
    reply.card_brand = "1".to_string();
    reply.card_country = "724".to_string();
    reply.expiry_date = "2812".to_string();
    api.process_response(reply).await;
    settle().await;

    let method = store.method("tok-new").unwrap();
    assert_eq!(method.user_id, "u1");
    assert_eq!(method.cof_tid, "txn-new");

    // The tokenization amount came back automatically.
    let order = store.order(1400).unwrap();
    assert!(order.is_completed);
    assert_eq!(order.refund_amount, Cents::from(150));
    let refund_request = gateway.sent();
    assert_eq!(refund_request.len(), 1);
    let parameters: Value =
        serde_json::from_slice(&base64::decode(&refund_request[0].parameters).unwrap()).unwrap();
    assert_eq!(parameters["DS_MERCHANT_TRANSACTIONTYPE"], "3");
    assert_eq!(parameters["DS_MERCHANT_AMOUNT"], "150");
}

#[tokio::test]
async fn sequential_payments_allocate_increasing_orders_from_the_seed() {
    let store = MemoryStore::new();
    store.seed_user_tag(user_tag("A1", "u1"));
    store.seed_payment_method(default_method("u1", "tok-1", "abc123"));
    let gateway = ScriptedGateway::new();
    let api = api(&store, &gateway);

    let mut allocated = Vec::new();
    for id in 1..=3 {
        store.seed_transaction(finished_transaction(id, "A1", 100 * id));
        gateway.push_reply(charge_reply(1200 + id - 1, 100 * id, "0000"));
        api.pay_transaction(id).await.unwrap();
        settle().await;
        allocated.push(store.transaction(id).unwrap().payment_order);
    }
    assert_eq!(allocated, vec![1200, 1201, 1202]);
}
