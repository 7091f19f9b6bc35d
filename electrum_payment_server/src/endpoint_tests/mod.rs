//! Endpoint tests: each route is exercised against the in-memory store and a scripted gateway,
//! asserting the status-code contract of the HTTP surface.

mod routes;

use actix_web::{http::StatusCode, test, web, App};
use electrum_payment_engine::{
    test_utils::{MemoryStore, ScriptedGateway},
    MerchantConfig, PaymentsApi,
};
use epg_common::Secret;

use crate::routes::{notify, pay_transaction, return_order, return_transaction};

/// Base64 of 24 zero bytes; a valid signing key.
const TEST_SECRET: &str = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

fn merchant_config(disable_payment: bool) -> MerchantConfig {
    MerchantConfig {
        secret: Secret::new(TEST_SECRET.to_string()),
        code: "999008881".to_string(),
        terminal: "001".to_string(),
        disable_payment,
        close_ledger_on_error: true,
        verify_notify: true,
    }
}

fn payments_api(
    store: &MemoryStore,
    gateway: &ScriptedGateway,
    disable_payment: bool,
) -> PaymentsApi<MemoryStore, ScriptedGateway> {
    PaymentsApi::new(merchant_config(disable_payment), store.clone(), gateway.clone(), false)
}

async fn call(api: PaymentsApi<MemoryStore, ScriptedGateway>, req: test::TestRequest) -> StatusCode {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(api))
            .service(
                web::resource("/pay/{transaction_id}")
                    .route(web::get().to(pay_transaction::<MemoryStore, ScriptedGateway>)),
            )
            .service(
                web::resource("/return/order/{order_id}")
                    .route(web::post().to(return_order::<MemoryStore, ScriptedGateway>)),
            )
            .service(
                web::resource("/return/{transaction_id}")
                    .route(web::get().to(return_transaction::<MemoryStore, ScriptedGateway>)),
            )
            .service(web::resource("/notify").route(web::post().to(notify::<MemoryStore, ScriptedGateway>))),
    )
    .await;
    test::call_service(&app, req.to_request()).await.status()
}
