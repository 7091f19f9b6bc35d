use std::time::Duration;

use electrum_payment_engine::{
    test_utils::{MemoryStore, ScriptedGateway},
    MerchantConfig, PaymentsApi,
};
use epg_common::Secret;

/// Base64 of 24 zero bytes; a valid 3DES key for the signer.
pub const TEST_SECRET: &str = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

pub fn merchant_config() -> MerchantConfig {
    MerchantConfig {
        secret: Secret::new(TEST_SECRET.to_string()),
        code: "999008881".to_string(),
        terminal: "001".to_string(),
        disable_payment: false,
        close_ledger_on_error: true,
        verify_notify: true,
    }
}

pub fn api(store: &MemoryStore, gateway: &ScriptedGateway) -> PaymentsApi<MemoryStore, ScriptedGateway> {
    PaymentsApi::new(merchant_config(), store.clone(), gateway.clone(), false)
}

/// Waits for dispatched background tasks to run their course.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}
