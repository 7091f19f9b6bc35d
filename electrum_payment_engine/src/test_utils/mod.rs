//! Support code for the test suites: an in-memory store, a scripted gateway and a few fixture
//! builders. Nothing here talks to a real database or to the bank.

mod gateway;
mod memory_store;

use chrono::Utc;
use epg_common::Cents;

pub use gateway::ScriptedGateway;
pub use memory_store::MemoryStore;

use crate::db_types::{PaymentMethod, PaymentOrder, PaymentParameters, Transaction, UserTag};

pub fn finished_transaction(transaction_id: i64, id_tag: &str, amount: i64) -> Transaction {
    Transaction {
        transaction_id,
        charge_point_id: "CP-01".to_string(),
        connector_id: 2,
        id_tag: id_tag.to_string(),
        meter_start: 1_000,
        meter_stop: 13_500,
        is_finished: true,
        payment_amount: Cents::from(amount),
        payment_billed: Cents::zero(),
        payment_order: 0,
        payment_error: String::new(),
        payment_orders: Vec::new(),
        user_tag: None,
        payment_method: None,
    }
}

pub fn user_tag(id_tag: &str, user_id: &str) -> UserTag {
    UserTag { id_tag: id_tag.to_string(), user_id: user_id.to_string(), username: format!("user-{user_id}") }
}

pub fn default_method(user_id: &str, identifier: &str, cof_tid: &str) -> PaymentMethod {
    PaymentMethod {
        identifier: identifier.to_string(),
        user_id: user_id.to_string(),
        user_name: format!("user-{user_id}"),
        is_default: true,
        fail_count: 0,
        cof_tid: cof_tid.to_string(),
        card_brand: "1".to_string(),
        card_country: "724".to_string(),
        expiry_date: "2812".to_string(),
        description: "**** **** **** ****".to_string(),
    }
}

pub fn open_order(order: i64, transaction_id: i64, identifier: &str, amount: i64) -> PaymentOrder {
    PaymentOrder {
        order,
        transaction_id,
        user_id: "u1".to_string(),
        user_name: "user-u1".to_string(),
        amount: Cents::from(amount),
        identifier: identifier.to_string(),
        is_completed: false,
        result: String::new(),
        time_opened: Utc::now(),
        time_closed: None,
        currency: String::new(),
        date: String::new(),
        refund_amount: Cents::zero(),
        refund_time: None,
        description: "CP-01:2 12kW".to_string(),
    }
}

pub fn charge_reply(order: i64, amount: i64, response: &str) -> PaymentParameters {
    PaymentParameters {
        response: response.to_string(),
        order: order.to_string(),
        amount: amount.to_string(),
        transaction_type: "0".to_string(),
        currency: "978".to_string(),
        date: "2025-11-04".to_string(),
        hour: "18:02".to_string(),
        ..Default::default()
    }
}

pub fn refund_reply(order: i64, amount: i64, response: &str) -> PaymentParameters {
    PaymentParameters { transaction_type: "3".to_string(), ..charge_reply(order, amount, response) }
}
