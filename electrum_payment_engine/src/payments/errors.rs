use epg_common::Cents;
use thiserror::Error;

use crate::{gateway::GatewayError, signer::SignerError, traits::PaymentStoreError};

#[derive(Debug, Clone, Error)]
pub enum PaymentsError {
    #[error("merchant is not configured")]
    MerchantNotConfigured,
    #[error("failed to get transaction {0}")]
    TransactionNotFound(i64),
    #[error("transaction {0} is not finished")]
    TransactionNotFinished(i64),
    #[error("no user tag {0}")]
    UserTagNotFound(String),
    #[error("empty user id for tag {0}")]
    EmptyUserId(String),
    #[error("id {0} has no payment method")]
    NoPaymentMethod(String),
    #[error("invalid payment method: {0}")]
    InvalidPaymentMethod(&'static str),
    #[error("amount to return is zero")]
    ZeroReturnAmount,
    #[error("invalid order id: {0}")]
    InvalidOrderId(String),
    #[error("order {0} not found")]
    OrderNotFound(i64),
    #[error("order amount {available} is less than return amount {requested}")]
    ReturnExceedsOrder { available: Cents, requested: Cents },
    #[error("could not encode merchant parameters: {0}")]
    Encode(String),
    #[error("invalid notification: {0}")]
    InvalidNotification(String),
    #[error("notification signature mismatch for order {0}")]
    NotifySignatureMismatch(String),
    #[error("{0}")]
    Store(#[from] PaymentStoreError),
    #[error("{0}")]
    Signer(#[from] SignerError),
    #[error("{0}")]
    Gateway(#[from] GatewayError),
}
