use async_trait::async_trait;
use thiserror::Error;

use crate::db_types::{LogRecord, PaymentMethod, PaymentOrder, PaymentParameters, Transaction, UserTag};

#[derive(Debug, Clone, Error)]
pub enum PaymentStoreError {
    #[error("store query failed: {0}")]
    Database(String),
    #[error("payment method {0} already exists for this user")]
    DuplicatePaymentMethod(String),
}

impl From<sqlx::Error> for PaymentStoreError {
    fn from(e: sqlx::Error) -> Self {
        PaymentStoreError::Database(e.to_string())
    }
}

/// The document-store contract the payment engine runs against.
///
/// One natural key per entity: transactions by `transaction_id`, user tags by `id_tag`, payment
/// methods by `identifier`, orders by `order` number. Lookups return `Ok(None)` for a missing
/// document; errors are reserved for the store itself misbehaving. Writes must be
/// read-your-writes consistent within one engine operation: order allocation reads
/// `get_last_order` right after persisting the previous order.
#[async_trait]
pub trait PaymentStore: Clone + Send + Sync + 'static {
    async fn get_transaction(&self, id: i64) -> Result<Option<Transaction>, PaymentStoreError>;

    /// Persists the billing view of a transaction: `payment_order`, `payment_error`,
    /// `payment_billed` and the order snapshots. All other fields belong to the charging service
    /// and are left untouched.
    async fn update_transaction(&self, transaction: &Transaction) -> Result<(), PaymentStoreError>;

    async fn get_user_tag(&self, id_tag: &str) -> Result<Option<UserTag>, PaymentStoreError>;

    /// Returns the best available method for a user: the default method when it is healthy,
    /// otherwise the method with the lowest fail count (stable by insertion on ties).
    async fn get_payment_method(&self, user_id: &str) -> Result<Option<PaymentMethod>, PaymentStoreError>;

    async fn get_payment_method_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<PaymentMethod>, PaymentStoreError>;

    async fn update_payment_method_fail_count(
        &self,
        identifier: &str,
        count: i64,
    ) -> Result<(), PaymentStoreError>;

    /// Inserts a new payment method. Rejects a duplicate (identifier, user) pair with
    /// [`PaymentStoreError::DuplicatePaymentMethod`].
    async fn save_payment_method(&self, method: &PaymentMethod) -> Result<(), PaymentStoreError>;

    async fn get_payment_order(&self, order: i64) -> Result<Option<PaymentOrder>, PaymentStoreError>;

    /// Returns the incomplete order for a transaction, if one is still open.
    async fn get_payment_order_by_transaction(
        &self,
        transaction_id: i64,
    ) -> Result<Option<PaymentOrder>, PaymentStoreError>;

    /// Upserts by order number.
    async fn save_payment_order(&self, order: &PaymentOrder) -> Result<(), PaymentStoreError>;

    /// Returns the most recently opened order (ties broken by the higher order number).
    async fn get_last_order(&self) -> Result<Option<PaymentOrder>, PaymentStoreError>;

    /// Appends a raw gateway reply to the audit collection.
    async fn save_payment_result(&self, reply: &PaymentParameters) -> Result<(), PaymentStoreError>;

    /// Appends a record to the payment log, trimming to the configured cap when one is set.
    async fn write_log_message(&self, record: &LogRecord) -> Result<(), PaymentStoreError>;
}
