//! `PgStore` is the concrete Postgres backend of the payment store.

use std::fmt::Debug;

use async_trait::async_trait;
use sqlx::PgPool;

use super::db::{self, audit, methods, orders, tags, transactions};
use crate::{
    db_types::{LogRecord, PaymentMethod, PaymentOrder, PaymentParameters, Transaction, UserTag},
    traits::{PaymentStore, PaymentStoreError},
};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    log_records: i64,
}

impl Debug for PgStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "PgStore ({:?})", self.pool)
    }
}

impl PgStore {
    /// Connects once at startup and creates the schema idempotently. The pool is process-wide and
    /// lives until shutdown.
    pub async fn new_with_url(url: &str, max_connections: u32, log_records: i64) -> Result<Self, sqlx::Error> {
        let pool = db::new_pool(url, max_connections).await?;
        db::create_schema(&pool).await?;
        Ok(Self { pool, log_records })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl PaymentStore for PgStore {
    async fn get_transaction(&self, id: i64) -> Result<Option<Transaction>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(transactions::fetch_transaction(id, &mut conn).await?)
    }

    async fn update_transaction(&self, transaction: &Transaction) -> Result<(), PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(transactions::update_billing(transaction, &mut conn).await?)
    }

    async fn get_user_tag(&self, id_tag: &str) -> Result<Option<UserTag>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(tags::fetch_user_tag(id_tag, &mut conn).await?)
    }

    async fn get_payment_method(&self, user_id: &str) -> Result<Option<PaymentMethod>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(methods::fetch_best_method(user_id, &mut conn).await?)
    }

    async fn get_payment_method_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<PaymentMethod>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(methods::fetch_method_by_identifier(identifier, &mut conn).await?)
    }

    async fn update_payment_method_fail_count(
        &self,
        identifier: &str,
        count: i64,
    ) -> Result<(), PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(methods::update_fail_count(identifier, count, &mut conn).await?)
    }

    async fn save_payment_method(&self, method: &PaymentMethod) -> Result<(), PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        methods::insert_method(method, &mut conn).await
    }

    async fn get_payment_order(&self, order: i64) -> Result<Option<PaymentOrder>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_order(order, &mut conn).await?)
    }

    async fn get_payment_order_by_transaction(
        &self,
        transaction_id: i64,
    ) -> Result<Option<PaymentOrder>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_incomplete_by_transaction(transaction_id, &mut conn).await?)
    }

    async fn save_payment_order(&self, order: &PaymentOrder) -> Result<(), PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::upsert_order(order, &mut conn).await?)
    }

    async fn get_last_order(&self) -> Result<Option<PaymentOrder>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_last_order(&mut conn).await?)
    }

    async fn save_payment_result(&self, reply: &PaymentParameters) -> Result<(), PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(audit::insert_payment_result(reply, &mut conn).await?)
    }

    async fn write_log_message(&self, record: &LogRecord) -> Result<(), PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(audit::insert_log_message(record, self.log_records, &mut conn).await?)
    }
}
