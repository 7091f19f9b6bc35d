use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;

use crate::{
    db_types::{LogRecord, PaymentMethod, PaymentOrder, PaymentParameters, Transaction, UserTag},
    traits::{PaymentStore, PaymentStoreError},
};

/// A complete in-memory rendition of the store contract. Methods keep their insertion order so
/// fallback selection tie-breaks behave like the real backend.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    transactions: HashMap<i64, Transaction>,
    user_tags: HashMap<String, UserTag>,
    payment_methods: Vec<PaymentMethod>,
    payment_orders: BTreeMap<i64, PaymentOrder>,
    payment_results: Vec<PaymentParameters>,
    log_records: Vec<LogRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_transaction(&self, transaction: Transaction) {
        self.inner.lock().unwrap().transactions.insert(transaction.transaction_id, transaction);
    }

    pub fn seed_user_tag(&self, tag: UserTag) {
        self.inner.lock().unwrap().user_tags.insert(tag.id_tag.clone(), tag);
    }

    pub fn seed_payment_method(&self, method: PaymentMethod) {
        self.inner.lock().unwrap().payment_methods.push(method);
    }

    pub fn seed_order(&self, order: PaymentOrder) {
        self.inner.lock().unwrap().payment_orders.insert(order.order, order);
    }

    // ------------------------------- snapshots for assertions -------------------------------

    pub fn transaction(&self, id: i64) -> Option<Transaction> {
        self.inner.lock().unwrap().transactions.get(&id).cloned()
    }

    pub fn order(&self, number: i64) -> Option<PaymentOrder> {
        self.inner.lock().unwrap().payment_orders.get(&number).cloned()
    }

    pub fn method(&self, identifier: &str) -> Option<PaymentMethod> {
        self.inner.lock().unwrap().payment_methods.iter().find(|m| m.identifier == identifier).cloned()
    }

    pub fn order_count(&self) -> usize {
        self.inner.lock().unwrap().payment_orders.len()
    }

    pub fn result_count(&self) -> usize {
        self.inner.lock().unwrap().payment_results.len()
    }
}

#[async_trait]
impl PaymentStore for MemoryStore {
    async fn get_transaction(&self, id: i64) -> Result<Option<Transaction>, PaymentStoreError> {
        Ok(self.inner.lock().unwrap().transactions.get(&id).cloned())
    }

    async fn update_transaction(&self, transaction: &Transaction) -> Result<(), PaymentStoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(stored) = inner.transactions.get_mut(&transaction.transaction_id) {
            stored.payment_order = transaction.payment_order;
            stored.payment_error = transaction.payment_error.clone();
            stored.payment_billed = transaction.payment_billed;
            stored.payment_orders = transaction.payment_orders.clone();
        }
        Ok(())
    }

    async fn get_user_tag(&self, id_tag: &str) -> Result<Option<UserTag>, PaymentStoreError> {
        Ok(self.inner.lock().unwrap().user_tags.get(id_tag).cloned())
    }

    async fn get_payment_method(&self, user_id: &str) -> Result<Option<PaymentMethod>, PaymentStoreError> {
        let inner = self.inner.lock().unwrap();
        let for_user: Vec<&PaymentMethod> =
            inner.payment_methods.iter().filter(|m| m.user_id == user_id).collect();
        let default = for_user.iter().find(|m| m.is_default);
        let best = match default {
            Some(method) if method.fail_count == 0 => Some((*method).clone()),
            _ => for_user
                .iter()
                .enumerate()
                .min_by_key(|(position, method)| (method.fail_count, *position))
                .map(|(_, method)| (*method).clone()),
        };
        Ok(best)
    }

    async fn get_payment_method_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<PaymentMethod>, PaymentStoreError> {
        Ok(self.inner.lock().unwrap().payment_methods.iter().find(|m| m.identifier == identifier).cloned())
    }

    async fn update_payment_method_fail_count(
        &self,
        identifier: &str,
        count: i64,
    ) -> Result<(), PaymentStoreError> {
        let mut inner = self.inner.lock().unwrap();
        for method in inner.payment_methods.iter_mut().filter(|m| m.identifier == identifier) {
            method.fail_count = count;
        }
        Ok(())
    }

    async fn save_payment_method(&self, method: &PaymentMethod) -> Result<(), PaymentStoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner
            .payment_methods
            .iter()
            .any(|m| m.identifier == method.identifier && m.user_id == method.user_id)
        {
            return Err(PaymentStoreError::DuplicatePaymentMethod(method.identifier.clone()));
        }
        inner.payment_methods.push(method.clone());
        Ok(())
    }

    async fn get_payment_order(&self, order: i64) -> Result<Option<PaymentOrder>, PaymentStoreError> {
        Ok(self.inner.lock().unwrap().payment_orders.get(&order).cloned())
    }

    async fn get_payment_order_by_transaction(
        &self,
        transaction_id: i64,
    ) -> Result<Option<PaymentOrder>, PaymentStoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .payment_orders
            .values()
            .find(|o| o.transaction_id == transaction_id && !o.is_completed)
            .cloned())
    }

    async fn save_payment_order(&self, order: &PaymentOrder) -> Result<(), PaymentStoreError> {
        self.inner.lock().unwrap().payment_orders.insert(order.order, order.clone());
        Ok(())
    }

    async fn get_last_order(&self) -> Result<Option<PaymentOrder>, PaymentStoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .payment_orders
            .values()
            .max_by_key(|o| (o.time_opened, o.order))
            .cloned())
    }

    async fn save_payment_result(&self, reply: &PaymentParameters) -> Result<(), PaymentStoreError> {
        self.inner.lock().unwrap().payment_results.push(reply.clone());
        Ok(())
    }

    async fn write_log_message(&self, record: &LogRecord) -> Result<(), PaymentStoreError> {
        self.inner.lock().unwrap().log_records.push(record.clone());
        Ok(())
    }
}
