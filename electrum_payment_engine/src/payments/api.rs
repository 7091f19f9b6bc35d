use std::{sync::Arc, time::Duration};

use chrono::Utc;
use epg_common::{mask, Cents, Secret, EUR_CURRENCY_CODE};

use crate::{
    db_types::{MerchantParameters, PaymentMethod, PaymentOrder, PaymentParameters, PaymentRequest, Transaction},
    gateway::{self, GatewayError, PaymentGateway},
    payments::{errors::PaymentsError, locks::LockSet, spawn_guarded},
    signer,
    storelog::StoreLogger,
    traits::PaymentStore,
};

/// First order number handed out when the store holds no orders yet. Kept for compatibility with
/// existing records.
pub const ORDER_SEED: i64 = 1200;

const TYPE_CHARGE: &str = "0";
const TYPE_REFUND: &str = "3";
const CHARGE_APPROVED: &str = "0000";
const REFUND_APPROVED: &str = "0900";
const CLOSED_WITHOUT_RESPONSE: &str = "closed without response";
const DISPATCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Merchant credentials and payment policy, parsed at startup and passed by reference.
#[derive(Debug, Clone)]
pub struct MerchantConfig {
    /// Base64-encoded merchant secret as issued by the gateway.
    pub secret: Secret<String>,
    pub code: String,
    pub terminal: String,
    /// Mark transactions as billed without contacting the gateway (test mode).
    pub disable_payment: bool,
    /// Mark a transaction fully billed on the first hard error instead of retrying forever.
    pub close_ledger_on_error: bool,
    /// Reject inbound notifications whose signature does not verify.
    pub verify_notify: bool,
}

impl MerchantConfig {
    pub fn is_configured(&self) -> bool {
        !self.secret.reveal().is_empty() && !self.code.is_empty() && !self.terminal.is_empty()
    }
}

/// The payment engine. Charges stored card credentials for finished charging sessions and keeps
/// the transaction ledger consistent across replies, notifies and failures.
///
/// Cloning is cheap; every dispatched background task works on its own clone.
#[derive(Clone)]
pub struct PaymentsApi<B, G> {
    conf: MerchantConfig,
    store: B,
    gateway: G,
    locks: Arc<LockSet>,
    logger: StoreLogger<B>,
}

impl<B, G> PaymentsApi<B, G>
where
    B: PaymentStore,
    G: PaymentGateway,
{
    pub fn new(conf: MerchantConfig, store: B, gateway: G, debug: bool) -> Self {
        let logger = StoreLogger::new("payments", store.clone(), debug);
        if conf.disable_payment {
            logger.warn("service disabled");
        }
        Self { conf, store, gateway, locks: Arc::new(LockSet::new()), logger }
    }

    /// Charges the unbilled remainder of a finished transaction.
    ///
    /// Resolves the user tag and the healthiest stored card, closes any prior order that never got
    /// a response, allocates the next order number and dispatches a merchant-initiated charge in
    /// the background. Returns as soon as the request is on its way; the ledger is settled by
    /// reconciliation when the reply or notify arrives.
    pub async fn pay_transaction(&self, transaction_id: i64) -> Result<(), PaymentsError> {
        let _guard = self.locks.lock(transaction_id).await;

        self.logger.info(&format!("pay transaction {transaction_id}"));

        if !self.conf.is_configured() {
            return Err(PaymentsError::MerchantNotConfigured);
        }

        let mut transaction = self.finished_transaction(transaction_id).await?;
        let amount = transaction.unbilled();
        if !amount.is_positive() {
            self.logger.warn(&format!("transaction {transaction_id} amount is zero"));
            return Ok(());
        }

        // --------------------------------------------- user tag
        let tag = match transaction.user_tag.clone() {
            Some(tag) => tag,
            None => match self.store.get_user_tag(&transaction.id_tag).await? {
                Some(tag) => tag,
                None => return Err(PaymentsError::UserTagNotFound(mask(&transaction.id_tag))),
            },
        };
        if tag.user_id.is_empty() {
            // Untagged sessions can never be billed; close the ledger instead of retrying.
            self.close_ledger(&mut transaction).await;
            return Err(PaymentsError::EmptyUserId(mask(&transaction.id_tag)));
        }

        // --------------------------------------------- payment method
        let mut method = match transaction.payment_method.clone() {
            Some(method) => method,
            None => match self.store.get_payment_method(&tag.user_id).await.ok().flatten() {
                Some(method) => method,
                None => {
                    self.close_ledger(&mut transaction).await;
                    return Err(PaymentsError::NoPaymentMethod(mask(&transaction.id_tag)));
                },
            },
        };
        // A method without a linking txnid, with past failures, or a transaction with a previous
        // error may have a healthier alternative in the store.
        if method.cof_tid.is_empty() || method.fail_count > 0 || !transaction.payment_error.is_empty() {
            if let Ok(Some(stored)) = self.store.get_payment_method(&tag.user_id).await {
                if stored.identifier != method.identifier {
                    self.logger.warn(&format!("payment method loaded from store: {}", mask(&stored.identifier)));
                    method = stored;
                }
            }
        }

        let description = format!(
            "{}:{} {}kW",
            transaction.charge_point_id,
            transaction.connector_id,
            transaction.consumed_kwh()
        );

        if let Ok(Some(mut stale)) = self.store.get_payment_order_by_transaction(transaction_id).await {
            stale.is_completed = true;
            stale.result = CLOSED_WITHOUT_RESPONSE.to_string();
            stale.time_closed = Some(Utc::now());
            if let Err(e) = self.store.save_payment_order(&stale).await {
                self.logger.error("close previous payment order", &e);
            }
            self.record_method_failure(&stale.identifier, true).await;
        }

        if self.conf.disable_payment {
            self.close_ledger(&mut transaction).await;
            self.logger.info(&format!("payment disabled: transaction {transaction_id} paid without request"));
            return Ok(());
        }

        let number = match self.store.get_last_order().await {
            Ok(Some(last)) => last.order + 1,
            _ => ORDER_SEED,
        };
        let order = PaymentOrder {
            order: number,
            transaction_id,
            user_id: tag.user_id.clone(),
            user_name: tag.username.clone(),
            amount,
            identifier: method.identifier.clone(),
            is_completed: false,
            result: String::new(),
            time_opened: Utc::now(),
            time_closed: None,
            currency: String::new(),
            date: String::new(),
            refund_amount: Cents::zero(),
            refund_time: None,
            description,
        };
        self.store.save_payment_order(&order).await?;

        // A merchant-initiated charge against the stored token: no redirect, PSD2 MIT exemption,
        // recurring credential-on-file linked to the original authorization.
        let parameters = MerchantParameters {
            amount: amount.value().to_string(),
            order: number.to_string(),
            identifier: method.identifier.clone(),
            merchant_code: self.conf.code.clone(),
            currency: EUR_CURRENCY_CODE.to_string(),
            transaction_type: TYPE_CHARGE.to_string(),
            terminal: self.conf.terminal.clone(),
            direct_payment: "true".to_string(),
            exception: "MIT".to_string(),
            cof_ini: "N".to_string(),
            cof_type: "R".to_string(),
            cof_tid: method.cof_tid.clone(),
        };
        self.logger.info(&format!(
            "order: {number}; identifier: {}; txnid: {}",
            mask(&parameters.identifier),
            mask(&parameters.cof_tid)
        ));

        let request = self.new_request(&parameters)?;
        self.dispatch(request, number);
        Ok(())
    }

    /// Refunds the full `payment_amount` of a transaction against its last completed order.
    pub async fn return_payment(&self, transaction_id: i64) -> Result<(), PaymentsError> {
        let _guard = self.locks.lock(transaction_id).await;

        let transaction = self.finished_transaction(transaction_id).await?;
        let amount = transaction.payment_amount;
        if !amount.is_positive() {
            self.logger.warn(&format!("transaction {transaction_id} amount is zero"));
            return Ok(());
        }

        let parameters = MerchantParameters {
            amount: amount.value().to_string(),
            order: transaction.payment_order.to_string(),
            merchant_code: self.conf.code.clone(),
            currency: EUR_CURRENCY_CODE.to_string(),
            transaction_type: TYPE_REFUND.to_string(),
            terminal: self.conf.terminal.clone(),
            ..Default::default()
        };

        let request = self.new_request(&parameters)?;
        self.dispatch(request, transaction.payment_order);
        Ok(())
    }

    /// Partially or fully refunds a specific order.
    pub async fn return_by_order(&self, order_id: &str, amount: Cents) -> Result<(), PaymentsError> {
        if amount == Cents::zero() {
            return Err(PaymentsError::ZeroReturnAmount);
        }
        let id: i64 = order_id.parse().map_err(|_| PaymentsError::InvalidOrderId(order_id.to_string()))?;

        let _guard = self.locks.lock(id).await;
        let order = self.store.get_payment_order(id).await?.ok_or(PaymentsError::OrderNotFound(id))?;
        if order.amount < amount {
            return Err(PaymentsError::ReturnExceedsOrder { available: order.amount, requested: amount });
        }

        let parameters = MerchantParameters {
            amount: amount.value().to_string(),
            order: order_id.to_string(),
            merchant_code: self.conf.code.clone(),
            currency: EUR_CURRENCY_CODE.to_string(),
            transaction_type: TYPE_REFUND.to_string(),
            terminal: self.conf.terminal.clone(),
            ..Default::default()
        };

        let request = self.new_request(&parameters)?;
        self.dispatch(request, id);
        Ok(())
    }

    /// Handles an out-of-band gateway push. The body is a url-encoded form carrying the same
    /// envelope as a direct reply; after signature verification the reply feeds into the same
    /// reconciliation routine, in the background.
    pub fn notify(&self, body: &[u8]) -> Result<(), PaymentsError> {
        let form: Vec<(String, String)> = serde_urlencoded::from_bytes(body).map_err(|e| {
            self.logger.info(&String::from_utf8_lossy(body));
            PaymentsError::InvalidNotification(e.to_string())
        })?;
        let field = |name: &str| {
            form.iter().find(|(key, _)| key == name).map(|(_, value)| value.clone()).unwrap_or_default()
        };
        let parameters = field("Ds_MerchantParameters");
        let signature = field("Ds_Signature");

        let reply = gateway::read_parameters(&parameters)?;
        if self.conf.verify_notify {
            let valid = signer::verify(self.conf.secret.reveal(), &parameters, &reply.order, &signature)?;
            if !valid {
                self.logger.warn(&format!("notification signature mismatch for order {}", reply.order));
                return Err(PaymentsError::NotifySignatureMismatch(reply.order));
            }
        }

        let api = self.clone();
        spawn_guarded("process notification", async move {
            api.process_response(reply).await;
        });
        Ok(())
    }

    /// Reconciles a gateway reply with the order it belongs to and with the transaction ledger.
    ///
    /// Idempotent on `is_completed`: a second reply for a completed order only touches the refund
    /// fields (type 3) or is a no-op, so a direct reply and a notify may arrive in either order.
    pub async fn process_response(&self, reply: PaymentParameters) {
        self.logger.info(&format!(
            "response: type: {}; result: {}; order: {}; amount: {}",
            reply.transaction_type, reply.response, reply.order, reply.amount
        ));
        if let Err(e) = self.store.save_payment_result(&reply).await {
            self.logger.error("save payment result", &e);
        }

        let number: i64 = match reply.order.parse() {
            Ok(number) => number,
            Err(e) => {
                self.logger.error("read order number", &e);
                return;
            },
        };
        let amount: i64 = match reply.amount.parse() {
            Ok(amount) => amount,
            Err(e) => {
                self.logger.error("read amount", &e);
                return;
            },
        };
        let amount = Cents::from(amount);

        let mut order = match self.store.get_payment_order(number).await {
            Ok(Some(order)) => order,
            Ok(None) => {
                self.logger.warn(&format!("payment order {number} not found"));
                return;
            },
            Err(e) => {
                self.logger.error("get payment order", &e);
                return;
            },
        };

        let first_completion = !order.is_completed;
        if first_completion {
            order.amount = amount;
            order.is_completed = true;
            order.result = format!("{} by electrum", reply.response);
            order.time_closed = Some(Utc::now());
            order.currency = reply.currency.clone();
            order.date = format!("{} {}", reply.date, reply.hour);
            if let Err(e) = self.store.save_payment_order(&order).await {
                self.logger.error("save payment order", &e);
            }
        }

        if !is_approved(&reply) {
            // A late duplicate of an error reply must not bump the fail count again.
            if first_completion {
                self.close_order_on_error(order, &reply.response).await;
            }
            return;
        }

        // Type 3 is a refund; only the refund bookkeeping changes. Refunds land on orders that
        // were completed by the original charge, so this path runs regardless of completion.
        if reply.transaction_type == TYPE_REFUND {
            self.record_method_failure(&order.identifier, false).await;
            order.refund_amount = amount;
            order.refund_time = Some(Utc::now());
            if let Err(e) = self.store.save_payment_order(&order).await {
                self.logger.error("save payment order", &e);
            }
            return;
        }

        if !first_completion {
            // Reply and notify converge here: whichever arrives second is audit-only.
            return;
        }
        self.record_method_failure(&order.identifier, false).await;

        if order.has_transaction() {
            let mut transaction = match self.store.get_transaction(order.transaction_id).await {
                Ok(Some(transaction)) => transaction,
                Ok(None) => {
                    self.logger.warn(&format!("transaction {} not found", order.transaction_id));
                    return;
                },
                Err(e) => {
                    self.logger.error("get transaction", &e);
                    return;
                },
            };
            transaction.payment_order = order.order;
            transaction.payment_billed += order.amount;
            transaction.payment_error.clear();
            transaction.add_order(order.clone());
            if let Err(e) = self.store.update_transaction(&transaction).await {
                self.logger.error("update transaction", &e);
            }
        } else {
            // A tokenization order: store the new credential, then give the tokenization amount
            // back to the cardholder.
            let method = PaymentMethod {
                identifier: reply.merchant_identifier.clone(),
                user_id: order.user_id.clone(),
                user_name: order.user_name.clone(),
                is_default: false,
                fail_count: 0,
                cof_tid: reply.merchant_cof_txnid.clone(),
                card_brand: reply.card_brand.clone(),
                card_country: reply.card_country.clone(),
                expiry_date: reply.expiry_date.clone(),
                description: "**** **** **** ****".to_string(),
            };
            match self.save_payment_method(&method).await {
                Ok(()) => self
                    .logger
                    .info(&format!("payment method {} saved for {}", mask(&method.identifier), order.user_name)),
                Err(e) => self.logger.error("save payment method", &e),
            }
            if order.amount.is_positive() {
                let id = order.order.to_string();
                if let Err(e) = self.return_by_order(&id, order.amount).await {
                    self.logger.error("refund payment", &e);
                }
            }
        }
    }

    fn dispatch(&self, request: PaymentRequest, order: i64) {
        let api = self.clone();
        spawn_guarded("process gateway request", async move {
            api.process_request(request, order).await;
        });
    }

    /// Sends a signed request and feeds the outcome into reconciliation. Runs detached from the
    /// originating call with its own deadline: the gateway may already have acted on the request,
    /// so a cancelled caller must not abort it.
    async fn process_request(&self, request: PaymentRequest, order: i64) {
        let result = match tokio::time::timeout(DISPATCH_TIMEOUT, self.gateway.send(&request)).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout),
        };
        match result {
            Ok(reply) => self.process_response(reply).await,
            Err(GatewayError::ErrorCode(code)) => {
                self.logger.warn(&format!("response error code: {code}"));
                if let Ok(Some(order)) = self.store.get_payment_order(order).await {
                    self.close_order_on_error(order, &code).await;
                }
            },
            Err(GatewayError::Unrecognized(body)) => {
                // Left open on purpose: the next attempt for the same transaction closes the
                // order as "closed without response".
                self.logger.warn(&format!("unrecognized response: {body}"));
            },
            Err(e) => {
                self.logger.error("post request", &e);
            },
        }
    }

    fn new_request(&self, parameters: &MerchantParameters) -> Result<PaymentRequest, PaymentsError> {
        let json = serde_json::to_string(parameters).map_err(|e| PaymentsError::Encode(e.to_string()))?;
        self.logger.debug(&format!("request parameters: {json}"));
        let encoded = base64::encode(json);
        let signature = signer::sign(self.conf.secret.reveal(), &encoded, &parameters.order)?;
        Ok(PaymentRequest {
            parameters: encoded,
            signature,
            signature_version: signer::SIGNATURE_VERSION.to_string(),
        })
    }

    async fn finished_transaction(&self, transaction_id: i64) -> Result<Transaction, PaymentsError> {
        let transaction = self
            .store
            .get_transaction(transaction_id)
            .await?
            .ok_or(PaymentsError::TransactionNotFound(transaction_id))?;
        if !transaction.is_finished {
            return Err(PaymentsError::TransactionNotFinished(transaction_id));
        }
        Ok(transaction)
    }

    /// Marks the transaction fully billed, closing its ledger.
    async fn close_ledger(&self, transaction: &mut Transaction) {
        transaction.payment_billed = transaction.payment_amount;
        if let Err(e) = self.store.update_transaction(transaction).await {
            self.logger.error("update transaction", &e);
        }
    }

    /// Completes an order with an error result and, under the close-ledger policy, settles the
    /// transaction as fully billed with the error code so it is not retried forever.
    async fn close_order_on_error(&self, mut order: PaymentOrder, result: &str) {
        self.record_method_failure(&order.identifier, true).await;

        if !order.is_completed {
            order.is_completed = true;
            order.result = result.to_string();
            order.time_closed = Some(Utc::now());
            if let Err(e) = self.store.save_payment_order(&order).await {
                self.logger.error("save payment order on error", &e);
            }
        }

        if !order.has_transaction() {
            return;
        }
        if !self.conf.close_ledger_on_error {
            self.logger.warn(&format!("transaction {} left open after payment error", order.transaction_id));
            return;
        }
        self.logger.info(&format!("close transaction {} on payment error", order.transaction_id));
        let mut transaction = match self.store.get_transaction(order.transaction_id).await {
            Ok(Some(transaction)) => transaction,
            Ok(None) => {
                self.logger.warn(&format!("transaction {} not found", order.transaction_id));
                return;
            },
            Err(e) => {
                self.logger.error("get transaction", &e);
                return;
            },
        };
        transaction.payment_billed = transaction.payment_amount;
        transaction.payment_order = order.order;
        transaction.payment_error = result.to_string();
        transaction.add_order(order.clone());
        if let Err(e) = self.store.update_transaction(&transaction).await {
            self.logger.error("update transaction", &e);
        }
    }

    async fn save_payment_method(&self, method: &PaymentMethod) -> Result<(), PaymentsError> {
        if method.user_id.is_empty() {
            return Err(PaymentsError::InvalidPaymentMethod("empty user id"));
        }
        if method.identifier.is_empty() {
            return Err(PaymentsError::InvalidPaymentMethod("empty identifier"));
        }
        self.store.save_payment_method(method).await?;
        Ok(())
    }

    /// A failure increments the method's fail count by one; a success resets it to zero.
    async fn record_method_failure(&self, identifier: &str, failed: bool) {
        if identifier.is_empty() {
            return;
        }
        let method = match self.store.get_payment_method_by_identifier(identifier).await {
            Ok(Some(method)) => method,
            Ok(None) => {
                self.logger.warn(&format!("payment method {} not found", mask(identifier)));
                return;
            },
            Err(e) => {
                self.logger.error("get payment method", &e);
                return;
            },
        };
        let count = if failed { method.fail_count + 1 } else { 0 };
        if let Err(e) = self.store.update_payment_method_fail_count(identifier, count).await {
            self.logger.error("update payment method", &e);
        }
    }
}

fn is_approved(reply: &PaymentParameters) -> bool {
    match reply.transaction_type.as_str() {
        TYPE_CHARGE => reply.response == CHARGE_APPROVED,
        TYPE_REFUND => reply.response == REFUND_APPROVED,
        _ => false,
    }
}
