use chrono::{DateTime, Utc};
use epg_common::Cents;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

//--------------------------------------      UserTag        ---------------------------------------------------------
/// Maps a physical RFID token to a user. Read-only to this service; the charging service owns it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserTag {
    pub id_tag: String,
    pub user_id: String,
    pub username: String,
}

//--------------------------------------   PaymentMethod     ---------------------------------------------------------
/// A stored card credential, created when the gateway reports a successful tokenization.
///
/// `cof_tid` is the network transaction id of the initial cardholder-authenticated payment; every
/// merchant-initiated charge must reference it. `fail_count` drives fallback selection: healthier
/// cards are preferred, and a success resets the counter.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PaymentMethod {
    pub identifier: String,
    pub user_id: String,
    pub user_name: String,
    pub is_default: bool,
    pub fail_count: i64,
    pub cof_tid: String,
    pub card_brand: String,
    pub card_country: String,
    pub expiry_date: String,
    pub description: String,
}

//--------------------------------------    PaymentOrder     ---------------------------------------------------------
/// A single attempt to authorize or refund an amount against the gateway.
///
/// Order numbers are globally unique and monotonically increasing. An order is opened at dispatch
/// and completed exactly once: by the gateway reply, by an out-of-band notify, by a transport-level
/// error carrying a gateway code, or by the next attempt for the same transaction closing it as
/// `closed without response`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PaymentOrder {
    pub order: i64,
    /// 0 when the order has no charging transaction (tokenization orders).
    pub transaction_id: i64,
    pub user_id: String,
    pub user_name: String,
    pub amount: Cents,
    pub identifier: String,
    pub is_completed: bool,
    pub result: String,
    pub time_opened: DateTime<Utc>,
    pub time_closed: Option<DateTime<Utc>>,
    pub currency: String,
    pub date: String,
    pub refund_amount: Cents,
    pub refund_time: Option<DateTime<Utc>>,
    pub description: String,
}

impl PaymentOrder {
    pub fn has_transaction(&self) -> bool {
        self.transaction_id > 0
    }
}

//--------------------------------------     Transaction     ---------------------------------------------------------
/// An EV charging session with its payment ledger.
///
/// Created and priced by the upstream charging service; only the billing fields
/// (`payment_order`, `payment_error`, `payment_billed`, `payment_orders`) are mutated here.
/// The cached [`UserTag`] and [`PaymentMethod`] are advisory copies; when absent they are
/// re-read from the store.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Transaction {
    pub transaction_id: i64,
    pub charge_point_id: String,
    pub connector_id: i64,
    pub id_tag: String,
    /// Energy counters in Wh.
    pub meter_start: i64,
    pub meter_stop: i64,
    pub is_finished: bool,
    pub payment_amount: Cents,
    pub payment_billed: Cents,
    pub payment_order: i64,
    pub payment_error: String,
    #[sqlx(json)]
    pub payment_orders: Vec<PaymentOrder>,
    #[sqlx(json(nullable))]
    pub user_tag: Option<UserTag>,
    #[sqlx(json(nullable))]
    pub payment_method: Option<PaymentMethod>,
}

impl Transaction {
    /// Appends an order snapshot unless one with the same number is already recorded.
    pub fn add_order(&mut self, order: PaymentOrder) {
        if self.payment_orders.iter().any(|o| o.order == order.order) {
            return;
        }
        self.payment_orders.push(order);
    }

    pub fn unbilled(&self) -> Cents {
        self.payment_amount - self.payment_billed
    }

    pub fn consumed_kwh(&self) -> i64 {
        (self.meter_stop - self.meter_start) / 1000
    }
}

//--------------------------------------  PaymentParameters  ---------------------------------------------------------
/// The decoded `Ds_MerchantParameters` of a gateway reply or notify. Persisted verbatim under the
/// order number for audit before any interpretation happens.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentParameters {
    #[serde(rename = "Ds_Response", default)]
    pub response: String,
    #[serde(rename = "Ds_Order", default)]
    pub order: String,
    #[serde(rename = "Ds_Amount", default)]
    pub amount: String,
    #[serde(rename = "Ds_TransactionType", default)]
    pub transaction_type: String,
    #[serde(rename = "Ds_MerchantIdentifier", default)]
    pub merchant_identifier: String,
    #[serde(rename = "Ds_MerchantCofTxnid", default)]
    pub merchant_cof_txnid: String,
    #[serde(rename = "Ds_Currency", default)]
    pub currency: String,
    #[serde(rename = "Ds_Date", default)]
    pub date: String,
    #[serde(rename = "Ds_Hour", default)]
    pub hour: String,
    #[serde(rename = "Ds_Card_Brand", default)]
    pub card_brand: String,
    #[serde(rename = "Ds_Card_Country", default)]
    pub card_country: String,
    #[serde(rename = "Ds_ExpiryDate", default)]
    pub expiry_date: String,
}

//-------------------------------------- MerchantParameters  ---------------------------------------------------------
/// The request parameters the gateway expects, Base64-encoded and signed before transmission.
///
/// Field names and order are part of the wire contract. Empty fields are serialized as empty
/// strings, never omitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MerchantParameters {
    /// Amount in cents, as a decimal string.
    #[serde(rename = "DS_MERCHANT_AMOUNT")]
    pub amount: String,
    #[serde(rename = "DS_MERCHANT_ORDER")]
    pub order: String,
    /// Stored card token to charge.
    #[serde(rename = "DS_MERCHANT_IDENTIFIER")]
    pub identifier: String,
    #[serde(rename = "DS_MERCHANT_MERCHANTCODE")]
    pub merchant_code: String,
    #[serde(rename = "DS_MERCHANT_CURRENCY")]
    pub currency: String,
    /// "0" = authorization, "3" = refund.
    #[serde(rename = "DS_MERCHANT_TRANSACTIONTYPE")]
    pub transaction_type: String,
    #[serde(rename = "DS_MERCHANT_TERMINAL")]
    pub terminal: String,
    /// "true" charges the stored token without a cardholder redirect.
    #[serde(rename = "DS_MERCHANT_DIRECTPAYMENT")]
    pub direct_payment: String,
    /// "MIT" claims the PSD2 merchant-initiated-transaction exemption.
    #[serde(rename = "DS_MERCHANT_EXCEP_SCA")]
    pub exception: String,
    /// "S" on the initial credential storage, "N" on every subsequent use.
    #[serde(rename = "DS_MERCHANT_COF_INI")]
    pub cof_ini: String,
    /// "R" = recurring, "I" = installments, "C" = other.
    #[serde(rename = "DS_MERCHANT_COF_TYPE")]
    pub cof_type: String,
    /// Network transaction id linking this charge to the original cardholder authorization.
    #[serde(rename = "DS_MERCHANT_COF_TXNID")]
    pub cof_tid: String,
}

//--------------------------------------   PaymentRequest    ---------------------------------------------------------
/// The signed envelope posted to the gateway; replies come back in the same shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentRequest {
    #[serde(rename = "Ds_MerchantParameters")]
    pub parameters: String,
    #[serde(rename = "Ds_Signature")]
    pub signature: String,
    #[serde(rename = "Ds_SignatureVersion")]
    pub signature_version: String,
}

//--------------------------------------     LogRecord       ---------------------------------------------------------
/// A row of the append-only `payment_log` collection.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LogRecord {
    pub time: DateTime<Utc>,
    pub category: String,
    pub level: String,
    pub text: String,
}
