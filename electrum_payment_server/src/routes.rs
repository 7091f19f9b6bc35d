//! Request handlers.
//!
//! Four routes translate URL and body into engine calls. Handlers are generic over the store and
//! gateway seams and registered in [`crate::server`]. Anything long-running happens inside the
//! engine as a background task; handlers return as soon as the work is dispatched.

use actix_web::{web, HttpResponse};
use electrum_payment_engine::{PaymentGateway, PaymentStore, PaymentsApi};
use epg_common::Cents;
use log::{error, info, warn};
use serde::Deserialize;

use crate::{errors::ServerError, helpers::new_request_id};

#[derive(Debug, Clone, Deserialize)]
pub struct ReturnOrderBody {
    pub amount: i64,
}

/// GET /pay/{transaction_id}: charge the unbilled remainder of a finished session.
pub async fn pay_transaction<B, G>(
    path: web::Path<String>,
    api: web::Data<PaymentsApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentStore,
    G: PaymentGateway,
{
    let request_id = new_request_id();
    let id = parse_id(&request_id, path.as_str(), "transaction id")?;
    api.pay_transaction(id).await.map_err(|e| {
        error!("[{request_id}] pay transaction {id}: {e}");
        ServerError::Engine(e)
    })?;
    Ok(HttpResponse::Ok().finish())
}

/// GET /return/{transaction_id}: refund the full amount of a transaction.
pub async fn return_transaction<B, G>(
    path: web::Path<String>,
    api: web::Data<PaymentsApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentStore,
    G: PaymentGateway,
{
    let request_id = new_request_id();
    let id = parse_id(&request_id, path.as_str(), "transaction id")?;
    api.return_payment(id).await.map_err(|e| {
        error!("[{request_id}] return transaction {id}: {e}");
        ServerError::Engine(e)
    })?;
    Ok(HttpResponse::Ok().finish())
}

/// POST /return/order/{order_id}: partial or full refund of one order.
pub async fn return_order<B, G>(
    path: web::Path<String>,
    body: web::Json<ReturnOrderBody>,
    api: web::Data<PaymentsApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentStore,
    G: PaymentGateway,
{
    let request_id = new_request_id();
    let order_id = path.into_inner();
    if order_id.is_empty() {
        warn!("[{request_id}] return order: empty order id");
        return Err(ServerError::InvalidRequest("empty order id".to_string()));
    }
    info!("[{request_id}] processing request: return order {order_id}, amount {}", body.amount);
    api.return_by_order(&order_id, Cents::from(body.amount)).await.map_err(|e| {
        error!("[{request_id}] return order {order_id}: {e}");
        ServerError::Engine(e)
    })?;
    Ok(HttpResponse::Ok().finish())
}

/// POST /notify: out-of-band gateway push.
///
/// The gateway's contract requires a quick acknowledgement: this always returns 200, even when
/// the body is unusable. Processing happens in the background.
pub async fn notify<B, G>(body: web::Bytes, api: web::Data<PaymentsApi<B, G>>) -> HttpResponse
where
    B: PaymentStore,
    G: PaymentGateway,
{
    let request_id = new_request_id();
    if let Err(e) = api.notify(body.as_ref()) {
        error!("[{request_id}] payment notify: {e}");
    }
    HttpResponse::Ok().finish()
}

fn parse_id(request_id: &str, raw: &str, what: &str) -> Result<i64, ServerError> {
    if raw.is_empty() {
        warn!("[{request_id}] empty {what}");
        return Err(ServerError::InvalidRequest(format!("empty {what}")));
    }
    raw.parse().map_err(|e| {
        warn!("[{request_id}] invalid {what}: {raw}; {e}");
        ServerError::InvalidRequest(format!("invalid {what}: {raw}"))
    })
}
